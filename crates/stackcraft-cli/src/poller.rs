//! Stack event polling.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use stackcraft_core::provider::{Provider, StackEvent, TransientStatus};
use std::io::{self, Write};
use std::thread;
use std::time::Duration;
use tracing::debug;

const HEADER: [&str; 5] = [
    "TIMESTAMP (UTC)",
    "RESOURCE TYPE",
    "RESOURCE ID",
    "STATUS",
    "REASON",
];

/// How a watch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Events could no longer be fetched.
    Gone,
    /// The stack left the watched status. `None` when it could no longer be
    /// described.
    Settled(Option<String>),
}

/// Streams a stack's new events while it stays in a transient status.
///
/// The watch has no timeout and blocks the calling thread between polls.
pub struct EventPoller<'a> {
    provider: &'a dyn Provider,
    out: &'a mut dyn Write,
    interval: Duration,
    watermark: DateTime<Utc>,
    header_printed: bool,
}

impl<'a> EventPoller<'a> {
    pub fn new(provider: &'a dyn Provider, out: &'a mut dyn Write, interval: Duration) -> Self {
        Self {
            provider,
            out,
            interval,
            // Catch events the provider recorded just before the call returned
            watermark: Utc::now() - ChronoDuration::seconds(3),
            header_printed: false,
        }
    }

    pub fn with_watermark(mut self, watermark: DateTime<Utc>) -> Self {
        self.watermark = watermark;
        self
    }

    pub fn watermark(&self) -> DateTime<Utc> {
        self.watermark
    }

    /// Print events for `stack_name` until it is no longer in `status`.
    pub fn watch(&mut self, stack_name: &str, status: TransientStatus) -> io::Result<PollOutcome> {
        let status = status.to_string();
        loop {
            let mut events = match self.provider.describe_stack_events(stack_name) {
                Ok(events) => events,
                Err(err) => {
                    writeln!(self.out, "Stack is gone: {} ({})", stack_name, err)?;
                    return Ok(PollOutcome::Gone);
                }
            };

            events.sort_by_key(|e| e.timestamp);
            let fresh: Vec<StackEvent> = events
                .into_iter()
                .filter(|e| e.timestamp > self.watermark)
                .collect();

            if let Some(last) = fresh.last() {
                self.watermark = last.timestamp;
                self.print(&fresh)?;
            }

            match self.provider.describe_stack(stack_name) {
                Ok(description) if description.stack_status == status => {}
                Ok(description) => {
                    debug!(stack = %stack_name, status = %description.stack_status, "Stack settled");
                    return Ok(PollOutcome::Settled(Some(description.stack_status)));
                }
                Err(err) => {
                    debug!(stack = %stack_name, error = %err, "Stack no longer describable");
                    return Ok(PollOutcome::Settled(None));
                }
            }

            thread::sleep(self.interval);
        }
    }

    fn print(&mut self, events: &[StackEvent]) -> io::Result<()> {
        if !self.header_printed {
            let [ts, kind, id, status, reason] = HEADER;
            writeln!(self.out, "{}", format_line(ts, kind, id, status, reason))?;
            self.header_printed = true;
        }

        for event in events {
            let timestamp = event.timestamp.format("%Y-%m-%d %H:%M:%S").to_string();
            writeln!(
                self.out,
                "{}",
                format_line(
                    &timestamp,
                    &event.resource_type,
                    &event.logical_resource_id,
                    &event.resource_status,
                    event.resource_status_reason.as_deref().unwrap_or_default(),
                )
            )?;
        }
        Ok(())
    }
}

fn format_line(ts: &str, kind: &str, id: &str, status: &str, reason: &str) -> String {
    format!("{:<24} {:<42} {:<28} {:<40} {}", ts, kind, id, status, reason)
}

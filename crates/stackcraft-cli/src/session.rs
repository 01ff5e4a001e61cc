//! Per-invocation command context.

use stackcraft_core::provider::{
    Provider, ProviderError, StackDescription, StackRequest, TransientStatus,
};
use stackcraft_core::{Error, Result, Stack};
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use crate::poller::{EventPoller, PollOutcome};

/// Everything a command handler needs: the constructed stack, the provider it
/// deploys to, and where to write.
pub struct Session<'a> {
    pub stack: Stack,
    pub provider: Arc<dyn Provider>,
    pub out: &'a mut dyn Write,
    pub poll_interval: Duration,
}

impl<'a> Session<'a> {
    pub fn stackname(&self) -> Result<String> {
        self.stack.stackname()
    }

    /// The compiled template, rendered as YAML.
    pub fn template_body(&self) -> Result<String> {
        self.stack.compile()?.to_yaml()
    }

    /// A create or update request for the current stack.
    pub fn request(&self) -> Result<StackRequest> {
        Ok(StackRequest {
            stack_name: self.stackname()?,
            template_body: self.template_body()?,
            capabilities: self.stack.capabilities().to_vec(),
            tags: self.stack.tags()?,
        })
    }

    /// Describe the deployed stack, or `None` if it does not exist.
    pub fn find(&self) -> Result<Option<StackDescription>> {
        match self.provider.describe_stack(&self.stackname()?) {
            Ok(description) => Ok(Some(description)),
            Err(ProviderError::NotFound(_)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Describe the deployed stack, failing if it does not exist.
    pub fn describe(&self) -> Result<StackDescription> {
        let name = self.stackname()?;
        self.find()?.ok_or(Error::StackNotFound(name))
    }

    /// Stream the stack's events while it stays in `status`.
    pub fn watch(&mut self, status: TransientStatus) -> anyhow::Result<PollOutcome> {
        let name = self.stackname()?;
        let mut poller = EventPoller::new(self.provider.as_ref(), &mut *self.out, self.poll_interval);
        Ok(poller.watch(&name, status)?)
    }

    pub fn println(&mut self, line: impl std::fmt::Display) -> io::Result<()> {
        writeln!(self.out, "{}", line)
    }
}

//! Command-line driver for stackcraft stacks.
//!
//! A stack binary is usually a one-liner:
//!
//! ```no_run
//! use stackcraft_cli::{ConfMode, StackCli};
//! # fn spec() -> stackcraft_core::StackSpec { unimplemented!() }
//!
//! fn main() -> anyhow::Result<()> {
//!     StackCli::new(spec(), ConfMode::Partitioned).run()
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod logging;
pub mod poller;
pub mod session;

pub use cli::{ConfMode, GlobalArgs, ProviderFactory, StackCli};
pub use commands::{Command, CommandSet, Handler};
pub use poller::{EventPoller, PollOutcome};
pub use session::Session;

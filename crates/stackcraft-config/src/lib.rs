//! Configuration loading for stackcraft.
//!
//! A single YAML document configures many stacks: top-level scalar keys are
//! shared by every stack, and top-level mappings hold per-stack settings keyed
//! by stack base name.

pub mod error;
pub mod partition;

pub use error::{ConfigError, ConfigResult};
pub use partition::{load_partitioned, partition_yaml, partition_yaml_str};

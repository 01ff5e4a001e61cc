//! Sample stacks.
//!
//! Each module exposes a `spec()` describing the stack; the binaries under
//! `src/bin` wrap them in a [`stackcraft_cli::StackCli`].

pub mod dynamodb_table;
pub mod ec2_static_ip;
pub mod env_bucket;
pub mod s3_minimal;
pub mod s3_policy;
pub mod s3_user;

use stackcraft_cli::{ConfMode, StackCli};
use stackcraft_samples::env_bucket;

fn main() -> anyhow::Result<()> {
    StackCli::new(env_bucket::spec(), ConfMode::Partitioned).run()
}

use stackcraft_cli::{ConfMode, StackCli};
use stackcraft_samples::s3_minimal;

fn main() -> anyhow::Result<()> {
    StackCli::new(s3_minimal::spec(), ConfMode::Inline).run()
}

use stackcraft_cli::{ConfMode, StackCli};
use stackcraft_samples::dynamodb_table;

fn main() -> anyhow::Result<()> {
    StackCli::new(dynamodb_table::spec(), ConfMode::Inline).run()
}

use stackcraft_cli::{ConfMode, StackCli};
use stackcraft_samples::s3_policy;

fn main() -> anyhow::Result<()> {
    StackCli::new(s3_policy::spec(), ConfMode::Inline)
        .command("policy", "Print the bucket policy document", s3_policy::print_policy)
        .run()
}

use stackcraft_cli::{ConfMode, StackCli};
use stackcraft_samples::s3_user;

fn main() -> anyhow::Result<()> {
    StackCli::new(s3_user::spec(), ConfMode::Inline).run()
}

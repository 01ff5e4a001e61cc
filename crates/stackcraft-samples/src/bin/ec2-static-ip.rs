use stackcraft_cli::{ConfMode, StackCli};
use stackcraft_samples::ec2_static_ip;

fn main() -> anyhow::Result<()> {
    StackCli::new(ec2_static_ip::spec(), ConfMode::Inline).run()
}

//! Argument parsing and dispatch.

use anyhow::{Context, anyhow};
use clap::builder::{PossibleValue, PossibleValuesParser};
use clap::{Args, Parser};
use stackcraft_config::load_partitioned;
use stackcraft_core::{Provider, Stack, StackConf, StackSpec};
use stackcraft_provider::HttpProvider;
use stackcraft_provider::http::DEFAULT_ENDPOINT;
use std::ffi::OsString;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::commands::{CommandSet, Handler};
use crate::logging::init_logging;
use crate::session::Session;

/// Where a stack binary takes its configuration from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfMode {
    /// `<CONF_FILE> <COMMAND>`: the section named after the stack's base name
    /// in a YAML file, plus the file's global keys.
    Partitioned,
    /// `--conf key=value ... <COMMAND>`: overrides merged onto the defaults.
    Inline,
    /// `<COMMAND>`: no external configuration.
    Zero,
}

/// Builds the provider for an endpoint and region.
pub type ProviderFactory = Box<dyn Fn(&str, &str) -> anyhow::Result<Arc<dyn Provider>>>;

/// Flags shared by every configuration mode.
#[derive(Debug, Clone, Args)]
pub struct GlobalArgs {
    /// Provisioning API endpoint
    #[arg(long, env = "STACKCRAFT_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Seconds between event polls while a stack operation is in progress
    #[arg(long, value_name = "SECONDS", default_value_t = 10)]
    pub poll_interval: u64,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Log level (overrides --verbose)
    #[arg(long, value_parser = ["trace", "debug", "info", "warn", "error"])]
    pub log_level: Option<String>,
}

#[derive(Debug, Parser)]
#[command(name = "stackcraft", about = "Build and deploy a stack", version)]
struct PartitionedArgs {
    #[command(flatten)]
    global: GlobalArgs,

    /// YAML configuration file
    conf_file: PathBuf,

    /// Command to run
    command: String,
}

#[derive(Debug, Parser)]
#[command(name = "stackcraft", about = "Build and deploy a stack", version)]
struct InlineArgs {
    #[command(flatten)]
    global: GlobalArgs,

    /// Configuration override, repeatable
    #[arg(long = "conf", value_name = "KEY=VALUE")]
    conf: Vec<String>,

    /// Command to run
    command: String,
}

#[derive(Debug, Parser)]
#[command(name = "stackcraft", about = "Build and deploy a stack", version)]
struct ZeroArgs {
    #[command(flatten)]
    global: GlobalArgs,

    /// Command to run
    command: String,
}

#[derive(Debug)]
enum ConfInput {
    File(PathBuf),
    Overrides(Vec<String>),
    Defaults,
}

#[derive(Debug)]
struct Invocation {
    global: GlobalArgs,
    conf: ConfInput,
    command: String,
}

/// Command-line driver for one stack.
pub struct StackCli {
    spec: Arc<StackSpec>,
    mode: ConfMode,
    commands: CommandSet,
    provider_factory: ProviderFactory,
}

impl StackCli {
    pub fn new(spec: impl Into<Arc<StackSpec>>, mode: ConfMode) -> Self {
        Self {
            spec: spec.into(),
            mode,
            commands: CommandSet::builtin(),
            provider_factory: Box::new(|endpoint: &str, region: &str| {
                let provider = HttpProvider::new(endpoint, region)?;
                Ok(Arc::new(provider) as Arc<dyn Provider>)
            }),
        }
    }

    /// Replace the command set.
    pub fn commands(mut self, commands: CommandSet) -> Self {
        self.commands = commands;
        self
    }

    /// Add one command to the current set.
    pub fn command(mut self, name: &'static str, about: &'static str, handler: Handler) -> Self {
        self.commands = self.commands.with(name, about, handler);
        self
    }

    pub fn provider_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&str, &str) -> anyhow::Result<Arc<dyn Provider>> + 'static,
    {
        self.provider_factory = Box::new(factory);
        self
    }

    /// Parse the process arguments and run the selected command, printing to
    /// stdout. Usage errors exit the process.
    pub fn run(&self) -> anyhow::Result<()> {
        let invocation = self
            .parse(std::env::args_os())
            .unwrap_or_else(|e| e.exit());
        self.execute(invocation, &mut io::stdout().lock())
    }

    /// Run with explicit arguments, the first being the binary name.
    pub fn run_from<I, T>(&self, args: I) -> anyhow::Result<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        self.run_with_output(args, &mut io::stdout().lock())
    }

    /// Run with explicit arguments, writing command output to `out`.
    pub fn run_with_output<I, T>(&self, args: I, out: &mut dyn Write) -> anyhow::Result<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let invocation = self.parse(args)?;
        self.execute(invocation, out)
    }

    fn parse<I, T>(&self, args: I) -> Result<Invocation, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let invocation = match self.mode {
            ConfMode::Partitioned => {
                let parsed: PartitionedArgs = parse_with_commands(&self.commands, args)?;
                Invocation {
                    global: parsed.global,
                    conf: ConfInput::File(parsed.conf_file),
                    command: parsed.command,
                }
            }
            ConfMode::Inline => {
                let parsed: InlineArgs = parse_with_commands(&self.commands, args)?;
                Invocation {
                    global: parsed.global,
                    conf: ConfInput::Overrides(parsed.conf),
                    command: parsed.command,
                }
            }
            ConfMode::Zero => {
                let parsed: ZeroArgs = parse_with_commands(&self.commands, args)?;
                Invocation {
                    global: parsed.global,
                    conf: ConfInput::Defaults,
                    command: parsed.command,
                }
            }
        };
        Ok(invocation)
    }

    fn build_stack(&self, conf: &ConfInput) -> anyhow::Result<Stack> {
        let stack = match conf {
            ConfInput::File(path) => {
                let conf = load_partitioned(path, self.spec.base_name()).with_context(|| {
                    format!("failed to load configuration from {}", path.display())
                })?;
                Stack::new(self.spec.clone(), conf)?
            }
            ConfInput::Overrides(tokens) => Stack::from_override_tokens(self.spec.clone(), tokens)?,
            ConfInput::Defaults => Stack::new(self.spec.clone(), StackConf::new())?,
        };
        Ok(stack)
    }

    fn execute(&self, invocation: Invocation, out: &mut dyn Write) -> anyhow::Result<()> {
        let Invocation {
            global,
            conf,
            command,
        } = invocation;
        init_logging(global.verbose, global.log_level.as_deref());

        let command = self
            .commands
            .get(&command)
            .copied()
            .ok_or_else(|| anyhow!("unknown command: {}", command))?;

        let stack = self.build_stack(&conf)?;
        debug!(stack = ?stack, "Stack constructed");
        let provider = (self.provider_factory)(&global.endpoint, stack.region())?;
        let stack = stack.with_image_lookup(provider.clone());

        info!(
            base_name = %stack.base_name(),
            region = %stack.region(),
            command = command.name,
            "Running command"
        );
        let mut session = Session {
            stack,
            provider,
            out,
            poll_interval: Duration::from_secs(global.poll_interval),
        };
        (command.handler)(&mut session)
    }
}

/// Parse `args` as `P`, restricting the positional `command` to the names in
/// `commands`.
fn parse_with_commands<P, I, T>(commands: &CommandSet, args: I) -> Result<P, clap::Error>
where
    P: Parser,
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let values: Vec<PossibleValue> = commands
        .iter()
        .map(|c| PossibleValue::new(c.name).help(c.about))
        .collect();
    let mut cmd = P::command().mut_arg("command", |arg| {
        arg.value_parser(PossibleValuesParser::new(values))
    });
    let mut matches = cmd.try_get_matches_from_mut(args)?;
    P::from_arg_matches_mut(&mut matches).map_err(|e| e.format(&mut cmd))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackcraft_core::{Resource, Variant, conf};
    use stackcraft_provider::MemoryProvider;

    fn spec() -> StackSpec {
        StackSpec::builder("my-bucket", Variant::ZERO_CONF)
            .default_conf(conf! { "region": "eu-west-1" })
            .resource("bucket", |_| Ok(Resource::new("Bucket", "AWS::S3::Bucket")))
            .build()
    }

    fn memory_cli(mode: ConfMode) -> (StackCli, Arc<MemoryProvider>) {
        let memory = Arc::new(MemoryProvider::new("eu-west-1"));
        let shared = memory.clone();
        let cli = StackCli::new(spec(), mode)
            .provider_factory(move |_, _| Ok(shared.clone() as Arc<dyn Provider>));
        (cli, memory)
    }

    #[test]
    fn test_zero_mode_parsing() {
        let (cli, _) = memory_cli(ConfMode::Zero);
        let invocation = cli
            .parse(["stack", "--poll-interval", "0", "print"])
            .unwrap();
        assert_eq!(invocation.command, "print");
        assert_eq!(invocation.global.poll_interval, 0);
        assert!(matches!(invocation.conf, ConfInput::Defaults));
    }

    #[test]
    fn test_inline_mode_collects_overrides() {
        let (cli, _) = memory_cli(ConfMode::Inline);
        let invocation = cli
            .parse(["stack", "--conf", "region=us-east-1", "--conf", "flag", "create"])
            .unwrap();
        match invocation.conf {
            ConfInput::Overrides(tokens) => assert_eq!(tokens, vec!["region=us-east-1", "flag"]),
            other => panic!("unexpected conf input: {:?}", other),
        }
    }

    #[test]
    fn test_partitioned_mode_requires_file() {
        let (cli, _) = memory_cli(ConfMode::Partitioned);
        assert!(cli.parse(["stack", "print"]).is_err());
        let invocation = cli.parse(["stack", "conf.yaml", "print"]).unwrap();
        assert!(matches!(invocation.conf, ConfInput::File(_)));
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        let (cli, _) = memory_cli(ConfMode::Zero);
        let err = cli.parse(["stack", "explode"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }

    #[test]
    fn test_custom_command_is_accepted() {
        fn hello(session: &mut Session<'_>) -> anyhow::Result<()> {
            let name = session.stackname()?;
            session.println(format!("hello {}", name))?;
            Ok(())
        }

        let (cli, _) = memory_cli(ConfMode::Zero);
        let cli = cli.command("hello", "Say hello", hello);
        let mut out = Vec::<u8>::new();
        cli.run_with_output(["stack", "hello"], &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "hello my-bucket\n");
    }

    #[test]
    fn test_print_renders_template() {
        let (cli, memory) = memory_cli(ConfMode::Zero);
        let mut out = Vec::<u8>::new();
        cli.run_with_output(["stack", "print"], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("AWS::S3::Bucket"));
        assert!(memory.stack_names().is_empty());
    }

    #[test]
    fn test_partitioned_config_is_loaded() {
        use std::io::Write as _;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"region: us-east-1\nmy-bucket:\n  env: dev\n").unwrap();

        let spec = StackSpec::builder("my-bucket", Variant::ENV)
            .resource("bucket", |_| Ok(Resource::new("Bucket", "AWS::S3::Bucket")))
            .build();
        let regions = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen = regions.clone();
        let cli = StackCli::new(spec, ConfMode::Partitioned).provider_factory(move |_, region| {
            seen.lock().unwrap().push(region.to_string());
            Ok(Arc::new(MemoryProvider::new(region)) as Arc<dyn Provider>)
        });

        let path = file.path().to_str().unwrap().to_string();
        let mut out = Vec::<u8>::new();
        cli.run_with_output(["stack", path.as_str(), "create", "--poll-interval", "0"], &mut out)
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Stack creation initiated for: arn:memory:us-east-1:stack/my-bucket-dev/"));
        assert_eq!(*regions.lock().unwrap(), vec!["us-east-1"]);
    }

    #[test]
    fn test_missing_config_file() {
        let (cli, _) = memory_cli(ConfMode::Partitioned);
        let err = cli
            .run_with_output(["stack", "/nonexistent/stackcraft.yaml", "print"], &mut Vec::<u8>::new())
            .unwrap_err();
        assert!(err.to_string().contains("failed to load configuration"));
    }
}

use clap::{Parser, ValueEnum};

use git_release::config::{self, Configuration};
use git_release::git::Git2Repository;
use git_release::pipeline::{Command, Orchestrator};
use git_release::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CliCommand {
    /// Infer the next version (read-only)
    Infer,
    /// Infer, then commit/tag/push as configured
    Mark,
    /// Infer, mark, then build the changelog
    Make,
    /// Run the full pipeline including publication
    Publish,
    /// Alias for the full pipeline
    Release,
}

impl From<CliCommand> for Command {
    fn from(command: CliCommand) -> Self {
        match command {
            CliCommand::Infer => Command::Infer,
            CliCommand::Mark => Command::Mark,
            CliCommand::Make => Command::Make,
            CliCommand::Publish => Command::Publish,
            CliCommand::Release => Command::Release,
        }
    }
}

#[derive(Parser)]
#[command(
    name = "git-release",
    version,
    about = "Derive, tag and publish semantic releases from conventional commits"
)]
struct Args {
    /// Pipeline command to run
    #[arg(value_enum, default_value = "infer")]
    command: CliCommand,

    /// Working directory of the repository
    #[arg(short, long)]
    directory: Option<String>,

    /// Explicit configuration file path
    #[arg(short, long)]
    configuration_file: Option<String>,

    /// Shared configuration file path
    #[arg(long)]
    shared_configuration_file: Option<String>,

    /// Configuration preset (simple, extended)
    #[arg(short, long)]
    preset: Option<String>,

    /// State file path (.yml/.yaml for YAML, anything else for JSON)
    #[arg(long)]
    state_file: Option<String>,

    /// Resume from the state file when possible
    #[arg(long)]
    resume: bool,

    /// Log side effects without performing them
    #[arg(long)]
    dry_run: bool,

    /// Explicit bump override (major, minor, patch or a named identifier)
    #[arg(long)]
    bump: Option<String>,

    /// Prefix prepended to release tags (e.g. "v")
    #[arg(long)]
    release_prefix: Option<String>,

    /// Version released when history carries no matching tag yet
    #[arg(long)]
    initial_version: Option<String>,

    /// Versioning scheme (semver)
    #[arg(long)]
    scheme: Option<String>,

    /// Explicit version override; skips inference
    #[arg(long = "set-version")]
    set_version: Option<String>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbosity: u8,

    /// Print the inferred version to stdout
    #[arg(long)]
    summary: bool,
}

impl Args {
    /// The command-line configuration layer
    fn to_configuration(&self) -> Result<Configuration> {
        let scheme = self.scheme.as_deref().map(str::parse).transpose()?;
        Ok(Configuration {
            bump: self.bump.clone(),
            configuration_file: self.configuration_file.clone(),
            directory: self.directory.clone(),
            dry_run: self.dry_run.then_some(true),
            initial_version: self.initial_version.clone(),
            preset: self.preset.clone(),
            release_prefix: self.release_prefix.clone(),
            resume: self.resume.then_some(true),
            scheme,
            shared_configuration_file: self.shared_configuration_file.clone(),
            state_file: self.state_file.clone(),
            version: self.set_version.clone(),
            ..Configuration::default()
        })
    }
}

fn init_tracing(verbosity: u8) {
    let default_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: &Args) -> Result<()> {
    let effective = config::resolve(args.to_configuration()?)?;
    let repo = Git2Repository::open(effective.directory())?;
    let mut orchestrator = Orchestrator::new(effective, &repo)?;
    orchestrator.run(args.command.into())?;

    let state = orchestrator.state();
    if args.summary {
        if let Some(version) = &state.version {
            println!("{}", version);
        }
    }
    Ok(())
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbosity);

    if let Err(e) = run(&args) {
        tracing::error!("{}", e);
        std::process::exit(e.exit_code());
    }
}

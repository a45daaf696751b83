//! sitepipe CLI: synthesizes the static site pipeline into a cloud assembly.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "sitepipe")]
#[command(about = "Static site delivery pipeline synthesizer", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "SITEPIPE_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConfigArgs {
    /// Project configuration file
    #[arg(
        long,
        global = true,
        env = "SITEPIPE_PROJECT",
        default_value = "config/project.yaml"
    )]
    project: PathBuf,

    /// Tag map applied to every resource
    #[arg(long, global = true, env = "SITEPIPE_TAGS", default_value = "tags.json")]
    tags: PathBuf,

    /// Provisioning tool configuration
    #[arg(
        long,
        global = true,
        env = "SITEPIPE_TOOL_CONFIG",
        default_value = "cdk.json"
    )]
    tool_config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the credentials profiles and the cloud assembly
    Synth {
        /// Assembly output directory
        #[arg(short, long, env = "SITEPIPE_OUT", default_value = "cdk.out")]
        output: PathBuf,
        /// Credentials profile file to write
        #[arg(long, default_value = ".aws/config")]
        profiles: PathBuf,
    },
    /// Load and synthesize in memory without writing anything
    Validate,
    /// List stacks in deployment order
    List {
        /// Print JSON instead of one name per line
        #[arg(long)]
        json: bool,
    },
    /// Write only the credentials profile file
    Profiles {
        /// Credentials profile file to write
        #[arg(long, default_value = ".aws/config")]
        profiles: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let paths = commands::ConfigPaths {
        project: cli.config.project,
        tags: cli.config.tags,
        tool_config: cli.config.tool_config,
    };

    match cli.command {
        Commands::Synth { output, profiles } => {
            commands::synth::run(&paths, &output, &profiles)?;
        }
        Commands::Validate => {
            commands::validate(&paths)?;
        }
        Commands::List { json } => {
            commands::list(&paths, json)?;
        }
        Commands::Profiles { profiles } => {
            commands::synth::profiles(&paths, &profiles)?;
        }
    }

    Ok(())
}

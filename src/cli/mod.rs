pub mod config;
pub mod history;
pub mod run;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use config::{process_config_command, ConfigCommand};
use history::{process_compact_command, process_history_command, CompactCommand, HistoryCommand};
use run::{process_run_command, RunCommand};
use tracing::level_filters::LevelFilter;

use crate::utils::{
    dir::application_path,
    logging::{enable_logging, CLI_PREFIX, SESSION_PREFIX},
};

#[derive(Parser, Debug)]
#[command(name = "Screentime", version, long_about = None)]
#[command(about = "Tracks screen time and reminds you to look away and take breaks", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default uses $XDG_STATE_HOME/screentime or $HOME/.local/state/screentime"
    )]
    dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Print logs to the console")]
    log: bool,
    #[arg(long = "log-filter", global = true, help = "Log level, for example debug or trace")]
    log_filter: Option<LevelFilter>,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Run a session in this terminal with look-away and break reminders")]
    Run {
        #[command(flatten)]
        command: RunCommand,
    },
    #[command(about = "Display screen time of the last days")]
    History {
        #[command(flatten)]
        command: HistoryCommand,
    },
    #[command(about = "Drop history entries older than the retention window")]
    Compact {
        #[command(flatten)]
        command: CompactCommand,
    },
    #[command(about = "Show or change settings")]
    Config {
        #[command(flatten)]
        command: ConfigCommand,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let app_dir = application_path(args.dir)?;
    let prefix = match args.commands {
        Commands::Run { .. } => SESSION_PREFIX,
        _ => CLI_PREFIX,
    };
    enable_logging(prefix, &app_dir, args.log_filter, args.log)?;

    match args.commands {
        Commands::Run { command } => process_run_command(command, &app_dir).await,
        Commands::History { command } => process_history_command(command, &app_dir).await,
        Commands::Compact { command } => process_compact_command(command, &app_dir).await,
        Commands::Config { command } => process_config_command(command, &app_dir).await,
    }
}

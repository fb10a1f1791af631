//! Command line entry point.

use clap::{Parser, Subcommand};
use ductline_app::{load_config, load_script, render_report, replay};
use ductline_core::EngineConfig;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "ductline", version, about = "Headless duct centerline drawing")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a pointer script and print the resulting centerlines as JSON.
    Replay {
        script: PathBuf,
        /// Engine configuration file (JSON).
        #[arg(long)]
        config: Option<PathBuf>,
        /// Pretty-print the output.
        #[arg(long)]
        pretty: bool,
    },
    /// Validate an engine configuration file.
    CheckConfig { path: PathBuf },
}

fn run(cli: Cli) -> ductline_app::Result<()> {
    match cli.command {
        Commands::Replay {
            script,
            config,
            pretty,
        } => {
            let config = load_config(config.as_deref())?;
            let script = load_script(&script)?;
            let report = replay(&config, &script)?;
            println!("{}", render_report(&report, pretty)?);
        }
        Commands::CheckConfig { path } => {
            EngineConfig::load(&path)?;
            println!("{} is valid", path.display());
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

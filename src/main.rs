use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use rip_daemon::runtime::config::{load_config, render_causes};
use rip_daemon::runtime::daemon::RouterDaemon;

#[derive(Debug, Parser)]
#[command(name = "rip-daemon")]
#[command(about = "RIP-style distance-vector routing daemon for simulated networks")]
struct Args {
    /// Path to the router configuration file.
    config: PathBuf,
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() {
    let args = Args::parse();
    if let Err(err) = init_logging(&args.log_level) {
        eprintln!("{err}");
        process::exit(1);
    }

    let cfg = match load_config(&args.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("{}", render_causes(&err));
            process::exit(2);
        }
    };

    let mut daemon = match RouterDaemon::new(cfg) {
        Ok(daemon) => daemon,
        Err(err) => {
            eprintln!("{err:#}");
            process::exit(1);
        }
    };

    // The loop only returns on a fatal runtime error.
    if let Err(err) = daemon.run_forever() {
        eprintln!("{err:#}");
        process::exit(1);
    }
}

fn init_logging(level: &str) -> Result<()> {
    let level = level.parse::<Level>()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(true)
        .compact()
        .init();
    Ok(())
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reaper Daemon (reaperd)
//!
//! Watches the pods of every configured cloud and keeps the agent list in
//! step with them.
//!
//! Signals:
//! - SIGHUP: re-read the config file and apply the cloud list
//! - SIGINT/SIGTERM: close every watch and exit

use std::path::PathBuf;

use clap::Parser;
use reaper_daemon::config::{summary, Settings};
use reaper_daemon::{env, lifecycle, logging};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "reaperd", version, about = "Reconciles build agents with their Kubernetes pods")]
struct Cli {
    /// Config file (default: $REAPER_CONFIG, then $XDG_CONFIG_HOME/reaper/reaper.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate the config file, print a summary and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let path = match cli.config {
        Some(path) => path,
        None => env::config_path()?,
    };

    if cli.check {
        let settings = Settings::load(&path)?;
        println!("{}: ok", path.display());
        println!("{}", summary(&settings));
        return Ok(());
    }

    let log_guard = logging::setup_logging(env::log_dir().as_deref())?;
    info!(version = env!("CARGO_PKG_VERSION"), "starting reaperd");

    let daemon = match lifecycle::startup(&path).await {
        Ok(daemon) => daemon,
        Err(e) => {
            error!(error = %e, "failed to start");
            drop(log_guard);
            return Err(e.into());
        }
    };

    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    info!("reaper ready");

    loop {
        tokio::select! {
            _ = sighup.recv() => {
                info!(config = %path.display(), "reloading config");
                lifecycle::reload(&daemon, &path).await;
            }
            _ = sigterm.recv() => {
                info!("received SIGTERM, shutting down");
                break;
            }
            _ = sigint.recv() => {
                info!("received SIGINT, shutting down");
                break;
            }
        }
    }

    daemon.shutdown(env::drain_timeout()).await;
    info!("reaperd stopped");
    Ok(())
}

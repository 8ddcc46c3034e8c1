use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Args, Subcommand};

use crate::client::{DaemonClient, spawn_daemon, stop_daemon};
use crate::error::DaemonError;
use crate::models::Config;
use crate::server::run_daemon;

#[derive(Debug, Args)]
pub struct ServeArgs {
    #[command(subcommand)]
    pub command: Option<ServeCommand>,

    /// Set by the auto-start path; runs the server loop in this process.
    #[arg(long, hide = true)]
    pub daemon: bool,

    #[arg(long, help = "Run the daemon in the foreground")]
    pub foreground: bool,
}

#[derive(Debug, Subcommand)]
pub enum ServeCommand {
    #[command(about = "Stop the running daemon")]
    Stop,
    #[command(about = "Restart the daemon; the loaded corpus is discarded")]
    Restart,
}

pub async fn handle_serve(args: ServeArgs) -> Result<()> {
    let config = Config::load()?;

    if args.daemon || args.foreground {
        if args.foreground {
            eprintln!("logsage daemon listening on {}", config.socket_path().display());
        }
        return run_daemon(config)
            .await
            .map_err(|e| anyhow::anyhow!("daemon exited with error: {}", e));
    }

    let client = DaemonClient::new(&config);
    match args.command {
        None => start(&client).await,
        Some(ServeCommand::Stop) => stop(&config, &client).await,
        Some(ServeCommand::Restart) => {
            stop(&config, &client).await?;
            start(&client).await
        }
    }
}

async fn start(client: &DaemonClient) -> Result<()> {
    if client.is_running() {
        println!("Daemon is already running ({})", client.socket_path().display());
        return Ok(());
    }

    spawn_daemon()?;
    client
        .wait_for_ready()
        .await
        .context("daemon did not become ready")?;

    println!("Daemon started ({})", client.socket_path().display());
    Ok(())
}

async fn stop(config: &Config, client: &DaemonClient) -> Result<()> {
    let stopped = if client.is_running() {
        client.shutdown().await.is_ok() || stop_daemon(config).is_ok()
    } else {
        match stop_daemon(config) {
            Ok(()) => true,
            Err(DaemonError::NotRunning) => false,
            Err(e) => return Err(e.into()),
        }
    };

    if !stopped {
        println!("Daemon is not running");
        return Ok(());
    }

    let deadline = Instant::now() + Duration::from_secs(5);
    while client.is_running() {
        if Instant::now() >= deadline {
            bail!("daemon is still answering on {}", client.socket_path().display());
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    println!("Daemon stopped");
    Ok(())
}

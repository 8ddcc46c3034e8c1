use anyhow::Result;

use crate::cli::output::{StatusInfo, get_formatter};
use crate::client::DaemonClient;
use crate::models::{Config, OutputFormat, SessionStatus};

pub async fn handle_status(format: OutputFormat, verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);

    let client = DaemonClient::new(&config);
    let health = if client.is_running() {
        match client.health().await {
            Ok(health) => Some(health),
            Err(e) => {
                if verbose {
                    eprintln!("Health request failed: {}", e);
                }
                None
            }
        }
    } else {
        None
    };

    let status = StatusInfo {
        daemon_running: health.is_some(),
        socket_path: client.socket_path().display().to_string(),
        health,
    };

    print!("{}", formatter.format_status(&status));

    match status.health.as_ref().map(|h| &h.service.session) {
        None => {
            eprintln!();
            eprintln!("Hint: daemon not running. It starts automatically on upload/ask.");
            eprintln!("      Or start it manually with: logsage serve");
        }
        Some(SessionStatus::Empty) => {
            eprintln!();
            eprintln!("Hint: no corpus loaded yet. Load one with: logsage upload <file>");
        }
        Some(_) => {}
    }

    Ok(())
}

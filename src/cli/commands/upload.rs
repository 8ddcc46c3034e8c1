use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

use crate::cli::commands::describe_error;
use crate::cli::output::get_formatter;
use crate::client::DaemonClient;
use crate::models::{Config, OutputFormat};

#[derive(Debug, Args)]
pub struct UploadArgs {
    #[arg(required = true, help = "File to load as the corpus (.txt, .log, .md, .csv)")]
    pub path: PathBuf,
}

pub async fn handle_upload(args: UploadArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);

    if !args.path.is_file() {
        anyhow::bail!("file not found: {}", args.path.display());
    }
    if verbose {
        eprintln!("Uploading: {}", args.path.display());
        eprintln!("  Socket: {}", config.socket_path().display());
    }

    let client = DaemonClient::new(&config);

    let pb = if format == OutputFormat::Text {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap(),
        );
        pb.set_message("building corpus (load, chunk, embed, index)");
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    } else {
        None
    };

    let result = client.upload(&args.path).await;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    match result {
        Ok(report) => {
            print!("{}", formatter.format_upload(&report));
            Ok(())
        }
        Err(e) => {
            eprint!("{}", formatter.format_error(&describe_error(&e)));
            Err(anyhow::anyhow!("upload of {} failed", args.path.display()))
        }
    }
}

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::cli::output::{Formatter, get_formatter};
use crate::models::{Config, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    #[command(about = "Write a configuration file with default values")]
    Init {
        #[arg(long, short = 'f', help = "Force overwrite existing config")]
        force: bool,
    },
    #[command(about = "Show the effective configuration")]
    Show,
    #[command(about = "Show configuration and data paths")]
    Path,
}

pub async fn handle_config(cmd: ConfigCommand, format: OutputFormat, _verbose: bool) -> Result<()> {
    let formatter = get_formatter(format);

    match cmd {
        ConfigCommand::Init { force } => handle_init(force, formatter.as_ref()),
        ConfigCommand::Show => handle_show(format),
        ConfigCommand::Path => handle_path(format),
    }
}

fn handle_init(force: bool, formatter: &dyn Formatter) -> Result<()> {
    let config_path =
        Config::config_path().ok_or_else(|| anyhow::anyhow!("could not determine config directory"))?;

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config already exists at: {}\nUse --force to overwrite.",
            config_path.display()
        );
    }

    let path = Config::default()
        .save()
        .context("failed to write config")?;
    println!(
        "{}",
        formatter.format_message(&format!("Created config at: {}", path.display()))
    );
    Ok(())
}

fn handle_show(format: OutputFormat) -> Result<()> {
    let config = Config::load()?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    if let Some(path) = Config::config_path().filter(|p| p.exists()) {
        println!("# Config file: {}", path.display());
    } else {
        println!("# No config file; showing defaults");
    }
    println!();
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn handle_path(format: OutputFormat) -> Result<()> {
    let config = Config::load()?;
    let config_path = Config::config_path();

    if format == OutputFormat::Json {
        let output = serde_json::json!({
            "config": config_path,
            "config_exists": config_path.as_ref().is_some_and(|p| p.exists()),
            "socket": config.socket_path(),
            "pid": config.pid_path(),
            "uploads": config.upload_dir(),
            "metrics": Config::metrics_db_path(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Configuration paths:");
    println!();
    match config_path {
        Some(ref path) if path.exists() => println!("Config (active):   {}", path.display()),
        Some(ref path) => println!("Config (would be): {}", path.display()),
        None => println!("Config:            <no config directory>"),
    }
    println!("Socket:            {}", config.socket_path().display());
    println!("PID file:          {}", config.pid_path().display());
    println!("Uploads:           {}", config.upload_dir().display());
    if let Some(path) = Config::metrics_db_path() {
        println!("Metrics:           {}", path.display());
    }

    if let Ok(cwd) = std::env::current_dir() {
        let env_path = cwd.join(".env");
        if env_path.exists() {
            println!(".env file:         {}", env_path.display());
        }
    }

    Ok(())
}

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::cli::output::{Formatter, get_formatter};
use crate::models::{CONFIG_ENV, Config, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    #[command(about = "Write a default configuration file")]
    Init {
        #[arg(long, short = 'f', help = "Force overwrite existing config")]
        force: bool,
    },
    #[command(about = "Show the effective configuration")]
    Show,
    #[command(about = "Show the configuration file path")]
    Path,
}

pub async fn handle_config(cmd: ConfigCommand, format: OutputFormat, _verbose: bool) -> Result<()> {
    let formatter = get_formatter(format);

    match cmd {
        ConfigCommand::Init { force } => handle_init(force, formatter.as_ref()),
        ConfigCommand::Show => handle_show(format),
        ConfigCommand::Path => handle_path(formatter.as_ref()),
    }
}

fn handle_init(force: bool, formatter: &dyn Formatter) -> Result<()> {
    let config_path = Config::config_path()
        .ok_or_else(|| anyhow::anyhow!("could not determine config directory"))?;

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config already exists at: {}\nUse --force to overwrite.",
            config_path.display()
        );
    }

    let path = Config::default()
        .save()
        .context("failed to write default config")?;
    println!(
        "{}",
        formatter.format_message(&format!("Created config at: {}", path.display()))
    );
    Ok(())
}

fn handle_show(format: OutputFormat) -> Result<()> {
    let mut config = Config::load()?;
    if config.index.api_key.is_some() {
        config.index.api_key = Some("********".to_string());
    }

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    if let Some(path) = Config::config_path().filter(|p| p.exists()) {
        println!("# Loaded from: {}", path.display());
    } else {
        println!("# No config file found, showing defaults");
    }
    println!();
    print!(
        "{}",
        toml::to_string_pretty(&config).context("failed to render config")?
    );
    Ok(())
}

fn handle_path(formatter: &dyn Formatter) -> Result<()> {
    let path = Config::config_path()
        .ok_or_else(|| anyhow::anyhow!("could not determine config directory"))?;
    let status = if path.exists() { "exists" } else { "not created" };
    println!(
        "{}",
        formatter.format_message(&format!("{} ({status})", path.display()))
    );
    if std::env::var_os(CONFIG_ENV).is_some() {
        eprintln!("(overridden by {CONFIG_ENV})");
    }
    Ok(())
}

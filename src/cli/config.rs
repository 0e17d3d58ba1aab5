//! Config command implementation
//!
//! Utilities for validating and inspecting configuration.

use clap::{Args, Subcommand};

use kirobar::providers::kiro::KiroProvider;
use kirobar::settings::Settings;

use super::to_json;

/// Arguments for the config command
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Validate the settings file and check that kiro-cli can be found
    Validate,
    /// Dump effective configuration to stdout as JSON
    Dump,
    /// Show configuration file paths
    Path,
    /// Write a settings file with default values (keeps an existing file)
    Init,
}

/// Run the config command
pub async fn run(args: ConfigArgs, settings: &Settings, pretty: bool) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Validate => validate_config(settings),
        ConfigCommand::Dump => {
            println!("{}", to_json(settings, pretty)?);
            Ok(())
        }
        ConfigCommand::Path => show_paths(),
        ConfigCommand::Init => init_config(),
    }
}

/// Validate configuration files
fn validate_config(settings: &Settings) -> anyhow::Result<()> {
    let mut errors: Vec<String> = Vec::new();

    print!("Checking settings.json... ");
    match Settings::settings_path() {
        Some(path) if path.exists() => match Settings::load_from(&path) {
            Ok(_) => println!("OK"),
            Err(e) => {
                println!("INVALID");
                errors.push(format!("settings.json: {}", e));
            }
        },
        Some(_) => println!("NOT FOUND (using defaults)"),
        None => {
            println!("ERROR");
            errors.push("settings.json: Could not determine config path".to_string());
        }
    }

    print!("Checking kiro-cli... ");
    match KiroProvider::locate_binary(&settings.fetch_context()) {
        Ok(path) => println!("{}", path.display()),
        Err(e) => {
            println!("MISSING");
            errors.push(e.to_string());
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        for error in &errors {
            eprintln!("  {}", error);
        }
        anyhow::bail!("{} configuration problem(s) found", errors.len())
    }
}

/// Show configuration file paths
fn show_paths() -> anyhow::Result<()> {
    match Settings::settings_path() {
        Some(path) => {
            let status = if path.exists() { "" } else { " (not created)" };
            println!("settings: {}{}", path.display(), status);
            Ok(())
        }
        None => anyhow::bail!("Could not determine config path"),
    }
}

/// Write default settings unless a file already exists
fn init_config() -> anyhow::Result<()> {
    let path = Settings::settings_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config path"))?;
    if path.exists() {
        println!("Settings already exist at {}", path.display());
        return Ok(());
    }

    Settings::default().save()?;
    println!("Wrote default settings to {}", path.display());
    Ok(())
}

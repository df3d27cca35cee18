//! `helpdesk config` - inspect or create the config file

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use helpdesk_core::HelpdeskConfig;

use crate::load_config;

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show config file path
    Path,
    /// Print the effective configuration (secrets masked)
    Show,
    /// Write a config file with default values
    Init(InitArgs),
}

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Force overwrite existing config
    #[arg(long, short)]
    pub force: bool,
}

pub fn run_config(args: ConfigArgs, explicit: Option<&Path>) -> Result<()> {
    match args.command {
        ConfigCommands::Path => run_path(explicit),
        ConfigCommands::Show => run_show(explicit),
        ConfigCommands::Init(args) => run_init(args, explicit),
    }
}

fn target_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(HelpdeskConfig::config_path)
}

fn run_path(explicit: Option<&Path>) -> Result<()> {
    let path = target_path(explicit);
    let note = if path.exists() { "" } else { " (not created yet)" };
    println!("{}{}", path.display(), note);
    Ok(())
}

fn run_show(explicit: Option<&Path>) -> Result<()> {
    let config = load_config(explicit)?;
    print!("{}", config.redacted().to_toml_string()?);
    Ok(())
}

fn run_init(args: InitArgs, explicit: Option<&Path>) -> Result<()> {
    let path = target_path(explicit);

    if path.exists() && !args.force {
        return Err(anyhow::anyhow!(
            "Config already exists at {}\n\nUse --force to overwrite",
            path.display()
        ));
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let content = HelpdeskConfig::default().to_toml_string()?;
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("Wrote default config to {}", path.display());
    Ok(())
}

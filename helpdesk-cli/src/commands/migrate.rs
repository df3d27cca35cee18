//! `helpdesk migrate` - create or update the schema

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use helpdesk_server::db::migrations;

use crate::load_config;

#[derive(Parser, Debug)]
pub struct MigrateArgs {
    /// Database URL (overrides config and DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,
}

pub async fn run_migrate(args: MigrateArgs, config_path: Option<&Path>) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(url) = args.database_url {
        config.database.url = url;
    }

    let pool = super::connect(&config).await?;
    migrations::run(&pool)
        .await
        .context("Failed to run migrations")?;

    println!("Schema is up to date");
    Ok(())
}

//! `helpdesk serve` - HTTP API plus the escalation worker

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use helpdesk_server::db::migrations;
use helpdesk_server::escalation::EscalationService;
use helpdesk_server::http::{run_server, EscalationWorker, ServerConfig};
use helpdesk_server::mail::build_mailer;
use helpdesk_server::AppState;

use crate::load_config;

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind to (overrides config; default 127.0.0.1:8000)
    #[arg(long, short = 'b')]
    pub bind: Option<SocketAddr>,

    /// Allow permissive CORS (all origins) - use with caution
    #[arg(long)]
    pub cors_permissive: bool,

    /// Database URL (overrides config and DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Do not run the background escalation worker
    #[arg(long)]
    pub no_escalation: bool,

    /// Start without applying schema migrations
    #[arg(long)]
    pub skip_migrations: bool,
}

/// Run the HTTP server until Ctrl+C or SIGTERM
pub async fn run_serve(args: ServeArgs, config_path: Option<&Path>) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(url) = args.database_url {
        config.database.url = url;
    }
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    let policy = config.escalation_policy()?;

    tracing::info!("Starting helpdesk server on {}", config.server.bind);

    let pool = super::connect(&config).await?;
    if !args.skip_migrations {
        migrations::run(&pool)
            .await
            .context("Failed to run migrations")?;
    }

    let worker = if config.escalation.enabled && !args.no_escalation {
        let mailer = build_mailer(&config.mail).context("Failed to configure mail")?;
        Some(EscalationWorker {
            service: EscalationService::new(
                pool.clone(),
                policy,
                mailer,
                config.mail.admin_recipients.clone(),
            ),
            interval: Duration::from_secs(config.escalation.interval_secs),
        })
    } else {
        None
    };

    let server_config = ServerConfig {
        bind_addr: config.server.bind,
        cors_permissive: args.cors_permissive || config.server.cors_permissive,
    };

    // Blocks until shutdown
    run_server(AppState::new(pool, policy), server_config, worker)
        .await
        .context("Server error")?;

    Ok(())
}

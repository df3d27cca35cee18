//! `helpdesk escalate` - one sweep, outside the server

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use helpdesk_server::db::EscalatedTicket;
use helpdesk_server::escalation::EscalationService;
use helpdesk_server::mail::build_mailer;

use crate::load_config;

#[derive(Parser, Debug)]
pub struct EscalateArgs {
    /// List the tickets that are due without changing them
    #[arg(long)]
    pub dry_run: bool,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,

    /// Database URL (overrides config and DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,
}

fn print_table(tickets: &[EscalatedTicket]) {
    println!(
        "{:<36}  {:<6}  {:<11}  {:<20}  TITLE",
        "ID", "PRIO", "STATUS", "LAST ACTIVITY"
    );
    for t in tickets {
        println!(
            "{:<36}  {:<6}  {:<11}  {:<20}  {}",
            t.id,
            t.priority.as_str(),
            t.previous_status.as_str(),
            t.updated_at.format("%Y-%m-%d %H:%M:%S"),
            t.title
        );
    }
}

fn to_json(tickets: &[EscalatedTicket]) -> serde_json::Value {
    serde_json::Value::Array(
        tickets
            .iter()
            .map(|t| {
                serde_json::json!({
                    "id": t.id,
                    "title": t.title,
                    "priority": t.priority,
                    "previous_status": t.previous_status,
                    "updated_at": t.updated_at,
                    "escalation_date": t.escalation_date,
                    "assigned_to": t.assigned_to,
                })
            })
            .collect(),
    )
}

pub async fn run_escalate(args: EscalateArgs, config_path: Option<&Path>) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(url) = args.database_url {
        config.database.url = url;
    }

    let pool = super::connect(&config).await?;
    let mailer = build_mailer(&config.mail).context("Failed to configure mail")?;
    let service = EscalationService::new(
        pool,
        config.escalation_policy()?,
        mailer,
        config.mail.admin_recipients.clone(),
    );

    if args.dry_run {
        let due = service
            .preview()
            .await
            .context("Failed to list due tickets")?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&to_json(&due))?);
        } else if due.is_empty() {
            println!("No tickets are due for escalation");
        } else {
            println!("{} ticket(s) would be escalated:", due.len());
            print_table(&due);
        }
        return Ok(());
    }

    let report = service.sweep().await.context("Escalation sweep failed")?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&to_json(&report.escalated))?);
    } else if report.escalated.is_empty() {
        println!("No tickets were due for escalation");
    } else {
        println!(
            "Escalated {} ticket(s); {} notice(s) sent, {} failed",
            report.escalated.len(),
            report.notified,
            report.notify_failures
        );
        print_table(&report.escalated);
    }
    Ok(())
}

//! helpdesk CLI - run and administer the helpdesk service
//!
//! - `serve`: HTTP API plus the background escalation worker
//! - `migrate`: create or update the database schema
//! - `escalate`: run one escalation sweep by hand
//! - `user`: bootstrap accounts (the first admin in particular)
//! - `config`: inspect or create the config file

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use helpdesk_core::HelpdeskConfig;

mod commands;
mod config;
mod tracing_setup;

#[derive(Parser, Debug)]
#[command(
    name = "helpdesk",
    author,
    version,
    about = "Helpdesk ticketing service with role-based access and automatic escalation"
)]
struct Cli {
    /// Config file (default: ~/.helpdesk/config.toml)
    #[arg(long, global = true, env = "HELPDESK_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG still wins when set)
    #[arg(long, global = true)]
    debug: bool,

    /// Export traces over OTLP (requires the `telemetry` feature)
    #[arg(long, global = true)]
    otel: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API server and escalation worker
    Serve(commands::serve::ServeArgs),
    /// Create or update the database schema
    Migrate(commands::migrate::MigrateArgs),
    /// Escalate overdue tickets once
    Escalate(commands::escalate::EscalateArgs),
    /// Manage user accounts
    User(commands::user::UserArgs),
    /// Manage helpdesk configuration (path, show, init)
    Config(config::ConfigArgs),
    /// Generate shell completion scripts
    Completions(CompletionsArgs),
}

#[derive(Parser, Debug)]
struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    shell: Shell,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)] // PowerShell is a proper noun, not a suffix
enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

/// Load configuration with environment overrides applied.
pub(crate) fn load_config(path: Option<&std::path::Path>) -> Result<HelpdeskConfig> {
    HelpdeskConfig::load(path).with_context(|| match path {
        Some(p) => format!("Failed to load config from {}", p.display()),
        None => "Failed to load config".to_string(),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    tracing_setup::init(&tracing_setup::TracingConfig::new(cli.debug, cli.otel)).ok();

    let config_path = cli.config.as_deref();
    let result = match cli.command {
        Commands::Serve(args) => commands::run_serve(args, config_path).await,
        Commands::Migrate(args) => commands::run_migrate(args, config_path).await,
        Commands::Escalate(args) => commands::run_escalate(args, config_path).await,
        Commands::User(args) => commands::run_user(args, config_path).await,
        Commands::Config(args) => config::run_config(args, config_path),
        Commands::Completions(args) => run_completions(args),
    };

    tracing_setup::shutdown_otel();
    result
}

fn run_completions(args: CompletionsArgs) -> Result<()> {
    use clap::CommandFactory;
    use clap_complete::{generate, Shell as CompletionShell};
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();

    let shell = match args.shell {
        Shell::Bash => CompletionShell::Bash,
        Shell::Zsh => CompletionShell::Zsh,
        Shell::Fish => CompletionShell::Fish,
        Shell::PowerShell => CompletionShell::PowerShell,
        Shell::Elvish => CompletionShell::Elvish,
    };

    generate(shell, &mut cmd, bin_name, &mut io::stdout());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["helpdesk", "escalate", "--dry-run", "--debug"]).unwrap();
        assert!(cli.debug);
        assert!(matches!(cli.command, Commands::Escalate(ref a) if a.dry_run));
    }

    #[test]
    fn serve_migrates_unless_told_not_to() {
        let cli = Cli::try_parse_from(["helpdesk", "serve"]).unwrap();
        assert!(matches!(cli.command, Commands::Serve(ref a) if !a.skip_migrations));

        let cli = Cli::try_parse_from(["helpdesk", "serve", "--skip-migrations"]).unwrap();
        assert!(matches!(cli.command, Commands::Serve(ref a) if a.skip_migrations));
    }

    #[test]
    fn set_password_subcommand_parses() {
        let cli = Cli::try_parse_from(["helpdesk", "user", "set-password", "--username", "ada"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Commands::User(commands::user::UserArgs {
                command: commands::user::UserCommands::SetPassword(_)
            })
        ));
    }
}

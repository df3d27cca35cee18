//! `helpdesk user` - account administration from the shell
//!
//! Self-registration over the API only ever creates plain users; this is
//! how the first admin (and any agent) gets created, and how a forgotten
//! password gets reset.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use helpdesk_core::models::{Email, Password, Username};
use helpdesk_core::Role;
use helpdesk_server::auth::hash_password_blocking;
use helpdesk_server::db::{NewUser, TokenRepo, UserRepo};

use crate::load_config;

#[derive(Parser, Debug)]
pub struct UserArgs {
    #[command(subcommand)]
    pub command: UserCommands,
}

#[derive(Subcommand, Debug)]
pub enum UserCommands {
    /// Create an account with any role
    Create(CreateArgs),

    /// Replace a user's password and sign out all their sessions
    SetPassword(SetPasswordArgs),
}

#[derive(Parser, Debug)]
pub struct CreateArgs {
    #[arg(long)]
    pub username: String,

    #[arg(long)]
    pub email: String,

    /// user, agent or admin
    #[arg(long, default_value = "user", value_parser = parse_role)]
    pub role: Role,

    /// Prompted for when omitted
    #[arg(long, env = "HELPDESK_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    #[arg(long, default_value = "")]
    pub first_name: String,

    #[arg(long, default_value = "")]
    pub last_name: String,

    /// Database URL (overrides config and DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,
}

#[derive(Parser, Debug)]
pub struct SetPasswordArgs {
    #[arg(long)]
    pub username: String,

    /// Prompted for when omitted
    #[arg(long, env = "HELPDESK_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Database URL (overrides config and DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,
}

fn parse_role(s: &str) -> Result<Role, String> {
    s.parse::<Role>().map_err(|e| e.to_string())
}

fn prompt_password() -> Result<String> {
    inquire::Password::new("Password:")
        .with_help_message("at least 8 characters")
        .prompt()
        .map_err(|e| anyhow!("Password prompt failed: {}", e))
}

pub async fn run_user(args: UserArgs, config_path: Option<&Path>) -> Result<()> {
    match args.command {
        UserCommands::Create(args) => run_create(args, config_path).await,
        UserCommands::SetPassword(args) => run_set_password(args, config_path).await,
    }
}

fn read_password(given: Option<String>) -> Result<Password> {
    let raw = match given {
        Some(p) => p,
        None => prompt_password()?,
    };
    Ok(Password::new(&raw)?)
}

async fn run_create(args: CreateArgs, config_path: Option<&Path>) -> Result<()> {
    // Validate everything before touching the database
    let username = Username::new(&args.username)?;
    let email = Email::new(&args.email)?;
    let password = read_password(args.password)?;

    let mut config = load_config(config_path)?;
    if let Some(url) = args.database_url {
        config.database.url = url;
    }
    let pool = super::connect(&config).await?;

    let password_hash = hash_password_blocking(password.expose().to_owned()).await?;
    let user = UserRepo::new(&pool)
        .create(NewUser {
            username,
            email,
            first_name: args.first_name,
            last_name: args.last_name,
            role: args.role,
            phone_number: None,
            department: None,
            password_hash,
        })
        .await
        .context("Failed to create user")?;

    println!("Created {} '{}' ({})", user.role, user.username, user.id);
    Ok(())
}

async fn run_set_password(args: SetPasswordArgs, config_path: Option<&Path>) -> Result<()> {
    let username = Username::new(&args.username)?;
    let password = read_password(args.password)?;

    let mut config = load_config(config_path)?;
    if let Some(url) = args.database_url {
        config.database.url = url;
    }
    let pool = super::connect(&config).await?;

    let users = UserRepo::new(&pool);
    let (user, _) = users
        .find_credentials(username.as_str())
        .await
        .context("Failed to look up user")?
        .ok_or_else(|| anyhow!("No user named '{}'", username.as_str()))?;

    let password_hash = hash_password_blocking(password.expose().to_owned()).await?;
    users
        .set_password(user.id, &password_hash)
        .await
        .context("Failed to update password")?;
    let revoked = TokenRepo::new(&pool)
        .revoke_all(user.id)
        .await
        .context("Failed to revoke sessions")?;

    println!(
        "Password updated for '{}'; {} session(s) signed out",
        user.username, revoked
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parser() {
        assert_eq!(parse_role("agent").unwrap(), Role::Agent);
        assert!(parse_role("root").is_err());
    }
}

//! Administrative command handlers.
//!
//! These operate on the PostgreSQL store; the in-memory backend has nothing
//! that outlives a single process.

use crate::config::{Config, StoreBackend};
use crate::db::Repository;
use crate::error::{AppError, AppResult};
use crate::store::Store;
use chrono::Utc;
use clap::Subcommand;
use tracing::info;

/// Administrative commands available via CLI.
#[derive(Subcommand, Debug)]
pub enum AdminCommands {
    /// Delete links whose expiry has passed
    CleanExpired,

    /// Run database migrations
    Migrate,

    /// Show link and click totals
    Stats,

    /// Provision a user account
    CreateUser {
        #[arg(long)]
        username: String,

        #[arg(long)]
        password: String,
    },
}

/// Run an administrative command with the given configuration.
pub async fn run(config: Config, admin_command: AdminCommands) -> AppResult<()> {
    let repository = connect(&config).await?;

    match admin_command {
        AdminCommands::CleanExpired => clean_expired(&repository).await,
        AdminCommands::Migrate => migrate(&repository).await,
        AdminCommands::Stats => stats(&repository).await,
        AdminCommands::CreateUser { username, password } => {
            create_user(&repository, &username, &password).await
        }
    }
}

async fn connect(config: &Config) -> AppResult<Repository> {
    if config.database.backend != StoreBackend::Postgres {
        return Err(AppError::Configuration(
            "Admin commands require STORE_BACKEND=postgres".to_string(),
        ));
    }

    Repository::from_config(&config.database).await
}

async fn clean_expired(store: &dyn Store) -> AppResult<()> {
    info!("Cleaning expired links...");

    let deleted_count = store.delete_expired_links(Utc::now()).await?;

    info!("Deleted {} expired link(s)", deleted_count);
    Ok(())
}

async fn migrate(repository: &Repository) -> AppResult<()> {
    info!("Running database migrations...");
    repository.run_migrations().await?;
    info!("Migrations completed successfully");
    Ok(())
}

async fn stats(store: &dyn Store) -> AppResult<()> {
    info!("Fetching statistics...");

    let stats = store.stats(Utc::now()).await?;

    println!("\n=== snaplink Statistics ===");
    println!("Total Links:     {}", stats.total_links);
    println!("Total Clicks:    {}", stats.total_clicks);
    println!("Active Links:    {}", stats.active_links);
    println!("Expired Links:   {}", stats.expired_links);
    println!();

    Ok(())
}

/// Minimum password length accepted by `create-user`.
const MIN_PASSWORD_LEN: usize = 8;

async fn create_user(store: &dyn Store, username: &str, password: &str) -> AppResult<()> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AppError::Validation("Username is required".to_string()));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    if store.get_user_by_username(username).await?.is_some() {
        return Err(AppError::Validation(format!(
            "User already exists: {}",
            username
        )));
    }

    let password_hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;

    let user = store.create_user(username, &password_hash).await?;

    info!("Created user {} (id {})", user.username, user.id);
    Ok(())
}

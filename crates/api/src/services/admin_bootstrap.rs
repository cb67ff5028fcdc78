//! Creates the first administrator from configuration on startup.
//!
//! Nothing happens once any admin account exists, so the bootstrap password
//! can stay configured across restarts without resetting anything.

use persistence::repositories::{NewUser, UserRepository};
use shared::password::{hash_password, PasswordError};
use shared::validation::check_password_complexity;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::config::AdminBootstrapConfig;

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("admin lookup or insert failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("could not hash the bootstrap password: {0}")]
    PasswordHash(#[from] PasswordError),

    #[error("invalid bootstrap settings: {0}")]
    Config(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// No bootstrap password configured.
    NotConfigured,
    /// An admin account already exists.
    AlreadyPresent,
    /// A new admin was created with this id.
    Created(i32),
}

/// Runs after migrations. The configured credentials must pass the same
/// password rules as signup.
pub async fn bootstrap_admin(
    pool: &PgPool,
    config: &AdminBootstrapConfig,
) -> Result<BootstrapOutcome, BootstrapError> {
    if config.bootstrap_password.is_empty() {
        return Ok(BootstrapOutcome::NotConfigured);
    }

    validate_bootstrap_config(config)?;

    let users = UserRepository::new(pool.clone());

    if users.admin_exists().await? {
        info!("An admin account exists, bootstrap skipped");
        return Ok(BootstrapOutcome::AlreadyPresent);
    }

    let password_hash = hash_password(&config.bootstrap_password)?;

    let user = users
        .create(NewUser {
            full_name: &config.bootstrap_full_name,
            email: &config.bootstrap_email,
            username: &config.bootstrap_username,
            password_hash: &password_hash,
            role: "admin",
            email_verified: true,
        })
        .await?;

    info!(
        email = %config.bootstrap_email,
        username = %config.bootstrap_username,
        user_id = user.id,
        "Bootstrap admin created"
    );
    warn!("Sign in and change the admin password, then unset CTF__ADMIN__BOOTSTRAP_PASSWORD");

    Ok(BootstrapOutcome::Created(user.id))
}

fn validate_bootstrap_config(config: &AdminBootstrapConfig) -> Result<(), BootstrapError> {
    if config.bootstrap_username.trim().is_empty() || config.bootstrap_email.trim().is_empty() {
        return Err(BootstrapError::Config(
            "CTF__ADMIN__BOOTSTRAP_USERNAME and CTF__ADMIN__BOOTSTRAP_EMAIL must not be empty"
                .to_string(),
        ));
    }

    check_password_complexity(&config.bootstrap_password).map_err(|e| {
        BootstrapError::Config(format!("CTF__ADMIN__BOOTSTRAP_PASSWORD rejected: {}", e))
    })
}

// Configuration loaded from the environment

pub mod app;
pub mod database;
pub mod seeding;
pub mod services;

pub use app::AppConfig;
pub use database::{run_migrations, DatabaseConfig};
pub use seeding::DatabaseSeeder;
pub use services::{AssistantConfig, SmtpConfig};

use anyhow::{Context, Result};
use std::str::FromStr;

/// Parse `key` when set, else `default`; a malformed value is an error
pub(crate) fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {}: {:?}", key, raw)),
        Err(_) => Ok(default),
    }
}

use anyhow::Result;
use std::env;

use super::env_parse;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub log_level: String,
    pub jwt_secret: String,
    /// Public URL of the web client, used in links inside emails
    pub app_url: String,
    pub seed_demo_data: bool,
    /// Key rate limits on `X-Forwarded-For` / `X-Real-IP`; only safe behind a proxy that sets them
    pub trust_proxy_headers: bool,
}

fn env_flag(key: &str) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env_parse("PORT", 3000u16)?;
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let jwt_secret = env::var("JWT_SECRET")
            .unwrap_or_else(|_| "your-secret-key-change-in-production".to_string());
        let app_url = env::var("APP_URL").unwrap_or_else(|_| "http://localhost:5173".to_string());
        let seed_demo_data = env_flag("SEED_DEMO_DATA");
        let trust_proxy_headers = env_flag("TRUST_PROXY_HEADERS");

        let config = AppConfig {
            host,
            port,
            environment,
            log_level,
            jwt_secret,
            app_url,
            seed_demo_data,
            trust_proxy_headers,
        };

        if config.is_production() && config.jwt_secret == "your-secret-key-change-in-production" {
            anyhow::bail!("JWT_SECRET must be set in production");
        }

        Ok(config)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

use std::path::PathBuf;

use tracing::{info, warn};

use cce_db::store::DEFAULT_FEED_LIMIT;

/// JWT secrets that only exist for local development.
const PLACEHOLDER_SECRETS: &[&str] = &["dev-secret-change-me", "change-me-to-a-random-string"];

pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub admin_email: Option<String>,
    pub feed_limit: u32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt_secret =
            std::env::var("CCE_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
        if PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            warn!("CCE_JWT_SECRET is unset or a placeholder; sessions are forgeable");
        }

        let admin_email = std::env::var("CCE_ADMIN_EMAIL")
            .ok()
            .filter(|v| !v.trim().is_empty());
        if admin_email.is_none() {
            info!("CCE_ADMIN_EMAIL not set, no signup will be granted admin");
        }

        Ok(Self {
            host: std::env::var("CCE_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("CCE_PORT")
                .unwrap_or_else(|_| "3000".into())
                .parse()?,
            db_path: std::env::var("CCE_DB_PATH")
                .unwrap_or_else(|_| "cce.db".into())
                .into(),
            jwt_secret,
            admin_email,
            feed_limit: std::env::var("CCE_FEED_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_FEED_LIMIT),
        })
    }
}

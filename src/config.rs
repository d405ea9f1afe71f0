//! Configuration management

use std::time::Duration;

/// Default per-request timeout against the panel
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Startup configuration errors (fatal)
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set. Please check your .env file.")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Bot configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram bot token
    pub telegram_bot_token: String,

    /// Base URL of the s-ui panel (no trailing slash)
    pub panel_url: String,

    /// s-ui API token, sent as the `Token` header
    pub panel_api_token: String,

    /// Telegram user ids allowed to talk to the bot (empty = everyone)
    pub allowed_users: Vec<i64>,

    /// Timeout for a single panel request
    pub request_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let telegram_bot_token = required("TELEGRAM_BOT_TOKEN")?;
        let panel_url = required("SUI_PANEL_URL")?
            .trim_end_matches('/')
            .to_string();
        let panel_api_token = required("SUI_API_TOKEN")?;

        let allowed_users = match lookup("TELEGRAM_ALLOWED_USERS") {
            Some(raw) => parse_user_list(&raw)?,
            None => Vec::new(),
        };

        let request_timeout = match lookup("SUI_REQUEST_TIMEOUT_SECS") {
            Some(raw) if !raw.trim().is_empty() => {
                let invalid = || ConfigError::Invalid {
                    name: "SUI_REQUEST_TIMEOUT_SECS",
                    value: raw.clone(),
                };
                // Must be non-zero
                let secs: u64 = raw.trim().parse().map_err(|_| invalid())?;
                if secs == 0 {
                    return Err(invalid());
                }
                Duration::from_secs(secs)
            }
            _ => Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        };

        Ok(Self {
            telegram_bot_token,
            panel_url,
            panel_api_token,
            allowed_users,
            request_timeout,
        })
    }

    /// Whether a Telegram user may use the bot
    pub fn is_allowed(&self, user_id: i64) -> bool {
        self.allowed_users.is_empty() || self.allowed_users.contains(&user_id)
    }
}

fn parse_user_list(raw: &str) -> Result<Vec<i64>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse().map_err(|_| ConfigError::Invalid {
                name: "TELEGRAM_ALLOWED_USERS",
                value: s.to_string(),
            })
        })
        .collect()
}

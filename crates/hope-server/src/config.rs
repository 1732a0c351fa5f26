use std::collections::HashMap;
use std::path::PathBuf;

use thiserror::Error;

use hope_api::state::Settings;

const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("HOPE_JWT_SECRET is unset or still a placeholder")]
    PlaceholderSecret,
    #[error("{name} is not a valid {kind}: {value:?}")]
    Invalid {
        name: &'static str,
        kind: &'static str,
        value: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub settings: Settings,
    pub stripe_secret_key: Option<String>,
    pub posthog_api_key: Option<String>,
    pub posthog_host: String,
    pub resend_api_key: Option<String>,
    pub mail_from: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars().collect())
    }

    fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |name: &str| vars.get(name).map(|v| v.trim()).filter(|v| !v.is_empty());
        let owned = |name: &str| get(name).map(str::to_string);
        let or = |name: &str, default: &str| get(name).unwrap_or(default).to_string();

        let jwt_secret = owned("HOPE_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            return Err(ConfigError::PlaceholderSecret);
        }

        let port = parse(&vars, "HOPE_PORT", 3000u16, "port")?;
        let session_ttl_days = parse(&vars, "HOPE_SESSION_TTL_DAYS", 30i64, "number of days")?;
        let magic_link_ttl_minutes = parse(&vars, "HOPE_MAGIC_LINK_TTL_MINUTES", 15i64, "number of minutes")?;
        let secure_cookies = match get("HOPE_SECURE_COOKIES") {
            None => true,
            Some(v) => match v.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "HOPE_SECURE_COOKIES",
                        kind: "boolean",
                        value: v.to_string(),
                    });
                }
            },
        };

        let admin_emails = get("HOPE_ADMIN_EMAILS")
            .unwrap_or_default()
            .split(',')
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();

        Ok(Self {
            host: or("HOPE_HOST", "0.0.0.0"),
            port,
            db_path: or("HOPE_DB_PATH", "hope.db").into(),
            settings: Settings {
                jwt_secret,
                public_url: or("HOPE_PUBLIC_URL", "http://localhost:3000"),
                admin_emails,
                session_ttl_days,
                magic_link_ttl_minutes,
                stripe_webhook_secret: owned("STRIPE_WEBHOOK_SECRET"),
                secure_cookies,
            },
            stripe_secret_key: owned("STRIPE_SECRET_KEY"),
            posthog_api_key: owned("POSTHOG_API_KEY"),
            posthog_host: or("POSTHOG_HOST", "https://us.i.posthog.com"),
            resend_api_key: owned("RESEND_API_KEY"),
            mail_from: or("RESEND_FROM", "Tree of Hope <hello@treeofhope.org>"),
        })
    }
}

fn parse<T: std::str::FromStr>(
    vars: &HashMap<String, String>,
    name: &'static str,
    default: T,
    kind: &'static str,
) -> Result<T, ConfigError> {
    match vars.get(name).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(v) => v.parse().map_err(|_| ConfigError::Invalid {
            name,
            kind,
            value: v.to_string(),
        }),
    }
}

use std::env;
use std::error::Error;
use std::fmt;
use std::path::PathBuf;

use crate::utils::MessageFormatter;

pub const DEFAULT_PAYMENT_API_URL: &str = "https://securepay.tinkoff.ru";
pub const DEFAULT_TAXATION: &str = "usn_income";

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { var: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(var) => write!(f, "{} environment variable is required", var),
            ConfigError::Invalid { var, value } => {
                write!(f, "{} has an invalid value: {:?}", var, value)
            }
        }
    }
}

impl Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub terminal_key: String,
    pub password: String,
    pub api_url: String,
    pub taxation: String,
}

/// texts and media shown on the funnel pages; html is normalised on load
#[derive(Debug, Clone, Default)]
pub struct Messages {
    pub offer_agreement: String,
    pub course_intro: String,
    pub about_course: String,
    pub photo_go_intro: String,
    pub photo_about_course: String,
    pub offer_url: Option<String>,
    pub privacy_url: Option<String>,
    pub support_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub admin_ids: Vec<i64>,
    pub channel_id: i64,
    pub database_url: String,
    pub product_id: i64,
    pub scenarios_dir: Option<PathBuf>,
    pub payment: PaymentConfig,
    pub messages: Messages,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// builds the config from any key lookup; empty values count as missing
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let admin_ids = match get("ADMINS") {
            Some(raw) => parse_id_list(&raw).ok_or(ConfigError::Invalid {
                var: "ADMINS",
                value: raw,
            })?,
            None => Vec::new(),
        };

        let channel_raw = required("CHANNEL_ID")?;
        let channel_id = channel_raw.trim().parse::<i64>().map_err(|_| ConfigError::Invalid {
            var: "CHANNEL_ID",
            value: channel_raw.clone(),
        })?;

        let product_id = match get("PRODUCT_ID") {
            Some(raw) => raw.trim().parse::<i64>().map_err(|_| ConfigError::Invalid {
                var: "PRODUCT_ID",
                value: raw,
            })?,
            None => 1,
        };

        let payment = PaymentConfig {
            terminal_key: required("PAYMENT_TERMINAL_KEY")?,
            password: required("PAYMENT_PASSWORD")?,
            api_url: get("PAYMENT_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_PAYMENT_API_URL.to_string()),
            taxation: get("PAYMENT_TAXATION").unwrap_or_else(|| DEFAULT_TAXATION.to_string()),
        };

        let text = |key: &str| {
            get(key)
                .map(|raw| MessageFormatter::process_message(&raw))
                .unwrap_or_default()
        };

        let messages = Messages {
            offer_agreement: text("OFFER_AGREEMENT"),
            course_intro: text("COURSE_INTRO"),
            about_course: text("ABOUT_COURSE"),
            photo_go_intro: get("PHOTO_GO_INTRO").unwrap_or_default(),
            photo_about_course: get("PHOTO_ABOUT_COURSE").unwrap_or_default(),
            offer_url: get("OFFER_URL"),
            privacy_url: get("PRIVACY_URL"),
            support_url: get("SUPPORT_URL"),
        };

        Ok(Self {
            bot_token: required("BOT_TOKEN")?,
            admin_ids,
            channel_id,
            database_url: required("DATABASE_URL")?,
            product_id,
            scenarios_dir: get("SCENARIOS_DIR").map(PathBuf::from),
            payment,
            messages,
        })
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }
}

/// parses "1, 2,3" into ids; None if any entry is not a number
fn parse_id_list(raw: &str) -> Option<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<i64>().ok())
        .collect()
}

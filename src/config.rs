use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use teloxide::types::ChatId;

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the settings file.
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// A required environment variable is unset or empty.
    MissingVar(&'static str),
    /// An environment variable is set but unusable.
    InvalidVar { name: &'static str, reason: String },
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read settings file '{}': {}", path.display(), source)
            }
            Self::ParseJson { path, source } => {
                write!(f, "failed to parse settings file '{}': {}", path.display(), source)
            }
            Self::MissingVar(name) => write!(f, "{name} is not set"),
            Self::InvalidVar { name, reason } => write!(f, "{name} is invalid: {reason}"),
            Self::Validation(msg) => write!(f, "config validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            Self::ParseJson { source, .. } => Some(source),
            Self::MissingVar(_) | Self::InvalidVar { .. } | Self::Validation(_) => None,
        }
    }
}

/// Where provider calls go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderMode {
    /// Fabricate records locally.
    #[default]
    Simulated,
    /// Call the real seller and aggregator APIs.
    Live,
}

/// Non-secret tunables, read from an optional JSON file.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsFile {
    #[serde(default)]
    provider_mode: ProviderMode,
    /// Send replies through the Telegram Bot API instead of the console.
    #[serde(default)]
    deliver_replies: bool,
    log_chat_id: Option<i64>,
    /// Directory for log files. Defaults to current directory.
    data_dir: Option<String>,
    #[serde(default = "default_phone_price")]
    phone_price: f64,
    #[serde(default = "default_followers_price")]
    followers_price: f64,
    #[serde(default = "default_followers_quantity")]
    followers_quantity: u32,
    /// Apex service id for follower orders.
    #[serde(default = "default_followers_service")]
    followers_service: String,
    /// SMS-Activate country code (73 = Brazil).
    #[serde(default = "default_sms_country")]
    sms_country: String,
    #[serde(default = "default_sms_service")]
    sms_service: String,
    /// Balance granted when an account is connected. Replaces the old balance.
    #[serde(default = "default_connect_credit")]
    connect_credit: f64,
    #[serde(default = "default_journal_capacity")]
    journal_capacity: usize,
}

impl Default for SettingsFile {
    fn default() -> Self {
        Self {
            provider_mode: ProviderMode::default(),
            deliver_replies: false,
            log_chat_id: None,
            data_dir: None,
            phone_price: default_phone_price(),
            followers_price: default_followers_price(),
            followers_quantity: default_followers_quantity(),
            followers_service: default_followers_service(),
            sms_country: default_sms_country(),
            sms_service: default_sms_service(),
            connect_credit: default_connect_credit(),
            journal_capacity: default_journal_capacity(),
        }
    }
}

fn default_phone_price() -> f64 {
    5.0
}

fn default_followers_price() -> f64 {
    10.0
}

fn default_followers_quantity() -> u32 {
    1000
}

fn default_followers_service() -> String {
    "1".to_string()
}

fn default_sms_country() -> String {
    "73".to_string()
}

fn default_sms_service() -> String {
    "tg".to_string()
}

fn default_connect_credit() -> f64 {
    100.0
}

fn default_journal_capacity() -> usize {
    500
}

pub struct Config {
    pub telegram_bot_token: String,
    pub pluggy_client_id: String,
    pub pluggy_api_key: String,
    pub apex_api_key: String,
    pub sms_activate_api_key: String,
    pub admin_id: i64,
    /// Spreadsheet that mirrors the audit trail. Carried for operators, not written to.
    pub google_sheet_id: String,
    pub provider_mode: ProviderMode,
    pub deliver_replies: bool,
    pub log_chat_id: Option<ChatId>,
    pub data_dir: PathBuf,
    pub phone_price: f64,
    pub followers_price: f64,
    pub followers_quantity: u32,
    pub followers_service: String,
    pub sms_country: String,
    pub sms_service: String,
    pub connect_credit: f64,
    pub journal_capacity: usize,
}

impl Config {
    /// Load secrets from the process environment and tunables from `settings`.
    pub fn load(settings: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(settings, |name| std::env::var(name).ok())
    }

    /// Like [`Config::load`] with a custom variable lookup.
    pub fn load_with<F>(settings: Option<&Path>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = match settings {
            Some(path) => {
                let path = path.to_path_buf();
                let content = std::fs::read_to_string(&path)
                    .map_err(|e| ConfigError::ReadFile { path: path.clone(), source: e })?;
                serde_json::from_str::<SettingsFile>(&content)
                    .map_err(|e| ConfigError::ParseJson { path, source: e })?
            }
            None => SettingsFile::default(),
        };

        let var = |name: &str| env(name).map(|v| v.trim().to_string()).unwrap_or_default();

        let telegram_bot_token = var("TELEGRAM_BOT_TOKEN");
        if telegram_bot_token.is_empty() {
            return Err(ConfigError::MissingVar("TELEGRAM_BOT_TOKEN"));
        }
        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        let token_parts: Vec<&str> = telegram_bot_token.split(':').collect();
        if token_parts.len() != 2 || token_parts[0].parse::<u64>().is_err() || token_parts[1].is_empty() {
            return Err(ConfigError::InvalidVar {
                name: "TELEGRAM_BOT_TOKEN",
                reason: "expected format 123456789:ABCdefGHI...".into(),
            });
        }

        let admin_raw = var("ADMIN_TELEGRAM_ID");
        if admin_raw.is_empty() {
            return Err(ConfigError::MissingVar("ADMIN_TELEGRAM_ID"));
        }
        let admin_id = admin_raw.parse::<u64>().map_err(|e| ConfigError::InvalidVar {
            name: "ADMIN_TELEGRAM_ID",
            reason: e.to_string(),
        })?;
        if admin_id == 0 {
            return Err(ConfigError::InvalidVar { name: "ADMIN_TELEGRAM_ID", reason: "must not be zero".into() });
        }
        let admin_id = i64::try_from(admin_id).map_err(|_| ConfigError::InvalidVar {
            name: "ADMIN_TELEGRAM_ID",
            reason: "out of range".into(),
        })?;

        for (name, value) in [
            ("phone_price", file.phone_price),
            ("followers_price", file.followers_price),
            ("connect_credit", file.connect_credit),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Validation(format!("{name} must be a non-negative number")));
            }
        }
        if file.followers_quantity == 0 {
            return Err(ConfigError::Validation("followers_quantity must be positive".into()));
        }

        let config = Self {
            telegram_bot_token,
            pluggy_client_id: var("PLUGGY_CLIENT_ID"),
            pluggy_api_key: var("PLUGGY_API_KEY"),
            apex_api_key: var("APEX_API_KEY"),
            sms_activate_api_key: var("SMS_ACTIVATE_API_KEY"),
            admin_id,
            google_sheet_id: var("GOOGLE_SHEET_ID"),
            provider_mode: file.provider_mode,
            deliver_replies: file.deliver_replies,
            log_chat_id: file.log_chat_id.map(ChatId),
            data_dir: file.data_dir.map(PathBuf::from).unwrap_or_else(|| PathBuf::from(".")),
            phone_price: file.phone_price,
            followers_price: file.followers_price,
            followers_quantity: file.followers_quantity,
            followers_service: file.followers_service,
            sms_country: file.sms_country,
            sms_service: file.sms_service,
            connect_credit: file.connect_credit,
            journal_capacity: file.journal_capacity,
        };

        if config.provider_mode == ProviderMode::Live {
            config.require_live_credentials()?;
        }

        Ok(config)
    }

    fn require_live_credentials(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("PLUGGY_CLIENT_ID", &self.pluggy_client_id),
            ("PLUGGY_API_KEY", &self.pluggy_api_key),
            ("APEX_API_KEY", &self.apex_api_key),
            ("SMS_ACTIVATE_API_KEY", &self.sms_activate_api_key),
        ] {
            if value.is_empty() {
                return Err(ConfigError::MissingVar(name));
            }
        }
        Ok(())
    }

    /// First characters of the bot token, safe to log.
    pub fn token_preview(&self) -> String {
        let preview: String = self.telegram_bot_token.chars().take(10).collect();
        format!("{preview}...")
    }
}

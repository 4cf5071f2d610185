//! Seller and aggregator capabilities the handlers call into.
//!
//! Each capability has a simulated implementation that fabricates records
//! locally and a live implementation that talks to the real service.

pub mod apex;
pub mod pluggy;
pub mod simulated;
pub mod sms_activate;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::{Config, ProviderMode};

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderError {
    Http(String),
    Api(String),
    Parse(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Http(e) => write!(f, "HTTP error: {e}"),
            ProviderError::Api(e) => write!(f, "API error: {e}"),
            ProviderError::Parse(e) => write!(f, "Parse error: {e}"),
        }
    }
}

impl std::error::Error for ProviderError {}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FollowerOrder {
    pub order_id: String,
    pub status: String,
    pub quantity: u32,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhoneActivation {
    pub activation_id: String,
    pub phone_number: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectLink {
    pub connect_token: String,
    pub url: String,
}

#[async_trait]
pub trait FollowerSeller: Send + Sync {
    async fn buy_followers(&self, service: &str, quantity: u32, link: &str) -> Result<FollowerOrder, ProviderError>;
}

#[async_trait]
pub trait PhoneNumberProvider: Send + Sync {
    async fn buy_number(&self, country: &str, service: &str) -> Result<PhoneActivation, ProviderError>;
}

#[async_trait]
pub trait AccountLinker: Send + Sync {
    async fn connect_link(&self, user_id: i64) -> Result<ConnectLink, ProviderError>;
}

/// The set of capabilities injected into the bot.
#[derive(Clone)]
pub struct Providers {
    pub followers: Arc<dyn FollowerSeller>,
    pub phones: Arc<dyn PhoneNumberProvider>,
    pub accounts: Arc<dyn AccountLinker>,
}

impl Providers {
    pub fn from_config(config: &Config) -> Self {
        match config.provider_mode {
            ProviderMode::Simulated => Self {
                followers: Arc::new(simulated::SimulatedApex::new()),
                phones: Arc::new(simulated::SimulatedSmsActivate::new()),
                accounts: Arc::new(simulated::SimulatedPluggy::new(config.pluggy_client_id.clone())),
            },
            ProviderMode::Live => {
                let http = reqwest::Client::builder()
                    .timeout(std::time::Duration::from_secs(30))
                    .build()
                    .unwrap_or_default();
                Self {
                    followers: Arc::new(apex::ApexClient::new(http.clone(), config.apex_api_key.clone())),
                    phones: Arc::new(sms_activate::SmsActivateClient::new(
                        http.clone(),
                        config.sms_activate_api_key.clone(),
                    )),
                    accounts: Arc::new(pluggy::PluggyClient::new(
                        http,
                        config.pluggy_client_id.clone(),
                        config.pluggy_api_key.clone(),
                    )),
                }
            }
        }
    }
}

/// Seconds since the Unix epoch, used to mint synthetic ids.
pub(crate) fn unix_seconds() -> i64 {
    chrono::Utc::now().timestamp()
}

/// `https://connect.pluggy.ai?clientId=..&token=..`
pub(crate) fn connect_url(client_id: &str, token: &str) -> String {
    format!(
        "https://connect.pluggy.ai?clientId={}&token={}",
        urlencoding::encode(client_id),
        urlencoding::encode(token)
    )
}

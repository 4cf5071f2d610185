//! Apex Seguidores SMM panel client (API v2).

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use super::{FollowerOrder, FollowerSeller, ProviderError};

const APEX_API_URL: &str = "https://apexseguidores.com/api/v2";

pub struct ApexClient {
    api_key: String,
    client: reqwest::Client,
}

/// The panel answers 200 for both outcomes, with either field set.
#[derive(Deserialize, Debug)]
struct AddResponse {
    order: Option<serde_json::Value>,
    error: Option<String>,
}

impl ApexClient {
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self { api_key, client }
    }
}

fn parse_add_response(body: &str, quantity: u32, link: &str) -> Result<FollowerOrder, ProviderError> {
    let parsed: AddResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::Parse(format!("Failed to parse response: {e}")))?;

    if let Some(error) = parsed.error {
        return Err(ProviderError::Api(error));
    }

    let order_id = match parsed.order {
        Some(serde_json::Value::Number(n)) => n.to_string(),
        Some(serde_json::Value::String(s)) if !s.is_empty() => s,
        _ => return Err(ProviderError::Parse("No order id in response".to_string())),
    };

    Ok(FollowerOrder {
        order_id,
        status: "success".to_string(),
        quantity,
        link: link.to_string(),
    })
}

#[async_trait]
impl FollowerSeller for ApexClient {
    async fn buy_followers(&self, service: &str, quantity: u32, link: &str) -> Result<FollowerOrder, ProviderError> {
        info!("🧾 Apex order: service={service} quantity={quantity}");

        let quantity_param = quantity.to_string();
        let response = self
            .client
            .post(APEX_API_URL)
            .query(&[
                ("key", self.api_key.as_str()),
                ("action", "add"),
                ("service", service),
                ("link", link),
                ("quantity", quantity_param.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Http(format!("Failed to read response: {e}")))?;

        debug!("Apex response status: {status}");

        if !status.is_success() {
            return Err(ProviderError::Api(format!("{status}: {body}")));
        }

        parse_add_response(&body, quantity, link)
    }
}

//! Pluggy connect-token client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{connect_url, AccountLinker, ConnectLink, ProviderError};

const PLUGGY_API_URL: &str = "https://api.pluggy.ai";

pub struct PluggyClient {
    client_id: String,
    client_secret: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    api_key: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConnectTokenRequest {
    client_user_id: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ConnectTokenResponse {
    access_token: String,
}

impl PluggyClient {
    pub fn new(client: reqwest::Client, client_id: String, client_secret: String) -> Self {
        Self { client_id, client_secret, client }
    }

    async fn post<Req: Serialize, Resp: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        api_key: Option<&str>,
        body: &Req,
    ) -> Result<Resp, ProviderError> {
        let mut request = self.client.post(format!("{PLUGGY_API_URL}{path}")).json(body);
        if let Some(key) = api_key {
            request = request.header("X-API-KEY", key);
        }

        let response = request.send().await.map_err(|e| ProviderError::Http(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Http(format!("Failed to read response: {e}")))?;

        debug!("Pluggy {path} status: {status}");

        if !status.is_success() {
            return Err(ProviderError::Api(format!("{status}: {text}")));
        }

        serde_json::from_str(&text).map_err(|e| ProviderError::Parse(format!("Failed to parse {path}: {e}")))
    }
}

#[async_trait]
impl AccountLinker for PluggyClient {
    async fn connect_link(&self, user_id: i64) -> Result<ConnectLink, ProviderError> {
        info!("💳 Pluggy connect token for user {user_id}");

        let auth: AuthResponse = self
            .post(
                "/auth",
                None,
                &AuthRequest { client_id: &self.client_id, client_secret: &self.client_secret },
            )
            .await?;

        let token: ConnectTokenResponse = self
            .post(
                "/connect_token",
                Some(&auth.api_key),
                &ConnectTokenRequest { client_user_id: user_id.to_string() },
            )
            .await?;

        Ok(ConnectLink {
            url: connect_url(&self.client_id, &token.access_token),
            connect_token: token.access_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_request_shape() {
        let body = serde_json::to_value(AuthRequest { client_id: "id", client_secret: "secret" }).unwrap();
        assert_eq!(body, serde_json::json!({"clientId": "id", "clientSecret": "secret"}));
    }

    #[test]
    fn test_token_response_parses() {
        let parsed: ConnectTokenResponse = serde_json::from_str(r#"{"accessToken": "tok"}"#).unwrap();
        assert_eq!(parsed.access_token, "tok");
    }
}

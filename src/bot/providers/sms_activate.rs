//! SMS-Activate virtual number client.

use async_trait::async_trait;
use tracing::{debug, info};

use super::{PhoneActivation, PhoneNumberProvider, ProviderError};

const SMS_ACTIVATE_API_URL: &str = "https://api.sms-activate.org/stubs/handler_api.php";

pub struct SmsActivateClient {
    api_key: String,
    client: reqwest::Client,
}

impl SmsActivateClient {
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self { api_key, client }
    }
}

/// `ACCESS_NUMBER:{id}:{number}` on success, a bare error token otherwise
/// (`NO_NUMBERS`, `NO_BALANCE`, `BAD_KEY`, ...).
fn parse_get_number(body: &str) -> Result<PhoneActivation, ProviderError> {
    let body = body.trim();
    let mut parts = body.splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("ACCESS_NUMBER"), Some(id), Some(number)) if !id.is_empty() && !number.is_empty() => {
            let phone_number = if number.starts_with('+') {
                number.to_string()
            } else {
                format!("+{number}")
            };
            Ok(PhoneActivation {
                activation_id: id.to_string(),
                phone_number,
                status: "success".to_string(),
            })
        }
        (Some("ACCESS_NUMBER"), _, _) => Err(ProviderError::Parse(format!("malformed response: {body}"))),
        _ if body.is_empty() => Err(ProviderError::Parse("empty response".to_string())),
        _ => Err(ProviderError::Api(body.to_string())),
    }
}

#[async_trait]
impl PhoneNumberProvider for SmsActivateClient {
    async fn buy_number(&self, country: &str, service: &str) -> Result<PhoneActivation, ProviderError> {
        info!("📱 SMS-Activate getNumber: country={country} service={service}");

        let response = self
            .client
            .get(SMS_ACTIVATE_API_URL)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("action", "getNumber"),
                ("service", service),
                ("country", country),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Http(format!("Failed to read response: {e}")))?;

        debug!("SMS-Activate response status: {status}");

        if !status.is_success() {
            return Err(ProviderError::Api(format!("{status}: {body}")));
        }

        parse_get_number(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_number() {
        let activation = parse_get_number("ACCESS_NUMBER:123456:5511987654321\n").unwrap();
        assert_eq!(activation.activation_id, "123456");
        assert_eq!(activation.phone_number, "+5511987654321");
    }

    #[test]
    fn test_error_token() {
        assert_eq!(parse_get_number("NO_NUMBERS"), Err(ProviderError::Api("NO_NUMBERS".to_string())));
        assert_eq!(parse_get_number("BAD_KEY"), Err(ProviderError::Api("BAD_KEY".to_string())));
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(parse_get_number("ACCESS_NUMBER:1"), Err(ProviderError::Parse(_))));
        assert!(matches!(parse_get_number("  "), Err(ProviderError::Parse(_))));
    }
}

//! M-Pesa USSD push client. External collaborator boundary: initiate a
//! payment push, nothing else. Callback handling lives in
//! `handlers::payments`.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use crate::{config::MpesaConfig, error::ApiError};

#[derive(Clone)]
pub struct MpesaGateway {
    client: reqwest::Client,
    config: MpesaConfig,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct PushResponse {
    #[serde(rename = "ResponseCode")]
    response_code: Option<String>,
    #[serde(rename = "ResponseDescription")]
    response_description: Option<String>,
}

impl MpesaGateway {
    pub fn new(config: MpesaConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");
        Self { client, config }
    }

    async fn access_token(&self) -> Result<String, ApiError> {
        let response = self
            .client
            .get(&self.config.token_url)
            .basic_auth(&self.config.consumer_key, Some(&self.config.consumer_secret))
            .query(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| ApiError::Gateway(format!("token request failed: {e}")))?
            .error_for_status()
            .map_err(|e| ApiError::Gateway(format!("token request rejected: {e}")))?;

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|_| ApiError::Gateway("invalid token response".to_string()))?;

        Ok(token.access_token)
    }

    /// Sends the USSD push request for `reference` (our sale/order id).
    ///
    /// A network failure or a gateway rejection comes back as
    /// `ApiError::Gateway`; acceptance here only means the push was sent, not
    /// that the payment completed.
    pub async fn initiate_ussd_push(
        &self,
        phone_number: &str,
        amount: Decimal,
        reference: &str,
    ) -> Result<String, ApiError> {
        let token = self.access_token().await?;
        let msisdn = format_msisdn(phone_number)
            .ok_or_else(|| ApiError::Validation("Invalid phone number".to_string()))?;
        let payload = push_payload(&self.config, &msisdn, amount, reference)?;

        let response = self
            .client
            .post(&self.config.initiate_url)
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ApiError::Gateway(format!("push request failed: {e}")))?;

        let body: PushResponse = response
            .json()
            .await
            .map_err(|_| ApiError::Gateway("invalid push response".to_string()))?;

        match body.response_code.as_deref() {
            Some("000000") => Ok("USSD push initiated successfully".to_string()),
            _ => Err(ApiError::Gateway(
                body.response_description
                    .unwrap_or_else(|| "Unknown gateway error".to_string()),
            )),
        }
    }
}

/// Builds the USSD push request body. The provider expects Amount as a JSON
/// number, not the string form Decimal serializes to by default.
fn push_payload(
    config: &MpesaConfig,
    msisdn: &str,
    amount: Decimal,
    reference: &str,
) -> Result<Value, ApiError> {
    let amount = amount
        .to_f64()
        .ok_or_else(|| ApiError::Validation("Invalid amount".to_string()))?;

    Ok(json!({
        "ShortCode": config.shortcode,
        "CommandID": "CustomerPayBillOnline",
        "Amount": amount,
        "Msisdn": msisdn,
        "BillRefNumber": reference,
        "CallbackURL": config.callback_url,
        "TransactionDesc": format!("Payment for order {reference}"),
    }))
}

/// Normalizes a Tanzanian phone number to the 2557XXXXXXXX form the gateway
/// expects. Returns None when the input cannot be a valid subscriber number.
pub fn format_msisdn(phone_number: &str) -> Option<String> {
    let digits: String = phone_number
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();

    let msisdn = if let Some(rest) = digits.strip_prefix("255") {
        format!("255{rest}")
    } else if let Some(rest) = digits.strip_prefix('0') {
        format!("255{rest}")
    } else if digits.len() == 9 {
        format!("255{digits}")
    } else {
        return None;
    };

    if msisdn.len() == 12 {
        Some(msisdn)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_international_passes_through() {
        assert_eq!(
            format_msisdn("255746297197").as_deref(),
            Some("255746297197")
        );
    }

    #[test]
    fn local_forms_are_normalized() {
        assert_eq!(
            format_msisdn("0746297197").as_deref(),
            Some("255746297197")
        );
        assert_eq!(format_msisdn("746297197").as_deref(), Some("255746297197"));
        assert_eq!(
            format_msisdn("+255 746 297 197").as_deref(),
            Some("255746297197")
        );
    }

    #[test]
    fn junk_is_rejected() {
        assert_eq!(format_msisdn("12345"), None);
        assert_eq!(format_msisdn(""), None);
        assert_eq!(format_msisdn("2557462971975555"), None);
    }

    fn test_config() -> MpesaConfig {
        MpesaConfig {
            consumer_key: "key".into(),
            consumer_secret: "secret".into(),
            shortcode: "54321".into(),
            token_url: "https://gateway.test/token".into(),
            initiate_url: "https://gateway.test/push".into(),
            callback_url: "https://shop.test/payments/callback".into(),
        }
    }

    #[test]
    fn push_amount_is_a_json_number() {
        let payload = push_payload(
            &test_config(),
            "255746297197",
            "1500.00".parse().unwrap(),
            "order-1",
        )
        .unwrap();

        assert!(payload["Amount"].is_number());
        assert_eq!(payload["Amount"].as_f64(), Some(1500.0));
        assert_eq!(payload["Msisdn"], "255746297197");
        assert_eq!(payload["BillRefNumber"], "order-1");
    }
}

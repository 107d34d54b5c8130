use std::collections::HashMap;

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::{CheckoutSession, GatewayError};
use crate::db::models::{PaymentProvider, Session};
use crate::money;

/// Rejects webhook timestamps further than this from the current time, so a
/// captured request cannot be replayed later.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
    webhook_secret: String,
}

#[derive(Debug, Deserialize)]
struct CheckoutSessionResponse {
    id: String,
    url: String,
}

#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: StripeCheckoutObject,
}

#[derive(Debug, Deserialize)]
pub struct StripeCheckoutObject {
    pub id: String,
    pub payment_intent: Option<String>,
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl StripeClient {
    pub fn new(base_url: String, secret_key: String, webhook_secret: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url,
            secret_key,
            webhook_secret,
        }
    }

    /// Creates a hosted checkout session. The amount crosses the minor-unit
    /// boundary here, and the session id rides along in metadata so the
    /// webhook can resolve it without a lookup.
    pub async fn create_checkout_session(
        &self,
        session: &Session,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession, GatewayError> {
        let unit_amount = money::to_minor_units(&session.price)?;

        let params = [
            ("mode", "payment".to_string()),
            ("success_url", success_url.to_string()),
            ("cancel_url", cancel_url.to_string()),
            ("line_items[0][price_data][currency]", session.currency.clone()),
            ("line_items[0][price_data][unit_amount]", unit_amount.to_string()),
            (
                "line_items[0][price_data][product_data][name]",
                "Counseling session".to_string(),
            ),
            ("line_items[0][quantity]", "1".to_string()),
            ("metadata[internalSessionId]", session.id.to_string()),
        ];

        let response = self
            .client
            .post(format!(
                "{}/v1/checkout/sessions",
                self.base_url.trim_end_matches('/')
            ))
            .bearer_auth(&self.secret_key)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::CheckoutCreationFailed(body));
        }

        let created = response
            .json::<CheckoutSessionResponse>()
            .await
            .map_err(|e| GatewayError::UnexpectedResponse(e.to_string()))?;

        Ok(CheckoutSession {
            provider: PaymentProvider::Stripe,
            redirect_url: created.url,
            provider_reference: created.id,
        })
    }

    /// Verifies the `stripe-signature` header against the exact request
    /// bytes. The signed payload is `"{timestamp}.{body}"`.
    pub fn verify_signature(&self, payload: &[u8], header: &str) -> Result<(), GatewayError> {
        self.verify_signature_at(payload, header, Utc::now().timestamp())
    }

    fn verify_signature_at(&self, payload: &[u8], header: &str, now: i64) -> Result<(), GatewayError> {
        let (timestamp, candidates) = parse_signature_header(header)?;

        if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
            return Err(GatewayError::InvalidSignature);
        }

        let mut mac = Hmac::<Sha256>::new_from_slice(self.webhook_secret.as_bytes())
            .map_err(|_| GatewayError::InvalidSignature)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        let expected = hex::encode(mac.finalize().into_bytes());

        for candidate in &candidates {
            if bool::from(expected.as_bytes().ct_eq(candidate.as_bytes())) {
                return Ok(());
            }
        }

        Err(GatewayError::InvalidSignature)
    }
}

fn parse_signature_header(header: &str) -> Result<(i64, Vec<String>), GatewayError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let mut kv = part.trim().splitn(2, '=');
        match (kv.next(), kv.next()) {
            (Some("t"), Some(value)) => timestamp = value.parse::<i64>().ok(),
            (Some("v1"), Some(value)) => signatures.push(value.to_string()),
            _ => {}
        }
    }

    match timestamp {
        Some(t) if !signatures.is_empty() => Ok((t, signatures)),
        _ => Err(GatewayError::InvalidSignature),
    }
}

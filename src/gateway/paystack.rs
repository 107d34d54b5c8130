use std::time::Duration;

use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::json;
use sha2::Sha512;
use subtle::ConstantTimeEq;

use super::GatewayError;

type Breaker = StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>;

/// HTTP client for the Paystack API. Payout calls run behind a circuit
/// breaker so a degraded provider fails fast instead of tying up request
/// handlers.
#[derive(Clone)]
pub struct PaystackClient {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
    circuit_breaker: Breaker,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    status: bool,
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
pub struct InitializedTransaction {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

#[derive(Debug, Deserialize)]
pub struct ResolvedAccount {
    pub account_name: String,
    pub account_number: String,
}

#[derive(Debug, Deserialize)]
struct RecipientData {
    recipient_code: String,
}

#[derive(Debug, Deserialize)]
pub struct InitiatedTransfer {
    pub transfer_code: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct PaystackEvent {
    pub event: String,
    pub data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct ChargeData {
    pub reference: String,
    pub amount: i64,
    pub id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct TransferData {
    pub transfer_code: String,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl PaystackClient {
    pub fn new(base_url: String, secret_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(Duration::from_secs(60), Duration::from_secs(120));
        let policy = failure_policy::consecutive_failures(3, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        Self {
            client,
            base_url,
            secret_key,
            circuit_breaker,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// `x-paystack-signature` is the HMAC-SHA512 hex digest of the exact
    /// request bytes under the account secret key.
    pub fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> Result<(), GatewayError> {
        let mut mac = Hmac::<Sha512>::new_from_slice(self.secret_key.as_bytes())
            .map_err(|_| GatewayError::InvalidSignature)?;
        mac.update(payload);
        let expected = hex::encode(mac.finalize().into_bytes());

        if bool::from(expected.as_bytes().ct_eq(signature.as_bytes())) {
            Ok(())
        } else {
            Err(GatewayError::InvalidSignature)
        }
    }

    pub async fn initialize_transaction(
        &self,
        email: &str,
        amount_minor: i64,
        reference: &str,
        currency: &str,
    ) -> Result<InitializedTransaction, GatewayError> {
        let response = self
            .client
            .post(self.url("/transaction/initialize"))
            .bearer_auth(&self.secret_key)
            .json(&json!({
                "email": email,
                "amount": amount_minor,
                "reference": reference,
                "currency": currency,
            }))
            .send()
            .await?;

        parse_response(response, GatewayError::CheckoutCreationFailed).await
    }

    pub async fn resolve_account(
        &self,
        account_number: &str,
        bank_code: &str,
    ) -> Result<ResolvedAccount, GatewayError> {
        let response = self
            .client
            .get(self.url("/bank/resolve"))
            .query(&[("account_number", account_number), ("bank_code", bank_code)])
            .bearer_auth(&self.secret_key)
            .send()
            .await?;

        parse_response(response, GatewayError::AccountResolutionFailed).await
    }

    pub async fn create_transfer_recipient(
        &self,
        name: &str,
        account_number: &str,
        bank_code: &str,
    ) -> Result<String, GatewayError> {
        let response = self
            .client
            .post(self.url("/transferrecipient"))
            .bearer_auth(&self.secret_key)
            .json(&json!({
                "type": "nuban",
                "name": name,
                "account_number": account_number,
                "bank_code": bank_code,
                "currency": "NGN",
            }))
            .send()
            .await?;

        let data: RecipientData = parse_response(response, GatewayError::RecipientCreationFailed).await?;
        Ok(data.recipient_code)
    }

    pub async fn initiate_transfer(
        &self,
        amount_minor: i64,
        recipient_code: &str,
        reference: &str,
        reason: &str,
    ) -> Result<InitiatedTransfer, GatewayError> {
        let client = self.client.clone();
        let url = self.url("/transfer");
        let secret_key = self.secret_key.clone();
        let body = json!({
            "source": "balance",
            "amount": amount_minor,
            "recipient": recipient_code,
            "reference": reference,
            "reason": reason,
        });

        let result = self
            .circuit_breaker
            .call(async move {
                let response = client
                    .post(url)
                    .bearer_auth(secret_key)
                    .json(&body)
                    .send()
                    .await?;
                parse_response(response, GatewayError::TransferInitiationFailed).await
            })
            .await;

        match result {
            Ok(transfer) => Ok(transfer),
            Err(FailsafeError::Rejected) => Err(GatewayError::CircuitOpen),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }
}

async fn parse_response<T>(
    response: reqwest::Response,
    on_failure: fn(String) -> GatewayError,
) -> Result<T, GatewayError>
where
    T: serde::de::DeserializeOwned,
{
    let http_ok = response.status().is_success();
    let body = response
        .json::<ApiResponse<T>>()
        .await
        .map_err(|e| GatewayError::UnexpectedResponse(e.to_string()))?;

    if !http_ok || !body.status {
        return Err(on_failure(body.message));
    }

    body.data
        .ok_or_else(|| GatewayError::UnexpectedResponse("missing data field".to_string()))
}

//! Payment gateway adapters.
//!
//! Two divergent provider APIs (card checkout vs. local bank transfer) are
//! normalized behind one facade. The provider is chosen once, at checkout
//! creation, from the session currency, and stored on the session; nothing
//! downstream re-derives it.

pub mod paystack;
pub mod stripe;

pub use paystack::PaystackClient;
pub use stripe::StripeClient;

use serde::Serialize;
use thiserror::Error;

use crate::db::models::{Currency, PaymentProvider, Session};
use crate::money::{self, MoneyError};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid webhook signature")]
    InvalidSignature,

    #[error("unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(#[from] MoneyError),

    #[error("checkout creation failed: {0}")]
    CheckoutCreationFailed(String),

    #[error("account resolution failed: {0}")]
    AccountResolutionFailed(String),

    #[error("recipient creation failed: {0}")]
    RecipientCreationFailed(String),

    #[error("transfer initiation failed: {0}")]
    TransferInitiationFailed(String),

    #[error("gateway circuit breaker open")]
    CircuitOpen,

    #[error("unexpected gateway response: {0}")]
    UnexpectedResponse(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutSession {
    pub provider: PaymentProvider,
    pub redirect_url: String,
    pub provider_reference: String,
}

#[derive(Clone)]
pub struct PaymentGateway {
    pub stripe: StripeClient,
    pub paystack: PaystackClient,
}

impl PaymentGateway {
    pub fn new(stripe: StripeClient, paystack: PaystackClient) -> Self {
        Self { stripe, paystack }
    }

    pub async fn create_checkout(
        &self,
        session: &Session,
        client_email: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession, GatewayError> {
        let currency = Currency::parse(&session.currency)
            .ok_or_else(|| GatewayError::UnsupportedCurrency(session.currency.clone()))?;

        match currency.provider() {
            PaymentProvider::Stripe => {
                self.stripe
                    .create_checkout_session(session, success_url, cancel_url)
                    .await
            }
            PaymentProvider::Paystack => {
                let amount_minor = money::to_minor_units(&session.price)?;
                let reference = session.id.simple().to_string();
                let initialized = self
                    .paystack
                    .initialize_transaction(client_email, amount_minor, &reference, "NGN")
                    .await?;
                Ok(CheckoutSession {
                    provider: PaymentProvider::Paystack,
                    redirect_url: initialized.authorization_url,
                    provider_reference: initialized.reference,
                })
            }
        }
    }
}

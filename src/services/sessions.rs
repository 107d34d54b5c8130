//! Session lifecycle outside the payment webhooks: booking with checkout
//! creation, and the explicit complete / cancel / reschedule actions.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::{Currency, PaymentProvider, Session};
use crate::db::queries;
use crate::error::AppError;
use crate::gateway::{CheckoutSession, PaymentGateway};
use crate::money;

#[derive(Debug)]
pub struct BookingRequest {
    pub client_id: Uuid,
    pub counselor_id: Uuid,
    pub client_email: String,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub price: BigDecimal,
    pub currency: String,
    pub notes: Option<String>,
}

#[derive(Clone)]
pub struct SessionService {
    pool: PgPool,
    gateway: PaymentGateway,
    success_url: String,
    cancel_url: String,
}

impl SessionService {
    pub fn new(pool: PgPool, gateway: PaymentGateway, success_url: String, cancel_url: String) -> Self {
        Self {
            pool,
            gateway,
            success_url,
            cancel_url,
        }
    }

    /// Creates the session in `pending_payment` and a hosted checkout for
    /// it. If the client abandons the checkout no webhook ever arrives and
    /// the expiry reaper cancels the session.
    pub async fn book(&self, request: BookingRequest) -> Result<(Session, CheckoutSession), AppError> {
        let currency = Currency::parse(&request.currency)
            .ok_or_else(|| AppError::Validation(format!("unsupported currency: {}", request.currency)))?;
        if request.price <= BigDecimal::from(0) {
            return Err(AppError::Validation("price must be positive".to_string()));
        }
        money::to_minor_units(&request.price).map_err(|e| AppError::Validation(e.to_string()))?;
        if request.duration_minutes <= 0 {
            return Err(AppError::Validation("duration must be positive".to_string()));
        }
        if request.scheduled_at <= Utc::now() {
            return Err(AppError::Validation("scheduled_at must be in the future".to_string()));
        }
        if request.client_id == request.counselor_id {
            return Err(AppError::Validation("client and counselor must differ".to_string()));
        }

        let session = Session::new(
            request.client_id,
            request.counselor_id,
            request.scheduled_at,
            request.duration_minutes,
            request.price.clone(),
            currency,
            request.notes,
        );
        let session = queries::insert_session(&self.pool, &session).await?;

        let checkout = self
            .gateway
            .create_checkout(&session, &request.client_email, &self.success_url, &self.cancel_url)
            .await?;

        let (stripe_checkout_id, payment_reference) = match checkout.provider {
            PaymentProvider::Stripe => (Some(checkout.provider_reference.as_str()), None),
            PaymentProvider::Paystack => (None, Some(checkout.provider_reference.as_str())),
        };
        let session = queries::set_checkout_refs(&self.pool, session.id, stripe_checkout_id, payment_reference)
            .await?
            .unwrap_or(session);

        tracing::info!(
            session_id = %session.id,
            provider = %session.payment_provider,
            "session booked, awaiting payment"
        );
        Ok((session, checkout))
    }

    pub async fn get(&self, id: Uuid) -> Result<Session, AppError> {
        queries::get_session(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("session {}", id)))
    }

    /// Pure status transition. Earnings were credited when the session was
    /// paid; completing it has no financial effect.
    pub async fn complete(&self, id: Uuid) -> Result<Session, AppError> {
        match queries::complete_session(&self.pool, id).await? {
            Some(session) => Ok(session),
            None => Err(self.rejection(id, "paid").await),
        }
    }

    pub async fn cancel(&self, id: Uuid) -> Result<Session, AppError> {
        match queries::cancel_session(&self.pool, id).await? {
            Some(session) => Ok(session),
            None => Err(self.rejection(id, "pending_payment or paid").await),
        }
    }

    /// Moves the date only; the payment state machine is untouched.
    pub async fn reschedule(&self, id: Uuid, scheduled_at: DateTime<Utc>) -> Result<Session, AppError> {
        if scheduled_at <= Utc::now() {
            return Err(AppError::Validation("scheduled_at must be in the future".to_string()));
        }
        match queries::reschedule_session(&self.pool, id, scheduled_at).await? {
            Some(session) => Ok(session),
            None => Err(self.rejection(id, "pending_payment or paid").await),
        }
    }

    async fn rejection(&self, id: Uuid, expected: &str) -> AppError {
        match queries::get_session(&self.pool, id).await {
            Ok(Some(session)) => AppError::InvalidState(format!(
                "session {} is {}, expected {}",
                id, session.status, expected
            )),
            Ok(None) => AppError::NotFound(format!("session {}", id)),
            Err(e) => AppError::Database(e),
        }
    }
}

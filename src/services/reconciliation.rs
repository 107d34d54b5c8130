//! Applies verified payment events to sessions and wallets, exactly once.
//!
//! The idempotency contract has two layers inside a single Postgres
//! transaction: a durable processed-event record keyed by the provider's
//! event identity, and a compare-and-swap on the session status. A replayed
//! webhook trips the first; two distinct events for the same payment trip
//! the second. Either way the provider gets a success response and nothing
//! is credited twice.

use bigdecimal::BigDecimal;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::{PaymentProvider, Session, SessionStatus, WalletTransaction};
use crate::db::queries;
use crate::error::AppError;
use crate::gateway::paystack::ChargeData;
use crate::gateway::stripe::StripeEvent;
use crate::money;
use crate::services::notifier::Notifier;
use crate::services::video::VideoRoomClient;

/// How the webhook payload identifies the session it pays for.
enum SessionRef {
    Id(Uuid),
    StripeCheckout(String),
    PaymentReference(String),
}

#[derive(Debug)]
pub enum PaymentOutcome {
    /// The session moved to `paid` and the counselor was credited.
    Applied(Session),
    /// Replay or second event for a settled payment; acknowledged, no effect.
    AlreadyProcessed,
    /// The session can no longer accept payment (canceled); acknowledged so
    /// the provider stops retrying, flagged for manual reconciliation.
    Ignored,
}

#[derive(Debug, Serialize)]
pub struct WalletAudit {
    pub wallet_id: Uuid,
    pub balance: BigDecimal,
    pub total_credits: BigDecimal,
    pub total_debits: BigDecimal,
    pub drift: BigDecimal,
}

#[derive(Clone)]
pub struct ReconciliationService {
    pool: PgPool,
    fee_rate: BigDecimal,
    video: VideoRoomClient,
    notifier: Notifier,
}

impl ReconciliationService {
    pub fn new(pool: PgPool, fee_rate: BigDecimal, video: VideoRoomClient, notifier: Notifier) -> Self {
        Self {
            pool,
            fee_rate,
            video,
            notifier,
        }
    }

    pub async fn apply_stripe_event(&self, event: &StripeEvent) -> Result<PaymentOutcome, AppError> {
        let object = &event.data.object;
        let session_ref = object
            .metadata
            .get("internalSessionId")
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .map(SessionRef::Id)
            .unwrap_or_else(|| SessionRef::StripeCheckout(object.id.clone()));

        self.apply_payment(
            PaymentProvider::Stripe,
            format!("stripe:{}", event.id),
            session_ref,
            object.payment_intent.as_deref().or(Some(object.id.as_str())),
            object.amount_total,
        )
        .await
    }

    pub async fn apply_paystack_charge(&self, charge: &ChargeData) -> Result<PaymentOutcome, AppError> {
        let payment_id = charge.id.map(|id| id.to_string());

        self.apply_payment(
            PaymentProvider::Paystack,
            format!("charge:{}", charge.reference),
            SessionRef::PaymentReference(charge.reference.clone()),
            payment_id.as_deref(),
            Some(charge.amount),
        )
        .await
    }

    async fn apply_payment(
        &self,
        provider: PaymentProvider,
        event_key: String,
        session_ref: SessionRef,
        payment_id: Option<&str>,
        amount_minor: Option<i64>,
    ) -> Result<PaymentOutcome, AppError> {
        let mut tx = self.pool.begin().await?;

        if !queries::record_processed_event(&mut tx, provider.as_str(), &event_key).await? {
            tx.rollback().await?;
            tracing::info!(event_key = %event_key, "payment event already applied, acknowledging replay");
            return Ok(PaymentOutcome::AlreadyProcessed);
        }

        let session = match &session_ref {
            SessionRef::Id(id) => queries::get_session_for_update(&mut tx, *id).await?,
            SessionRef::StripeCheckout(checkout_id) => {
                queries::find_session_by_checkout_for_update(&mut tx, checkout_id).await?
            }
            SessionRef::PaymentReference(reference) => {
                queries::find_session_by_reference_for_update(&mut tx, reference).await?
            }
        };

        let Some(session) = session else {
            tx.rollback().await?;
            tracing::error!(event_key = %event_key, "no session matches payment event");
            return Err(AppError::NotFound("session for payment event".to_string()));
        };

        // The session price is authoritative; a mismatched webhook amount is
        // surfaced for manual review, not silently trusted.
        if let Some(reported) = amount_minor {
            if let Ok(expected) = money::to_minor_units(&session.price) {
                if expected != reported {
                    tracing::warn!(
                        session_id = %session.id,
                        expected,
                        reported,
                        "webhook amount differs from session price"
                    );
                }
            }
        }

        let Some(paid) = queries::claim_session_paid(&mut tx, session.id, payment_id).await? else {
            return match session.status() {
                Some(SessionStatus::Paid) | Some(SessionStatus::Completed) => {
                    tx.commit().await?;
                    tracing::info!(session_id = %session.id, "session already paid, acknowledging replay");
                    Ok(PaymentOutcome::AlreadyProcessed)
                }
                _ => {
                    tx.commit().await?;
                    tracing::warn!(
                        session_id = %session.id,
                        status = %session.status,
                        "payment arrived for a session that can no longer be paid"
                    );
                    Ok(PaymentOutcome::Ignored)
                }
            };
        };

        let earned = money::amount_earned(&paid.price, &self.fee_rate);
        let wallet = queries::credit_wallet(&mut tx, paid.counselor_id, &paid.currency, &earned).await?;
        if wallet.currency != paid.currency {
            // Wallet currency is fixed at first credit; a counselor paid in
            // two currencies needs manual attention.
            tracing::warn!(
                wallet_id = %wallet.id,
                wallet_currency = %wallet.currency,
                session_currency = %paid.currency,
                "session currency differs from wallet currency"
            );
        }
        let entry = WalletTransaction::credit(
            wallet.id,
            earned.clone(),
            format!("Earnings for session {}", paid.id),
            Some(event_key.clone()),
        );
        queries::insert_wallet_transaction(&mut tx, &entry).await?;

        tx.commit().await?;

        tracing::info!(
            session_id = %paid.id,
            wallet_id = %wallet.id,
            amount = %earned,
            "session paid, counselor credited"
        );

        let paid = self.provision_video_room(paid).await;

        let booked = serde_json::json!({
            "session_id": paid.id,
            "scheduled_at": paid.scheduled_at,
            "video_call_url": paid.video_call_url,
        });
        self.notifier.notify(paid.client_id, "session-booked", booked.clone()).await;
        self.notifier.notify(paid.counselor_id, "session-booked", booked).await;
        self.notifier
            .notify(
                paid.counselor_id,
                "wallet-updated",
                serde_json::json!({ "balance": wallet.balance.to_string() }),
            )
            .await;

        Ok(PaymentOutcome::Applied(paid))
    }

    /// Room creation is best effort: a provider outage must never block
    /// payment confirmation.
    async fn provision_video_room(&self, session: Session) -> Session {
        match self.video.create_room(session.scheduled_at, session.ends_at()).await {
            Ok(url) => match queries::set_video_call_url(&self.pool, session.id, &url).await {
                Ok(Some(updated)) => updated,
                Ok(None) => session,
                Err(e) => {
                    tracing::error!(session_id = %session.id, error = %e, "failed to store video room url");
                    session
                }
            },
            Err(e) => {
                tracing::warn!(
                    session_id = %session.id,
                    error = %e,
                    "video room creation failed, continuing without a room"
                );
                session
            }
        }
    }

    /// Recomputes the wallet balance from the ledger and reports drift. The
    /// two must agree; any difference means manual reconciliation.
    pub async fn audit_wallet(&self, user_id: Uuid) -> Result<WalletAudit, AppError> {
        let wallet = queries::get_wallet_by_user(&self.pool, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("wallet for user {}", user_id)))?;

        let (total_credits, total_debits) = queries::wallet_ledger_totals(&self.pool, wallet.id).await?;
        let drift = &wallet.balance - (&total_credits - &total_debits);

        if drift != BigDecimal::from(0) {
            tracing::error!(wallet_id = %wallet.id, drift = %drift, "wallet balance drifted from ledger");
        }

        Ok(WalletAudit {
            wallet_id: wallet.id,
            balance: wallet.balance,
            total_credits,
            total_debits,
            drift,
        })
    }
}

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enumerations
//
// Statuses are stored as TEXT and parsed at the edges; every guarded
// transition in queries.rs is expressed as a compare-and-swap against the
// expected pre-state, so the tables below are the single source of truth for
// what the SQL guards allow.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    PendingPayment,
    Paid,
    Completed,
    Canceled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::PendingPayment => "pending_payment",
            SessionStatus::Paid => "paid",
            SessionStatus::Completed => "completed",
            SessionStatus::Canceled => "canceled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending_payment" => Some(SessionStatus::PendingPayment),
            "paid" => Some(SessionStatus::Paid),
            "completed" => Some(SessionStatus::Completed),
            "canceled" => Some(SessionStatus::Canceled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Canceled)
    }

    /// Validates if a state transition is allowed.
    pub fn can_transition_to(&self, next: &SessionStatus) -> bool {
        match (self, next) {
            (SessionStatus::PendingPayment, SessionStatus::Paid) => true,
            (SessionStatus::Paid, SessionStatus::Completed) => true,
            (SessionStatus::PendingPayment, SessionStatus::Canceled) => true,
            (SessionStatus::Paid, SessionStatus::Canceled) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    Usd,
    Ngn,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Usd => "usd",
            Currency::Ngn => "ngn",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "usd" => Some(Currency::Usd),
            "ngn" => Some(Currency::Ngn),
            _ => None,
        }
    }

    /// The gateway that settles charges in this currency. Chosen once at
    /// booking time and stored on the session.
    pub fn provider(&self) -> PaymentProvider {
        match self {
            Currency::Usd => PaymentProvider::Stripe,
            Currency::Ngn => PaymentProvider::Paystack,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider {
    Stripe,
    Paystack,
}

impl PaymentProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentProvider::Stripe => "stripe",
            PaymentProvider::Paystack => "paystack",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "stripe" => Some(PaymentProvider::Stripe),
            "paystack" => Some(PaymentProvider::Paystack),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Credit,
    Debit,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Credit => "credit",
            TransactionKind::Debit => "debit",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Processing => "processing",
            WithdrawalStatus::Completed => "completed",
            WithdrawalStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(WithdrawalStatus::Pending),
            "processing" => Some(WithdrawalStatus::Processing),
            "completed" => Some(WithdrawalStatus::Completed),
            "failed" => Some(WithdrawalStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WithdrawalStatus::Completed | WithdrawalStatus::Failed)
    }

    pub fn can_transition_to(&self, next: &WithdrawalStatus) -> bool {
        match (self, next) {
            (WithdrawalStatus::Pending, WithdrawalStatus::Processing) => true,
            (WithdrawalStatus::Pending, WithdrawalStatus::Completed) => true,
            (WithdrawalStatus::Pending, WithdrawalStatus::Failed) => true,
            (WithdrawalStatus::Processing, WithdrawalStatus::Completed) => true,
            (WithdrawalStatus::Processing, WithdrawalStatus::Failed) => true,
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub client_id: Uuid,
    pub counselor_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub price: BigDecimal,
    pub currency: String,
    pub status: String,
    pub payment_provider: String,
    pub stripe_checkout_id: Option<String>,
    pub payment_reference: Option<String>,
    pub payment_intent_id: Option<String>,
    pub video_call_url: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(
        client_id: Uuid,
        counselor_id: Uuid,
        scheduled_at: DateTime<Utc>,
        duration_minutes: i32,
        price: BigDecimal,
        currency: Currency,
        notes: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            client_id,
            counselor_id,
            scheduled_at,
            duration_minutes,
            price,
            currency: currency.as_str().to_string(),
            status: SessionStatus::PendingPayment.as_str().to_string(),
            payment_provider: currency.provider().as_str().to_string(),
            stripe_checkout_id: None,
            payment_reference: None,
            payment_intent_id: None,
            video_call_url: None,
            notes,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(&self) -> Option<SessionStatus> {
        SessionStatus::parse(&self.status)
    }

    pub fn ends_at(&self) -> DateTime<Utc> {
        self.scheduled_at + chrono::Duration::minutes(self.duration_minutes as i64)
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Wallet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub balance: BigDecimal,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Immutable ledger entry. The sum of completed credits minus completed
/// debits for a wallet must equal its balance; the wallet audit recomputes
/// this on demand.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub kind: String,
    pub amount: BigDecimal,
    pub description: String,
    pub status: String,
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl WalletTransaction {
    pub fn credit(wallet_id: Uuid, amount: BigDecimal, description: String, reference: Option<String>) -> Self {
        Self::entry(wallet_id, TransactionKind::Credit, amount, description, reference)
    }

    pub fn debit(wallet_id: Uuid, amount: BigDecimal, description: String, reference: Option<String>) -> Self {
        Self::entry(wallet_id, TransactionKind::Debit, amount, description, reference)
    }

    fn entry(
        wallet_id: Uuid,
        kind: TransactionKind,
        amount: BigDecimal,
        description: String,
        reference: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            wallet_id,
            kind: kind.as_str().to_string(),
            amount,
            description,
            status: "completed".to_string(),
            reference,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Withdrawal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub bank_account_id: Uuid,
    pub amount: BigDecimal,
    pub currency: String,
    pub status: String,
    pub transfer_code: Option<String>,
    pub recipient_code: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Withdrawal {
    pub fn new(user_id: Uuid, bank_account_id: Uuid, amount: BigDecimal, currency: Currency) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            bank_account_id,
            amount,
            currency: currency.as_str().to_string(),
            status: WithdrawalStatus::Pending.as_str().to_string(),
            transfer_code: None,
            recipient_code: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(&self) -> Option<WithdrawalStatus> {
        WithdrawalStatus::parse(&self.status)
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct BankAccount {
    pub id: Uuid,
    pub user_id: Uuid,
    pub account_name: String,
    pub account_number: String,
    pub bank_code: String,
    pub bank_name: Option<String>,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_session_status_happy_path() {
        assert!(SessionStatus::PendingPayment.can_transition_to(&SessionStatus::Paid));
        assert!(SessionStatus::Paid.can_transition_to(&SessionStatus::Completed));
    }

    #[test]
    fn test_session_status_cancellation() {
        assert!(SessionStatus::PendingPayment.can_transition_to(&SessionStatus::Canceled));
        assert!(SessionStatus::Paid.can_transition_to(&SessionStatus::Canceled));
    }

    #[test]
    fn test_terminal_session_states_are_immutable() {
        for terminal in [SessionStatus::Completed, SessionStatus::Canceled] {
            for next in [
                SessionStatus::PendingPayment,
                SessionStatus::Paid,
                SessionStatus::Completed,
                SessionStatus::Canceled,
            ] {
                assert!(
                    !terminal.can_transition_to(&next),
                    "{:?} -> {:?} must be rejected",
                    terminal,
                    next
                );
            }
            assert!(terminal.is_terminal());
        }
    }

    #[test]
    fn test_paid_is_entered_only_from_pending_payment() {
        assert!(!SessionStatus::Paid.can_transition_to(&SessionStatus::Paid));
        assert!(!SessionStatus::Completed.can_transition_to(&SessionStatus::Paid));
        assert!(!SessionStatus::Canceled.can_transition_to(&SessionStatus::Paid));
    }

    #[test]
    fn test_session_status_round_trip() {
        for status in [
            SessionStatus::PendingPayment,
            SessionStatus::Paid,
            SessionStatus::Completed,
            SessionStatus::Canceled,
        ] {
            assert_eq!(SessionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SessionStatus::parse("refunded"), None);
    }

    #[test]
    fn test_withdrawal_status_transitions() {
        assert!(WithdrawalStatus::Pending.can_transition_to(&WithdrawalStatus::Processing));
        assert!(WithdrawalStatus::Processing.can_transition_to(&WithdrawalStatus::Completed));
        assert!(WithdrawalStatus::Processing.can_transition_to(&WithdrawalStatus::Failed));
        assert!(!WithdrawalStatus::Completed.can_transition_to(&WithdrawalStatus::Failed));
        assert!(!WithdrawalStatus::Failed.can_transition_to(&WithdrawalStatus::Processing));
    }

    #[test]
    fn test_currency_provider_selection() {
        assert_eq!(Currency::Usd.provider(), PaymentProvider::Stripe);
        assert_eq!(Currency::Ngn.provider(), PaymentProvider::Paystack);
        assert_eq!(Currency::parse("eur"), None);
    }

    #[test]
    fn test_new_session_starts_pending_payment() {
        let session = Session::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Utc::now() + chrono::Duration::days(1),
            60,
            BigDecimal::from_str("100.00").unwrap(),
            Currency::Usd,
            None,
        );
        assert_eq!(session.status(), Some(SessionStatus::PendingPayment));
        assert_eq!(session.payment_provider, "stripe");
        assert!(session.video_call_url.is_none());
    }

    #[test]
    fn test_ledger_entry_constructors() {
        let wallet_id = Uuid::new_v4();
        let credit = WalletTransaction::credit(
            wallet_id,
            BigDecimal::from(90),
            "Session earnings".to_string(),
            Some("stripe:evt_1".to_string()),
        );
        assert_eq!(credit.kind, "credit");
        assert_eq!(credit.status, "completed");

        let debit = WalletTransaction::debit(wallet_id, BigDecimal::from(50), "Withdrawal".to_string(), None);
        assert_eq!(debit.kind, "debit");
    }
}

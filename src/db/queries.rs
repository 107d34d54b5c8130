use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Result, Transaction as SqlxTransaction};
use uuid::Uuid;

use crate::db::models::{BankAccount, Session, Wallet, WalletTransaction, Withdrawal};
use bigdecimal::BigDecimal;

// --- Session Queries ---

pub async fn insert_session(pool: &PgPool, session: &Session) -> Result<Session> {
    sqlx::query_as::<_, Session>(
        r#"
        INSERT INTO sessions (
            id, client_id, counselor_id, scheduled_at, duration_minutes, price, currency,
            status, payment_provider, stripe_checkout_id, payment_reference, payment_intent_id,
            video_call_url, notes, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        RETURNING *
        "#,
    )
    .bind(session.id)
    .bind(session.client_id)
    .bind(session.counselor_id)
    .bind(session.scheduled_at)
    .bind(session.duration_minutes)
    .bind(&session.price)
    .bind(&session.currency)
    .bind(&session.status)
    .bind(&session.payment_provider)
    .bind(&session.stripe_checkout_id)
    .bind(&session.payment_reference)
    .bind(&session.payment_intent_id)
    .bind(&session.video_call_url)
    .bind(&session.notes)
    .bind(session.created_at)
    .bind(session.updated_at)
    .fetch_one(pool)
    .await
}

pub async fn get_session(pool: &PgPool, id: Uuid) -> Result<Option<Session>> {
    sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Stores the provider references handed back at checkout creation.
pub async fn set_checkout_refs(
    pool: &PgPool,
    id: Uuid,
    stripe_checkout_id: Option<&str>,
    payment_reference: Option<&str>,
) -> Result<Option<Session>> {
    sqlx::query_as::<_, Session>(
        r#"
        UPDATE sessions
        SET stripe_checkout_id = $2, payment_reference = $3, updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(stripe_checkout_id)
    .bind(payment_reference)
    .fetch_optional(pool)
    .await
}

pub async fn get_session_for_update(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
) -> Result<Option<Session>> {
    sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **executor)
        .await
}

pub async fn find_session_by_checkout_for_update(
    executor: &mut SqlxTransaction<'_, Postgres>,
    stripe_checkout_id: &str,
) -> Result<Option<Session>> {
    sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE stripe_checkout_id = $1 FOR UPDATE")
        .bind(stripe_checkout_id)
        .fetch_optional(&mut **executor)
        .await
}

pub async fn find_session_by_reference_for_update(
    executor: &mut SqlxTransaction<'_, Postgres>,
    payment_reference: &str,
) -> Result<Option<Session>> {
    sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE payment_reference = $1 FOR UPDATE")
        .bind(payment_reference)
        .fetch_optional(&mut **executor)
        .await
}

/// Compare-and-swap into `paid`. Returns None when the session is not in
/// `pending_payment`, which is how duplicate webhook deliveries turn into
/// no-ops.
pub async fn claim_session_paid(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
    payment_intent_id: Option<&str>,
) -> Result<Option<Session>> {
    sqlx::query_as::<_, Session>(
        r#"
        UPDATE sessions
        SET status = 'paid',
            payment_intent_id = COALESCE($2, payment_intent_id),
            updated_at = now()
        WHERE id = $1 AND status = 'pending_payment'
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(payment_intent_id)
    .fetch_optional(&mut **executor)
    .await
}

pub async fn complete_session(pool: &PgPool, id: Uuid) -> Result<Option<Session>> {
    sqlx::query_as::<_, Session>(
        "UPDATE sessions SET status = 'completed', updated_at = now() WHERE id = $1 AND status = 'paid' RETURNING *",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn cancel_session(pool: &PgPool, id: Uuid) -> Result<Option<Session>> {
    sqlx::query_as::<_, Session>(
        r#"
        UPDATE sessions SET status = 'canceled', updated_at = now()
        WHERE id = $1 AND status IN ('pending_payment', 'paid')
        RETURNING *
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn reschedule_session(
    pool: &PgPool,
    id: Uuid,
    scheduled_at: DateTime<Utc>,
) -> Result<Option<Session>> {
    sqlx::query_as::<_, Session>(
        r#"
        UPDATE sessions SET scheduled_at = $2, updated_at = now()
        WHERE id = $1 AND status IN ('pending_payment', 'paid')
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(scheduled_at)
    .fetch_optional(pool)
    .await
}

pub async fn set_video_call_url(pool: &PgPool, id: Uuid, url: &str) -> Result<Option<Session>> {
    sqlx::query_as::<_, Session>(
        "UPDATE sessions SET video_call_url = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(url)
    .fetch_optional(pool)
    .await
}

/// Sweeps abandoned checkouts: sessions still awaiting payment past the
/// cutoff are canceled in one statement.
pub async fn expire_stale_sessions(pool: &PgPool, cutoff: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE sessions SET status = 'canceled', updated_at = now()
        WHERE status = 'pending_payment' AND created_at < $1
        "#,
    )
    .bind(cutoff)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

// --- Wallet Queries ---

/// Lazily creates the wallet and applies the credit in a single upsert, so
/// concurrent credits for the same counselor serialize at the row.
pub async fn credit_wallet(
    executor: &mut SqlxTransaction<'_, Postgres>,
    user_id: Uuid,
    currency: &str,
    amount: &BigDecimal,
) -> Result<Wallet> {
    sqlx::query_as::<_, Wallet>(
        r#"
        INSERT INTO wallets (id, user_id, balance, currency, created_at, updated_at)
        VALUES ($1, $2, $3, $4, now(), now())
        ON CONFLICT (user_id)
        DO UPDATE SET balance = wallets.balance + EXCLUDED.balance, updated_at = now()
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(amount)
    .bind(currency)
    .fetch_one(&mut **executor)
    .await
}

pub async fn lock_wallet(
    executor: &mut SqlxTransaction<'_, Postgres>,
    user_id: Uuid,
) -> Result<Option<Wallet>> {
    sqlx::query_as::<_, Wallet>("SELECT * FROM wallets WHERE user_id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(&mut **executor)
        .await
}

/// Atomic decrement. Callers hold the row lock and have already checked the
/// balance, so this cannot drive the wallet negative.
pub async fn debit_wallet(
    executor: &mut SqlxTransaction<'_, Postgres>,
    wallet_id: Uuid,
    amount: &BigDecimal,
) -> Result<Wallet> {
    sqlx::query_as::<_, Wallet>(
        "UPDATE wallets SET balance = balance - $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(wallet_id)
    .bind(amount)
    .fetch_one(&mut **executor)
    .await
}

pub async fn get_wallet_by_user(pool: &PgPool, user_id: Uuid) -> Result<Option<Wallet>> {
    sqlx::query_as::<_, Wallet>("SELECT * FROM wallets WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

pub async fn insert_wallet_transaction(
    executor: &mut SqlxTransaction<'_, Postgres>,
    entry: &WalletTransaction,
) -> Result<WalletTransaction> {
    sqlx::query_as::<_, WalletTransaction>(
        r#"
        INSERT INTO wallet_transactions (id, wallet_id, kind, amount, description, status, reference, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(entry.id)
    .bind(entry.wallet_id)
    .bind(&entry.kind)
    .bind(&entry.amount)
    .bind(&entry.description)
    .bind(&entry.status)
    .bind(&entry.reference)
    .bind(entry.created_at)
    .fetch_one(&mut **executor)
    .await
}

pub async fn list_wallet_transactions(
    pool: &PgPool,
    wallet_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<WalletTransaction>> {
    sqlx::query_as::<_, WalletTransaction>(
        "SELECT * FROM wallet_transactions WHERE wallet_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(wallet_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

/// Completed credits and debits for a wallet, for the balance audit.
pub async fn wallet_ledger_totals(pool: &PgPool, wallet_id: Uuid) -> Result<(BigDecimal, BigDecimal)> {
    sqlx::query_as::<_, (BigDecimal, BigDecimal)>(
        r#"
        SELECT
            COALESCE(SUM(amount) FILTER (WHERE kind = 'credit' AND status = 'completed'), 0),
            COALESCE(SUM(amount) FILTER (WHERE kind = 'debit' AND status = 'completed'), 0)
        FROM wallet_transactions
        WHERE wallet_id = $1
        "#,
    )
    .bind(wallet_id)
    .fetch_one(pool)
    .await
}

// --- Withdrawal Queries ---

pub async fn insert_withdrawal(
    executor: &mut SqlxTransaction<'_, Postgres>,
    withdrawal: &Withdrawal,
) -> Result<Withdrawal> {
    sqlx::query_as::<_, Withdrawal>(
        r#"
        INSERT INTO withdrawals (
            id, user_id, bank_account_id, amount, currency, status,
            transfer_code, recipient_code, failure_reason, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING *
        "#,
    )
    .bind(withdrawal.id)
    .bind(withdrawal.user_id)
    .bind(withdrawal.bank_account_id)
    .bind(&withdrawal.amount)
    .bind(&withdrawal.currency)
    .bind(&withdrawal.status)
    .bind(&withdrawal.transfer_code)
    .bind(&withdrawal.recipient_code)
    .bind(&withdrawal.failure_reason)
    .bind(withdrawal.created_at)
    .bind(withdrawal.updated_at)
    .fetch_one(&mut **executor)
    .await
}

pub async fn get_withdrawal(pool: &PgPool, id: Uuid) -> Result<Option<Withdrawal>> {
    sqlx::query_as::<_, Withdrawal>("SELECT * FROM withdrawals WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_withdrawal_by_transfer_code(
    executor: &mut SqlxTransaction<'_, Postgres>,
    transfer_code: &str,
) -> Result<Option<Withdrawal>> {
    sqlx::query_as::<_, Withdrawal>("SELECT * FROM withdrawals WHERE transfer_code = $1")
        .bind(transfer_code)
        .fetch_optional(&mut **executor)
        .await
}

pub async fn mark_withdrawal_processing(
    pool: &PgPool,
    id: Uuid,
    transfer_code: &str,
    recipient_code: &str,
) -> Result<Option<Withdrawal>> {
    sqlx::query_as::<_, Withdrawal>(
        r#"
        UPDATE withdrawals
        SET status = 'processing', transfer_code = $2, recipient_code = $3, updated_at = now()
        WHERE id = $1 AND status = 'pending'
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(transfer_code)
    .bind(recipient_code)
    .fetch_optional(pool)
    .await
}

/// Compare-and-swap into `completed` by transfer code. None when the
/// withdrawal is unknown or already terminal.
pub async fn complete_withdrawal_by_code(
    executor: &mut SqlxTransaction<'_, Postgres>,
    transfer_code: &str,
) -> Result<Option<Withdrawal>> {
    sqlx::query_as::<_, Withdrawal>(
        r#"
        UPDATE withdrawals SET status = 'completed', updated_at = now()
        WHERE transfer_code = $1 AND status IN ('pending', 'processing')
        RETURNING *
        "#,
    )
    .bind(transfer_code)
    .fetch_optional(&mut **executor)
    .await
}

/// Compare-and-swap into `failed`. The guard is what makes the refund credit
/// fire at most once per withdrawal.
pub async fn fail_withdrawal(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
    reason: &str,
) -> Result<Option<Withdrawal>> {
    sqlx::query_as::<_, Withdrawal>(
        r#"
        UPDATE withdrawals SET status = 'failed', failure_reason = $2, updated_at = now()
        WHERE id = $1 AND status IN ('pending', 'processing')
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(reason)
    .fetch_optional(&mut **executor)
    .await
}

pub async fn fail_withdrawal_by_code(
    executor: &mut SqlxTransaction<'_, Postgres>,
    transfer_code: &str,
    reason: &str,
) -> Result<Option<Withdrawal>> {
    sqlx::query_as::<_, Withdrawal>(
        r#"
        UPDATE withdrawals SET status = 'failed', failure_reason = $2, updated_at = now()
        WHERE transfer_code = $1 AND status IN ('pending', 'processing')
        RETURNING *
        "#,
    )
    .bind(transfer_code)
    .bind(reason)
    .fetch_optional(&mut **executor)
    .await
}

// --- Bank Account Queries ---

pub async fn insert_bank_account(pool: &PgPool, account: &BankAccount) -> Result<BankAccount> {
    sqlx::query_as::<_, BankAccount>(
        r#"
        INSERT INTO bank_accounts (
            id, user_id, account_name, account_number, bank_code, bank_name,
            is_verified, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(account.id)
    .bind(account.user_id)
    .bind(&account.account_name)
    .bind(&account.account_number)
    .bind(&account.bank_code)
    .bind(&account.bank_name)
    .bind(account.is_verified)
    .bind(account.created_at)
    .bind(account.updated_at)
    .fetch_one(pool)
    .await
}

pub async fn find_verified_bank_account(pool: &PgPool, user_id: Uuid) -> Result<Option<BankAccount>> {
    sqlx::query_as::<_, BankAccount>(
        r#"
        SELECT * FROM bank_accounts
        WHERE user_id = $1 AND is_verified = TRUE
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub async fn list_bank_accounts(pool: &PgPool, user_id: Uuid) -> Result<Vec<BankAccount>> {
    sqlx::query_as::<_, BankAccount>(
        "SELECT * FROM bank_accounts WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

// --- Processed Event Queries ---

/// Records a webhook event's identity. Returns false when the event was
/// already applied; the caller then rolls back and acknowledges the replay.
pub async fn record_processed_event(
    executor: &mut SqlxTransaction<'_, Postgres>,
    provider: &str,
    event_key: &str,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO processed_events (id, provider, event_key, received_at)
        VALUES ($1, $2, $3, now())
        ON CONFLICT (provider, event_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(provider)
    .bind(event_key)
    .execute(&mut **executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

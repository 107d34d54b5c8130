//! Payout flow: reserve funds, ask the gateway to move them, reconcile the
//! result. The wallet debit is optimistic; every synchronous failure after
//! it compensates with a refund credit in the same request, and asynchronous
//! failures (`transfer.failed` / `transfer.reversed`) refund through the
//! webhook path. The failed-status compare-and-swap is what keeps the two
//! paths from ever refunding twice.

use bigdecimal::BigDecimal;
use sqlx::{PgPool, Postgres, Transaction as SqlxTransaction};
use uuid::Uuid;

use crate::db::models::{BankAccount, Currency, Wallet, WalletTransaction, Withdrawal};
use crate::db::queries;
use crate::error::AppError;
use crate::gateway::paystack::{InitiatedTransfer, PaystackClient, TransferData};
use crate::gateway::GatewayError;
use crate::money;
use crate::services::notifier::Notifier;

#[derive(Debug)]
pub enum TransferOutcome {
    Completed(Withdrawal),
    Refunded(Withdrawal),
    /// Replay of an event for an already-settled withdrawal.
    AlreadyFinal,
}

#[derive(Clone)]
pub struct WithdrawalService {
    pool: PgPool,
    paystack: PaystackClient,
    notifier: Notifier,
}

impl WithdrawalService {
    pub fn new(pool: PgPool, paystack: PaystackClient, notifier: Notifier) -> Self {
        Self {
            pool,
            paystack,
            notifier,
        }
    }

    pub async fn request_withdrawal(
        &self,
        user_id: Uuid,
        amount: BigDecimal,
        currency: &str,
    ) -> Result<Withdrawal, AppError> {
        let currency = Currency::parse(currency)
            .ok_or_else(|| AppError::Validation(format!("unsupported currency: {}", currency)))?;
        if amount <= BigDecimal::from(0) {
            return Err(AppError::Validation("withdrawal amount must be positive".to_string()));
        }
        let amount_minor =
            money::to_minor_units(&amount).map_err(|e| AppError::Validation(e.to_string()))?;

        let bank = queries::find_verified_bank_account(&self.pool, user_id)
            .await?
            .ok_or_else(|| AppError::Validation("no verified bank account on file".to_string()))?;

        let withdrawal = self.reserve_funds(user_id, &amount, currency, &bank).await?;

        // Funds are now held; any failure below must put them back before we
        // respond.
        match self.execute_transfer(&bank, &withdrawal, amount_minor).await {
            Ok((recipient_code, transfer)) => {
                let updated = queries::mark_withdrawal_processing(
                    &self.pool,
                    withdrawal.id,
                    &transfer.transfer_code,
                    &recipient_code,
                )
                .await?
                .unwrap_or(withdrawal);

                tracing::info!(
                    withdrawal_id = %updated.id,
                    transfer_code = %transfer.transfer_code,
                    "withdrawal handed to gateway"
                );
                Ok(updated)
            }
            Err(gateway_err) => {
                tracing::warn!(
                    withdrawal_id = %withdrawal.id,
                    error = %gateway_err,
                    "transfer could not be initiated, refunding reserved funds"
                );
                self.refund(&withdrawal, &gateway_err.to_string()).await?;
                Err(AppError::Gateway(gateway_err))
            }
        }
    }

    /// Debits the wallet and records the pending withdrawal in one
    /// transaction, under a row lock so concurrent requests cannot both pass
    /// the balance check.
    async fn reserve_funds(
        &self,
        user_id: Uuid,
        amount: &BigDecimal,
        currency: Currency,
        bank: &BankAccount,
    ) -> Result<Withdrawal, AppError> {
        let mut tx = self.pool.begin().await?;

        let Some(wallet) = queries::lock_wallet(&mut tx, user_id).await? else {
            tx.rollback().await?;
            return Err(AppError::NotFound(format!("wallet for user {}", user_id)));
        };
        if wallet.currency != currency.as_str() {
            tx.rollback().await?;
            return Err(AppError::Validation(format!(
                "wallet currency is {}, not {}",
                wallet.currency,
                currency.as_str()
            )));
        }
        if wallet.balance < *amount {
            tx.rollback().await?;
            return Err(AppError::InsufficientFunds);
        }

        queries::debit_wallet(&mut tx, wallet.id, amount).await?;
        let withdrawal = Withdrawal::new(user_id, bank.id, amount.clone(), currency);
        let withdrawal = queries::insert_withdrawal(&mut tx, &withdrawal).await?;
        let entry = WalletTransaction::debit(
            wallet.id,
            amount.clone(),
            format!("Withdrawal {}", withdrawal.id),
            Some(format!("withdrawal:{}", withdrawal.id)),
        );
        queries::insert_wallet_transaction(&mut tx, &entry).await?;

        tx.commit().await?;
        Ok(withdrawal)
    }

    async fn execute_transfer(
        &self,
        bank: &BankAccount,
        withdrawal: &Withdrawal,
        amount_minor: i64,
    ) -> Result<(String, InitiatedTransfer), GatewayError> {
        let recipient_code = self
            .paystack
            .create_transfer_recipient(&bank.account_name, &bank.account_number, &bank.bank_code)
            .await?;
        let reference = format!("wd-{}", withdrawal.id.simple());
        let transfer = self
            .paystack
            .initiate_transfer(amount_minor, &recipient_code, &reference, "Wallet withdrawal")
            .await?;
        Ok((recipient_code, transfer))
    }

    pub async fn handle_transfer_event(
        &self,
        event: &str,
        data: &TransferData,
    ) -> Result<TransferOutcome, AppError> {
        let mut tx = self.pool.begin().await?;

        let event_key = format!("transfer:{}:{}", event, data.transfer_code);
        if !queries::record_processed_event(&mut tx, "paystack", &event_key).await? {
            tx.rollback().await?;
            tracing::info!(event_key = %event_key, "transfer event already applied, acknowledging replay");
            return Ok(TransferOutcome::AlreadyFinal);
        }

        match event {
            "transfer.success" => {
                match queries::complete_withdrawal_by_code(&mut tx, &data.transfer_code).await? {
                    Some(withdrawal) => {
                        tx.commit().await?;
                        tracing::info!(withdrawal_id = %withdrawal.id, "withdrawal completed");
                        Ok(TransferOutcome::Completed(withdrawal))
                    }
                    None => self.acknowledge_settled(tx, &data.transfer_code).await,
                }
            }
            "transfer.failed" | "transfer.reversed" => {
                let reason = data.reason.clone().unwrap_or_else(|| event.to_string());
                match queries::fail_withdrawal_by_code(&mut tx, &data.transfer_code, &reason).await? {
                    Some(withdrawal) => {
                        let wallet = self.refund_in_tx(&mut tx, &withdrawal).await?;
                        tx.commit().await?;
                        tracing::warn!(
                            withdrawal_id = %withdrawal.id,
                            reason = %reason,
                            "transfer did not settle, wallet refunded"
                        );
                        self.notifier
                            .notify(
                                withdrawal.user_id,
                                "wallet-updated",
                                serde_json::json!({ "balance": wallet.balance.to_string() }),
                            )
                            .await;
                        Ok(TransferOutcome::Refunded(withdrawal))
                    }
                    None => self.acknowledge_settled(tx, &data.transfer_code).await,
                }
            }
            other => {
                tx.rollback().await?;
                tracing::info!(event = other, "unhandled transfer event");
                Ok(TransferOutcome::AlreadyFinal)
            }
        }
    }

    /// Synchronous compensation after a failed initiation. Shares the
    /// failed-status guard with the webhook path.
    async fn refund(&self, withdrawal: &Withdrawal, reason: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let Some(failed) = queries::fail_withdrawal(&mut tx, withdrawal.id, reason).await? else {
            tx.rollback().await?;
            tracing::info!(withdrawal_id = %withdrawal.id, "withdrawal already settled, skipping refund");
            return Ok(());
        };

        let wallet = self.refund_in_tx(&mut tx, &failed).await?;
        tx.commit().await?;

        self.notifier
            .notify(
                failed.user_id,
                "wallet-updated",
                serde_json::json!({ "balance": wallet.balance.to_string() }),
            )
            .await;
        Ok(())
    }

    async fn refund_in_tx(
        &self,
        tx: &mut SqlxTransaction<'_, Postgres>,
        withdrawal: &Withdrawal,
    ) -> Result<Wallet, AppError> {
        let wallet = queries::credit_wallet(tx, withdrawal.user_id, &withdrawal.currency, &withdrawal.amount).await?;
        let entry = WalletTransaction::credit(
            wallet.id,
            withdrawal.amount.clone(),
            format!("Refund for withdrawal {}", withdrawal.id),
            Some(format!("withdrawal-refund:{}", withdrawal.id)),
        );
        queries::insert_wallet_transaction(tx, &entry).await?;
        Ok(wallet)
    }

    async fn acknowledge_settled(
        &self,
        mut tx: SqlxTransaction<'_, Postgres>,
        transfer_code: &str,
    ) -> Result<TransferOutcome, AppError> {
        match queries::find_withdrawal_by_transfer_code(&mut tx, transfer_code).await? {
            Some(withdrawal) => {
                // Keep the processed-event record; the business state is
                // already terminal.
                tx.commit().await?;
                tracing::info!(
                    withdrawal_id = %withdrawal.id,
                    status = %withdrawal.status,
                    "transfer event for settled withdrawal, acknowledging"
                );
                Ok(TransferOutcome::AlreadyFinal)
            }
            None => {
                tx.rollback().await?;
                tracing::error!(transfer_code = %transfer_code, "transfer event matches no withdrawal");
                Err(AppError::NotFound(format!(
                    "withdrawal with transfer code {}",
                    transfer_code
                )))
            }
        }
    }
}

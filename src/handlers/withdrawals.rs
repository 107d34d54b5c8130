use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::models::BankAccount;
use crate::db::queries;
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct WithdrawalRequestBody {
    pub user_id: Uuid,
    pub amount: BigDecimal,
    pub currency: String,
}

#[derive(Debug, Deserialize)]
pub struct AddBankAccountRequest {
    pub user_id: Uuid,
    pub account_number: String,
    pub bank_code: String,
    pub bank_name: Option<String>,
}

pub async fn request_withdrawal(
    State(state): State<AppState>,
    Json(body): Json<WithdrawalRequestBody>,
) -> Result<impl IntoResponse, AppError> {
    let withdrawal = state
        .withdrawals
        .request_withdrawal(body.user_id, body.amount, &body.currency)
        .await?;

    Ok((StatusCode::CREATED, Json(withdrawal)))
}

pub async fn get_withdrawal(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let withdrawal = queries::get_withdrawal(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("withdrawal {}", id)))?;

    Ok(Json(withdrawal))
}

/// The account is stored with the name the gateway resolved for it, and is
/// only marked verified because that resolution succeeded.
pub async fn add_bank_account(
    State(state): State<AppState>,
    Json(body): Json<AddBankAccountRequest>,
) -> Result<impl IntoResponse, AppError> {
    if body.account_number.trim().is_empty() || body.bank_code.trim().is_empty() {
        return Err(AppError::Validation(
            "account_number and bank_code are required".to_string(),
        ));
    }

    let resolved = state
        .gateway
        .paystack
        .resolve_account(&body.account_number, &body.bank_code)
        .await?;

    let now = Utc::now();
    let account = BankAccount {
        id: Uuid::new_v4(),
        user_id: body.user_id,
        account_name: resolved.account_name,
        account_number: body.account_number,
        bank_code: body.bank_code,
        bank_name: body.bank_name,
        is_verified: true,
        created_at: now,
        updated_at: now,
    };
    let account = queries::insert_bank_account(&state.db, &account).await?;

    Ok((StatusCode::CREATED, Json(account)))
}

pub async fn list_bank_accounts(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let accounts = queries::list_bank_accounts(&state.db, user_id).await?;
    Ok(Json(accounts))
}

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::queries;
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn get_wallet(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let wallet = queries::get_wallet_by_user(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("wallet for user {}", user_id)))?;

    Ok(Json(wallet))
}

pub async fn list_wallet_transactions(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(params): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let wallet = queries::get_wallet_by_user(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("wallet for user {}", user_id)))?;

    let limit = params.limit.unwrap_or(20).clamp(1, 100);
    let offset = params.offset.unwrap_or(0).max(0);
    let entries = queries::list_wallet_transactions(&state.db, wallet.id, limit, offset).await?;

    Ok(Json(entries))
}

/// Admin-only: recomputes the balance from the ledger and reports drift.
pub async fn audit_wallet(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let audit = state.reconciliation.audit_wallet(user_id).await?;
    Ok(Json(audit))
}

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::AppError;
use crate::services::sessions::BookingRequest;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct BookSessionRequest {
    pub client_id: Uuid,
    pub counselor_id: Uuid,
    pub client_email: String,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub price: BigDecimal,
    pub currency: String,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RescheduleRequest {
    pub scheduled_at: DateTime<Utc>,
}

pub async fn book_session(
    State(state): State<AppState>,
    Json(body): Json<BookSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (session, checkout) = state
        .sessions
        .book(BookingRequest {
            client_id: body.client_id,
            counselor_id: body.counselor_id,
            client_email: body.client_email,
            scheduled_at: body.scheduled_at,
            duration_minutes: body.duration_minutes,
            price: body.price,
            currency: body.currency,
            notes: body.notes,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "session": session, "checkout": checkout })),
    ))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.sessions.get(id).await?;
    Ok(Json(session))
}

pub async fn complete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.sessions.complete(id).await?;
    Ok(Json(session))
}

pub async fn cancel_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.sessions.cancel(id).await?;
    Ok(Json(session))
}

pub async fn reschedule_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<RescheduleRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.sessions.reschedule(id, body.scheduled_at).await?;
    Ok(Json(session))
}

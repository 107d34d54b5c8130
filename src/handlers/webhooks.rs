//! Provider webhook endpoints.
//!
//! Both handlers take the raw request bytes: the signature covers the exact
//! byte stream, so nothing may parse the body before verification. A bad
//! signature is a terminal 401 with no side effects; replays and events for
//! already-settled records return 200 so the provider stops retrying.

use axum::{body::Bytes, extract::State, http::HeaderMap, response::IntoResponse, Json};
use serde_json::json;

use crate::error::AppError;
use crate::gateway::paystack::{ChargeData, PaystackEvent, TransferData};
use crate::gateway::stripe::StripeEvent;
use crate::AppState;

pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("missing stripe-signature header".to_string()))?;

    state
        .gateway
        .stripe
        .verify_signature(&body, signature)
        .map_err(|_| AppError::Unauthorized("invalid webhook signature".to_string()))?;

    let event: StripeEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("malformed event payload: {}", e)))?;

    match event.event_type.as_str() {
        "checkout.session.completed" => {
            state.reconciliation.apply_stripe_event(&event).await?;
        }
        other => tracing::info!(event_type = other, "unhandled stripe event"),
    }

    Ok(Json(json!({ "received": true })))
}

pub async fn paystack_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let signature = headers
        .get("x-paystack-signature")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("missing x-paystack-signature header".to_string()))?;

    state
        .gateway
        .paystack
        .verify_webhook_signature(&body, signature)
        .map_err(|_| AppError::Unauthorized("invalid webhook signature".to_string()))?;

    let event: PaystackEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("malformed event payload: {}", e)))?;

    match event.event.as_str() {
        "charge.success" => {
            let charge: ChargeData = serde_json::from_value(event.data.clone())
                .map_err(|e| AppError::Validation(format!("malformed charge data: {}", e)))?;
            state.reconciliation.apply_paystack_charge(&charge).await?;
        }
        "transfer.success" | "transfer.failed" | "transfer.reversed" => {
            let transfer: TransferData = serde_json::from_value(event.data.clone())
                .map_err(|e| AppError::Validation(format!("malformed transfer data: {}", e)))?;
            state
                .withdrawals
                .handle_transfer_event(&event.event, &transfer)
                .await?;
        }
        other => tracing::info!(event = other, "unhandled paystack event"),
    }

    Ok(Json(json!({ "status": "success" })))
}

pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod middleware;
pub mod money;
pub mod services;
pub mod startup;
pub mod utils;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::gateway::PaymentGateway;
use crate::services::notifier::Notifier;
use crate::services::reconciliation::ReconciliationService;
use crate::services::sessions::SessionService;
use crate::services::withdrawals::WithdrawalService;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub config: Config,
    pub gateway: PaymentGateway,
    pub sessions: SessionService,
    pub reconciliation: ReconciliationService,
    pub withdrawals: WithdrawalService,
    pub notifier: Notifier,
}

pub fn create_app(state: AppState) -> Router {
    let cors = match &state.config.cors_allowed_origins {
        Some(raw) => {
            let origins: Vec<axum::http::HeaderValue> = raw
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    };

    let admin = Router::new()
        .route("/wallets/:user_id/audit", get(handlers::wallets::audit_wallet))
        .layer(axum_middleware::from_fn_with_state(
            state.config.clone(),
            middleware::auth::admin_auth,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/sessions", post(handlers::sessions::book_session))
        .route("/sessions/:id", get(handlers::sessions::get_session))
        .route("/sessions/:id/complete", post(handlers::sessions::complete_session))
        .route("/sessions/:id/cancel", post(handlers::sessions::cancel_session))
        .route("/sessions/:id/reschedule", post(handlers::sessions::reschedule_session))
        .route("/wallets/:user_id", get(handlers::wallets::get_wallet))
        .route(
            "/wallets/:user_id/transactions",
            get(handlers::wallets::list_wallet_transactions),
        )
        .route("/withdrawals", post(handlers::withdrawals::request_withdrawal))
        .route("/withdrawals/:id", get(handlers::withdrawals::get_withdrawal))
        .route("/bank-accounts", post(handlers::withdrawals::add_bank_account))
        .route("/bank-accounts/:user_id", get(handlers::withdrawals::list_bank_accounts))
        .route("/payments/stripe/webhook", post(handlers::webhooks::stripe_webhook))
        .route("/payments/paystack/webhook", post(handlers::webhooks::paystack_webhook))
        .route("/ws", get(handlers::ws::ws_handler))
        .nest("/admin", admin)
        .layer(axum_middleware::from_fn(
            middleware::request_logger::request_logger_middleware,
        ))
        .layer(cors)
        .with_state(state)
}

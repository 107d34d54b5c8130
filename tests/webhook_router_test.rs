//! Webhook endpoints exercised through the assembled router: signature
//! verification happens before any parsing or state change. Skips cleanly
//! when DATABASE_URL is not set.

use std::path::Path;
use std::str::FromStr;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use bigdecimal::BigDecimal;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha512;
use sqlx::migrate::Migrator;
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

use counselpay::config::Config;
use counselpay::db::models::{Currency, Session};
use counselpay::db::queries;
use counselpay::gateway::{PaymentGateway, PaystackClient, StripeClient};
use counselpay::services::notifier::Notifier;
use counselpay::services::reconciliation::ReconciliationService;
use counselpay::services::sessions::SessionService;
use counselpay::services::video::VideoRoomClient;
use counselpay::services::withdrawals::WithdrawalService;
use counselpay::{create_app, AppState};

const PAYSTACK_SECRET: &str = "sk_test_webhook";

async fn test_pool() -> Option<PgPool> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping");
        return None;
    };
    let pool = PgPool::connect(&url).await.ok()?;
    Migrator::new(Path::new("./migrations"))
        .await
        .ok()?
        .run(&pool)
        .await
        .ok()?;
    Some(pool)
}

fn test_config() -> Config {
    Config {
        server_port: 3000,
        database_url: "unused-in-tests".to_string(),
        redis_url: "redis://127.0.0.1:6379".to_string(),
        stripe_secret_key: "sk_test".to_string(),
        stripe_webhook_secret: "whsec_test".to_string(),
        stripe_base_url: "http://127.0.0.1:9".to_string(),
        paystack_secret_key: PAYSTACK_SECRET.to_string(),
        paystack_base_url: "http://127.0.0.1:9".to_string(),
        video_api_url: "http://127.0.0.1:9".to_string(),
        video_api_key: "none".to_string(),
        checkout_success_url: "https://app.test/ok".to_string(),
        checkout_cancel_url: "https://app.test/cancel".to_string(),
        platform_fee_rate: BigDecimal::from_str("0.10").unwrap(),
        session_expiry_hours: 24,
        admin_api_key: "admin-secret".to_string(),
        cors_allowed_origins: None,
    }
}

fn test_state(pool: PgPool) -> AppState {
    let config = test_config();
    let stripe = StripeClient::new(
        config.stripe_base_url.clone(),
        config.stripe_secret_key.clone(),
        config.stripe_webhook_secret.clone(),
    );
    let paystack = PaystackClient::new(
        config.paystack_base_url.clone(),
        config.paystack_secret_key.clone(),
    );
    let gateway = PaymentGateway::new(stripe, paystack.clone());
    let video = VideoRoomClient::new(config.video_api_url.clone(), config.video_api_key.clone());
    let notifier = Notifier::new(&config.redis_url).unwrap();

    AppState {
        db: pool.clone(),
        config: config.clone(),
        gateway: gateway.clone(),
        sessions: SessionService::new(
            pool.clone(),
            gateway,
            config.checkout_success_url.clone(),
            config.checkout_cancel_url.clone(),
        ),
        reconciliation: ReconciliationService::new(
            pool.clone(),
            config.platform_fee_rate.clone(),
            video,
            notifier.clone(),
        ),
        withdrawals: WithdrawalService::new(pool, paystack, notifier.clone()),
        notifier,
    }
}

fn sign_paystack(payload: &[u8]) -> String {
    let mut mac = Hmac::<Sha512>::new_from_slice(PAYSTACK_SECRET.as_bytes()).unwrap();
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

async fn booked_ngn_session(pool: &PgPool) -> Session {
    let session = Session::new(
        Uuid::new_v4(),
        Uuid::new_v4(),
        Utc::now() + chrono::Duration::days(1),
        60,
        BigDecimal::from_str("5000").unwrap(),
        Currency::Ngn,
        None,
    );
    let session = queries::insert_session(pool, &session).await.unwrap();
    let reference = session.id.simple().to_string();
    queries::set_checkout_refs(pool, session.id, None, Some(&reference))
        .await
        .unwrap()
        .unwrap()
}

fn charge_body(reference: &str) -> Vec<u8> {
    format!(
        r#"{{"event":"charge.success","data":{{"id":99,"reference":"{}","amount":500000}}}}"#,
        reference
    )
    .into_bytes()
}

#[tokio::test]
async fn test_signed_charge_webhook_marks_session_paid() {
    let Some(pool) = test_pool().await else { return };
    let session = booked_ngn_session(&pool).await;
    let body = charge_body(session.payment_reference.as_deref().unwrap());
    let signature = sign_paystack(&body);

    let response = create_app(test_state(pool.clone()))
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/payments/paystack/webhook")
                .header("x-paystack-signature", signature)
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let updated = queries::get_session(&pool, session.id).await.unwrap().unwrap();
    assert_eq!(updated.status, "paid");

    let wallet = queries::get_wallet_by_user(&pool, session.counselor_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(wallet.balance, BigDecimal::from_str("4500.00").unwrap());
}

#[tokio::test]
async fn test_tampered_body_is_rejected_without_side_effects() {
    let Some(pool) = test_pool().await else { return };
    let session = booked_ngn_session(&pool).await;
    let body = charge_body(session.payment_reference.as_deref().unwrap());
    let signature = sign_paystack(&body);

    let mut tampered = body.clone();
    let last = tampered.len() - 10;
    tampered[last] ^= 0x01;

    let response = create_app(test_state(pool.clone()))
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/payments/paystack/webhook")
                .header("x-paystack-signature", signature)
                .header("content-type", "application/json")
                .body(Body::from(tampered))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let unchanged = queries::get_session(&pool, session.id).await.unwrap().unwrap();
    assert_eq!(unchanged.status, "pending_payment");
    assert!(queries::get_wallet_by_user(&pool, session.counselor_id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_missing_stripe_signature_header_rejected() {
    let Some(pool) = test_pool().await else { return };

    let response = create_app(test_state(pool))
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/payments/stripe/webhook")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"id":"evt_1","type":"checkout.session.completed"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_paystack_event_acknowledged() {
    let Some(pool) = test_pool().await else { return };

    let body = br#"{"event":"subscription.create","data":{}}"#.to_vec();
    let signature = sign_paystack(&body);

    let response = create_app(test_state(pool))
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/payments/paystack/webhook")
                .header("x-paystack-signature", signature)
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_wallet_audit_requires_admin_key() {
    let Some(pool) = test_pool().await else { return };

    let response = create_app(test_state(pool))
        .oneshot(
            Request::builder()
                .uri(format!("/admin/wallets/{}/audit", Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

use crate::config::Config;

/// Bearer-key gate for operational endpoints (wallet audit).
pub async fn admin_auth(
    State(config): State<Config>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    match auth_header {
        Some(auth) if auth == format!("Bearer {}", config.admin_api_key) => Ok(next.run(req).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request as HttpRequest, middleware::from_fn_with_state, routing::get, Router};
    use bigdecimal::BigDecimal;
    use std::str::FromStr;
    use tower::ServiceExt;

    fn test_config() -> Config {
        Config {
            server_port: 3000,
            database_url: "postgres://localhost/test".to_string(),
            redis_url: "redis://localhost:6379".to_string(),
            stripe_secret_key: "sk_test".to_string(),
            stripe_webhook_secret: "whsec_test".to_string(),
            stripe_base_url: "https://api.stripe.com".to_string(),
            paystack_secret_key: "sk_paystack".to_string(),
            paystack_base_url: "https://api.paystack.co".to_string(),
            video_api_url: "https://api.video.test".to_string(),
            video_api_key: "video-key".to_string(),
            checkout_success_url: "https://app.test/ok".to_string(),
            checkout_cancel_url: "https://app.test/cancel".to_string(),
            platform_fee_rate: BigDecimal::from_str("0.10").unwrap(),
            session_expiry_hours: 24,
            admin_api_key: "admin-secret".to_string(),
            cors_allowed_origins: None,
        }
    }

    fn app() -> Router {
        Router::new()
            .route("/audit", get(|| async { "ok" }))
            .layer(from_fn_with_state(test_config(), admin_auth))
    }

    #[tokio::test]
    async fn test_valid_bearer_key_passes() {
        let response = app()
            .oneshot(
                HttpRequest::builder()
                    .uri("/audit")
                    .header("Authorization", "Bearer admin-secret")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_header_rejected() {
        let response = app()
            .oneshot(HttpRequest::builder().uri("/audit").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_wrong_key_rejected() {
        let response = app()
            .oneshot(
                HttpRequest::builder()
                    .uri("/audit")
                    .header("Authorization", "Bearer nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}

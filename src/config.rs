use std::env;

use bigdecimal::BigDecimal;
use dotenvy::dotenv;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub redis_url: String,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub stripe_base_url: String,
    pub paystack_secret_key: String,
    pub paystack_base_url: String,
    pub video_api_url: String,
    pub video_api_key: String,
    pub checkout_success_url: String,
    pub checkout_cancel_url: String,
    pub platform_fee_rate: BigDecimal,
    pub session_expiry_hours: i64,
    pub admin_api_key: String,
    pub cors_allowed_origins: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        let platform_fee_rate = env::var("PLATFORM_FEE_RATE")
            .unwrap_or_else(|_| "0.10".to_string())
            .parse::<BigDecimal>()
            .map_err(|e| anyhow::anyhow!("PLATFORM_FEE_RATE is not a decimal: {}", e))?;
        if platform_fee_rate < BigDecimal::from(0) || platform_fee_rate >= BigDecimal::from(1) {
            anyhow::bail!("PLATFORM_FEE_RATE must be in [0, 1)");
        }

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            database_url: env::var("DATABASE_URL")?,
            redis_url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            stripe_secret_key: env::var("STRIPE_SECRET_KEY")?,
            stripe_webhook_secret: env::var("STRIPE_WEBHOOK_SECRET")?,
            stripe_base_url: env::var("STRIPE_BASE_URL")
                .unwrap_or_else(|_| "https://api.stripe.com".to_string()),
            paystack_secret_key: env::var("PAYSTACK_SECRET_KEY")?,
            paystack_base_url: env::var("PAYSTACK_BASE_URL")
                .unwrap_or_else(|_| "https://api.paystack.co".to_string()),
            video_api_url: env::var("VIDEO_API_URL")?,
            video_api_key: env::var("VIDEO_API_KEY")?,
            checkout_success_url: env::var("CHECKOUT_SUCCESS_URL")?,
            checkout_cancel_url: env::var("CHECKOUT_CANCEL_URL")?,
            platform_fee_rate,
            session_expiry_hours: env::var("SESSION_EXPIRY_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()?,
            admin_api_key: env::var("ADMIN_API_KEY")?,
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS").ok(),
        })
    }
}

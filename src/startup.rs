use crate::config::Config;
use anyhow::{Context, Result};
use sqlx::PgPool;

pub struct ValidationReport {
    pub environment: bool,
    pub database: bool,
    pub redis: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.environment && self.database && self.redis
    }

    pub fn print(&self) {
        println!("\n=== Startup Validation Report ===");
        println!("Environment Variables: {}", status(self.environment));
        println!("Database Connectivity: {}", status(self.database));
        println!("Redis Connectivity:    {}", status(self.redis));

        if !self.errors.is_empty() {
            println!("\nErrors:");
            for error in &self.errors {
                println!("  - {}", error);
            }
        }

        println!(
            "\nOverall Status: {}",
            if self.is_valid() { "PASS" } else { "FAIL" }
        );
        println!("=================================\n");
    }
}

fn status(ok: bool) -> &'static str {
    if ok {
        "OK"
    } else {
        "FAIL"
    }
}

pub async fn validate_environment(config: &Config, pool: &PgPool) -> Result<ValidationReport> {
    let mut report = ValidationReport {
        environment: true,
        database: true,
        redis: true,
        errors: Vec::new(),
    };

    if let Err(e) = validate_env_vars(config) {
        report.environment = false;
        report.errors.push(format!("Environment: {}", e));
    }

    if let Err(e) = validate_database(pool).await {
        report.database = false;
        report.errors.push(format!("Database: {}", e));
    }

    if let Err(e) = validate_redis(&config.redis_url).await {
        report.redis = false;
        report.errors.push(format!("Redis: {}", e));
    }

    Ok(report)
}

fn validate_env_vars(config: &Config) -> Result<()> {
    if config.database_url.is_empty() {
        anyhow::bail!("DATABASE_URL is empty");
    }
    if config.stripe_secret_key.is_empty() || config.stripe_webhook_secret.is_empty() {
        anyhow::bail!("Stripe credentials are empty");
    }
    if config.paystack_secret_key.is_empty() {
        anyhow::bail!("PAYSTACK_SECRET_KEY is empty");
    }
    if config.server_port == 0 {
        anyhow::bail!("SERVER_PORT must be greater than 0");
    }

    url::Url::parse(&config.stripe_base_url).context("STRIPE_BASE_URL is not a valid URL")?;
    url::Url::parse(&config.paystack_base_url).context("PAYSTACK_BASE_URL is not a valid URL")?;
    url::Url::parse(&config.video_api_url).context("VIDEO_API_URL is not a valid URL")?;
    url::Url::parse(&config.checkout_success_url).context("CHECKOUT_SUCCESS_URL is not a valid URL")?;
    url::Url::parse(&config.checkout_cancel_url).context("CHECKOUT_CANCEL_URL is not a valid URL")?;

    Ok(())
}

async fn validate_database(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .context("Failed to connect to database")?;

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .context("Failed to check migrations table")?;

    if applied == 0 {
        anyhow::bail!("No migrations applied");
    }

    Ok(())
}

async fn validate_redis(redis_url: &str) -> Result<()> {
    let client = redis::Client::open(redis_url).context("Invalid Redis URL")?;

    let mut conn = client
        .get_multiplexed_async_connection()
        .await
        .context("Failed to connect to Redis")?;

    redis::cmd("PING")
        .query_async::<_, String>(&mut conn)
        .await
        .context("Redis PING failed")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use std::str::FromStr;

    fn valid_config() -> Config {
        Config {
            server_port: 3000,
            database_url: "postgres://localhost:5432/counselpay".to_string(),
            redis_url: "redis://localhost:6379".to_string(),
            stripe_secret_key: "sk_test".to_string(),
            stripe_webhook_secret: "whsec_test".to_string(),
            stripe_base_url: "https://api.stripe.com".to_string(),
            paystack_secret_key: "sk_paystack".to_string(),
            paystack_base_url: "https://api.paystack.co".to_string(),
            video_api_url: "https://api.video.test/v1".to_string(),
            video_api_key: "video-key".to_string(),
            checkout_success_url: "https://app.test/payment/success".to_string(),
            checkout_cancel_url: "https://app.test/payment/canceled".to_string(),
            platform_fee_rate: BigDecimal::from_str("0.10").unwrap(),
            session_expiry_hours: 24,
            admin_api_key: "admin-secret".to_string(),
            cors_allowed_origins: None,
        }
    }

    #[test]
    fn test_validate_env_vars_ok() {
        assert!(validate_env_vars(&valid_config()).is_ok());
    }

    #[test]
    fn test_validate_env_vars_empty_database_url() {
        let mut config = valid_config();
        config.database_url = String::new();

        assert!(validate_env_vars(&config).is_err());
    }

    #[test]
    fn test_validate_env_vars_invalid_url() {
        let mut config = valid_config();
        config.paystack_base_url = "not-a-url".to_string();

        assert!(validate_env_vars(&config).is_err());
    }

    #[test]
    fn test_validate_env_vars_missing_gateway_secret() {
        let mut config = valid_config();
        config.paystack_secret_key = String::new();

        assert!(validate_env_vars(&config).is_err());
    }
}

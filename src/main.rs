use std::net::SocketAddr;
use std::path::Path;

use sqlx::migrate::Migrator;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use counselpay::config::Config;
use counselpay::gateway::{PaymentGateway, PaystackClient, StripeClient};
use counselpay::services::expiry;
use counselpay::services::notifier::Notifier;
use counselpay::services::reconciliation::ReconciliationService;
use counselpay::services::sessions::SessionService;
use counselpay::services::video::VideoRoomClient;
use counselpay::services::withdrawals::WithdrawalService;
use counselpay::{create_app, db, startup, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let pool = db::create_pool(&config).await?;

    let migrator = Migrator::new(Path::new("./migrations")).await?;
    migrator.run(&pool).await?;
    tracing::info!("Database migrations completed");

    let report = startup::validate_environment(&config, &pool).await?;
    report.print();
    if !report.is_valid() {
        anyhow::bail!("startup validation failed");
    }

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
    let notifier = Notifier::new(&config.redis_url)?;

    let reconciliation = ReconciliationService::new(
        pool.clone(),
        config.platform_fee_rate.clone(),
        video,
        notifier.clone(),
    );
    let withdrawals = WithdrawalService::new(pool.clone(), paystack, notifier.clone());
    let sessions = SessionService::new(
        pool.clone(),
        gateway.clone(),
        config.checkout_success_url.clone(),
        config.checkout_cancel_url.clone(),
    );

    tokio::spawn(expiry::run_expiry_reaper(
        pool.clone(),
        config.session_expiry_hours,
    ));

    let state = AppState {
        db: pool,
        config: config.clone(),
        gateway,
        sessions,
        reconciliation,
        withdrawals,
        notifier,
    };
    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

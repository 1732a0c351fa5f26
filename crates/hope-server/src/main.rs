mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use hope_api::analytics::{AnalyticsSink, PostHogSink, TracingAnalytics};
use hope_api::mailer::{LogMailer, Mailer, ResendMailer};
use hope_api::payments::{PaymentsProvider, StripeClient, UnconfiguredPayments};
use hope_api::state::{AppState, AppStateInner};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hope=debug,tower_http=debug".into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {}", e);
            eprintln!("       Set it in your .env file and restart.");
            std::process::exit(1);
        }
    };

    let db = hope_db::Database::open(&config.db_path)?;

    let payments: Arc<dyn PaymentsProvider> = match config.stripe_secret_key.clone() {
        Some(key) => Arc::new(StripeClient::new(key)),
        None => {
            warn!("STRIPE_SECRET_KEY not set, checkout is disabled");
            Arc::new(UnconfiguredPayments)
        }
    };
    if config.settings.stripe_webhook_secret.is_none() {
        warn!("STRIPE_WEBHOOK_SECRET not set, webhooks will be rejected");
    }
    let analytics: Arc<dyn AnalyticsSink> = match config.posthog_api_key.clone() {
        Some(key) => Arc::new(PostHogSink::new(key, &config.posthog_host)),
        None => Arc::new(TracingAnalytics),
    };
    let mailer: Arc<dyn Mailer> = match config.resend_api_key.clone() {
        Some(key) => Arc::new(ResendMailer::new(key, config.mail_from.clone())),
        None => {
            warn!("RESEND_API_KEY not set, magic links are only logged");
            Arc::new(LogMailer)
        }
    };

    let state: AppState = Arc::new(AppStateInner {
        db,
        settings: config.settings.clone(),
        payments,
        analytics,
        mailer,
    });

    let app = hope_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Tree of Hope server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

use anyhow::Result;
use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use flowlink::{
    config::Config,
    handlers::*,
    middleware::{rate_limit_middleware, same_origin_middleware, RateBucket, RateLimiter},
    services::{
        HttpTxVerifier, LogEmailSender, LogFiatSettlement, ScheduledPaymentDriver,
        TransferService, WebhookConfig, WebhookService,
    },
    store::{
        memory::{
            MemoryScheduledPaymentStore, MemorySettingsStore, MemoryTransferStore,
            MemoryWebhookLogStore,
        },
        redis_counter::{RedisRateLimitStore, UnavailableRateLimitStore},
        RateLimitStore, SettingsStore,
    },
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Arc::new(Config::from_env()?);

    tracing::info!("Starting flowlink API v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {:?}", config.environment);

    // Rate-limit counters live in redis; if it is down at startup the gate
    // fails open rather than blocking the deploy.
    let (redis, rate_store): (Option<Arc<RedisRateLimitStore>>, Arc<dyn RateLimitStore>) =
        match RedisRateLimitStore::connect(&config.redis_url).await {
            Ok(store) => {
                let store = Arc::new(store);
                (Some(store.clone()), store)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Redis unreachable, rate limiting degraded to fail-open");
                (None, Arc::new(UnavailableRateLimitStore))
            }
        };
    let limiter = Arc::new(RateLimiter::new(rate_store));

    // Persistence ports
    let transfer_store = Arc::new(MemoryTransferStore::new());
    let scheduled_store = Arc::new(MemoryScheduledPaymentStore::new());
    let webhook_logs = Arc::new(MemoryWebhookLogStore::new());
    let settings_store: Arc<dyn SettingsStore> = Arc::new(MemorySettingsStore::new());

    // Services
    let webhooks = Arc::new(WebhookService::new(
        WebhookConfig {
            max_retries: config.webhook_max_retries,
            timeout: Duration::from_millis(config.webhook_timeout_ms),
            base_delay: Duration::from_millis(config.webhook_retry_delay_ms),
        },
        webhook_logs,
        settings_store.clone(),
    )?);
    let transfers = Arc::new(TransferService::new(
        transfer_store,
        webhooks.clone(),
        Arc::new(LogEmailSender),
        Arc::new(LogFiatSettlement),
        &config.base_url,
        config.transfer_ttl_secs,
    ));
    let scheduler = Arc::new(ScheduledPaymentDriver::new(
        scheduled_store,
        transfers.clone(),
    ));
    let verifier = Arc::new(HttpTxVerifier::new(&config.verifier_url)?);

    let state = AppState {
        config: config.clone(),
        transfers,
        scheduler,
        webhooks,
        settings: settings_store,
        verifier,
        redis,
    };

    macro_rules! bucket {
        ($bucket:expr) => {
            axum_middleware::from_fn({
                let limiter = limiter.clone();
                move |req, next| {
                    let limiter = limiter.clone();
                    async move { rate_limit_middleware(limiter, $bucket, req, next).await }
                }
            })
        };
    }

    // Routes grouped by rate bucket
    let payment_routes = Router::new()
        .route("/transfers", post(create_transfer).get(list_transfers))
        .route("/transfers/claim", post(claim_transfer))
        .route("/transfers/send-email", post(send_claim_email))
        .route(
            "/scheduled-payments",
            get(list_scheduled_payments).post(create_scheduled_payment),
        )
        .route("/payments/verify", post(verify_payment))
        .layer(bucket!(RateBucket::Payments))
        .layer(axum_middleware::from_fn(same_origin_middleware));

    let link_routes = Router::new()
        .route("/transfers/:claim_token", get(get_transfer))
        .layer(bucket!(RateBucket::PaymentLinks));

    let webhook_routes = Router::new()
        .route("/webhook", post(receive_webhook))
        .layer(bucket!(RateBucket::Webhooks));

    let settings_routes = Router::new()
        .route(
            "/settings/webhook",
            get(get_webhook_settings).post(update_webhook_settings),
        )
        .layer(bucket!(RateBucket::Settings))
        .layer(axum_middleware::from_fn(same_origin_middleware));

    let cron_routes = Router::new()
        .route("/cron/process-scheduled", get(process_scheduled))
        .layer(bucket!(RateBucket::General));

    let app = Router::new()
        .merge(payment_routes)
        .merge(link_routes)
        .merge(webhook_routes)
        .merge(settings_routes)
        .merge(cron_routes)
        .route("/health", get(health_check))
        // Global middleware. The same-origin gate sits on the browser-facing
        // route groups above; inbound webhooks authenticate by signature and
        // partners do not send an Origin header.
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(false)),
        )
        .layer(CorsLayer::permissive())
        .with_state(state);

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to listen for ctrl+c");
    tracing::info!("Shutting down gracefully...");
}

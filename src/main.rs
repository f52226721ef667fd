use anyhow::Result;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tollgate::{
    config::Config,
    handlers::*,
    services::*,
};
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
    let config = Config::from_env()?;

    tracing::info!("Starting tollgate v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {:?}", config.environment);

    let ledger: Arc<dyn Ledger> = Arc::new(RpcLedger::new(&config.ledger_rpc_url));

    // A wallet that cannot be loaded or created is fatal to payment
    // capability only; unpriced dispatch keeps running.
    let wallet = match WalletService::new(
        ledger.clone(),
        &config.key_path,
        config.funding_threshold,
        config.funding_amount,
    )
    .await
    {
        Ok(wallet) => Some(Arc::new(wallet)),
        Err(e) => {
            tracing::error!("Wallet unavailable, priced tools disabled: {:#}", e);
            None
        }
    };

    let negotiator = wallet.as_ref().map(|wallet| {
        Arc::new(PaymentNegotiator::new(
            ledger.clone(),
            wallet.address().to_string(),
            config.payment_ttl_secs,
            config.settle_poll_attempts,
            config.settle_poll_interval_ms,
        ))
    });

    let registry = Arc::new(EndpointRegistry::new());
    let stats = Arc::new(GatewayStats::new());
    let dispatcher = Arc::new(ToolDispatcher::new(
        registry.clone(),
        negotiator.clone(),
        wallet.clone(),
        stats.clone(),
    ));

    let state = AppState {
        registry,
        dispatcher,
        negotiator,
        wallet: wallet.clone(),
        stats,
    };

    // Build router
    let app = Router::new()
        // Management surface
        .route("/health", get(health_check))
        .route("/stats", get(get_stats))
        .route("/wallet", get(wallet_info))
        .route(
            "/api/endpoints",
            post(register_endpoint).get(list_endpoints),
        )
        .route("/api/endpoints/:name", delete(remove_endpoint))
        // Tool surface
        .route("/tools", get(list_tools))
        .route("/tools/:name", post(call_tool))
        .with_state(state)
        // Global middleware
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        )
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Gateway listening on http://{}", addr);
    tracing::info!("Health check: http://{}/health", addr);
    tracing::info!("Tool listing: http://{}/tools", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Teardown: one last status poll so submitted transfers reach a
    // terminal state in the history before exit.
    if let Some(wallet) = &wallet {
        let updated = wallet.refresh_pending().await;
        tracing::info!(updated, "Flushed pending transaction polls");
    }

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to listen for ctrl+c");
    tracing::info!("Shutting down gracefully...");
}

use anyhow::{Context, Result};
use donation_verifier::{
    chains::{CardanoReader, ChainRegistry, EvmReader, SolanaReader, StellarReader},
    config::Config,
    handlers::{router, AppState},
    services::*,
};
use std::sync::Arc;
use std::time::Instant;
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

    tracing::info!("Starting donation verifier v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {:?}", config.environment);

    let http = reqwest::Client::builder()
        .timeout(config.rpc_timeout())
        .build()
        .context("Failed to build HTTP client")?;

    // Chain readers
    let networks = Arc::new(config.network_table());
    let registry = ChainRegistry::new(networks.clone())
        .with_reader(Arc::new(EvmReader::new(networks.clone())))
        .with_reader(Arc::new(SolanaReader::new(networks.clone(), http.clone())))
        .with_reader(Arc::new(StellarReader::new(networks.clone(), http.clone())))
        .with_reader(Arc::new(CardanoReader::new(
            networks.clone(),
            http.clone(),
            config.blockfrost_project_id.clone(),
        )));

    // Services
    let safe = Arc::new(SafeTransactionService::new(
        http.clone(),
        config.safe_service_url.clone(),
    ));
    let cache = Arc::new(
        CacheService::new(config.redis_url.as_deref(), config.price_cache_ttl()).await,
    );
    let prices = Arc::new(PriceService::new(
        http.clone(),
        &config.coingecko_api_url,
        cache.clone(),
    ));
    let verifier = Arc::new(VerificationService::new(
        Arc::new(registry),
        safe,
        config.settings(),
    ));

    let state = AppState {
        verifier,
        prices,
        cache,
        networks,
        environment: config.environment,
        redis_configured: config.redis_url.is_some(),
        started_at: Instant::now(),
    };

    let app = router(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        )
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("Health check: http://{}/api/health", addr);

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

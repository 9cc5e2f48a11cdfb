use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use soar_aggregator::api::{build_router, AppState};
use soar_aggregator::cache::Cache;
use soar_aggregator::config::AppConfig;
use soar_aggregator::elevation::ElevationClient;
use soar_aggregator::flight_service::FlightService;
use soar_aggregator::metrics::{init_metrics, initialize_metrics};
use soar_aggregator::rate_limiter::RateLimiter;
use soar_aggregator::route_client::RouteClient;
use soar_aggregator::session::SessionStore;
use soar_aggregator::token_manager::TokenManager;
use soar_aggregator::upstream::UpstreamFlightClient;
use soar_aggregator::ws::WsHub;
use tracing_subscriber::EnvFilter;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "soar-aggregator", about = "Flight-tracking backend aggregation service.")]
struct Args {
    /// Overrides the PORT environment variable.
    #[arg(long)]
    port: Option<u16>,
    /// Overrides the INTERFACE environment variable.
    #[arg(long)]
    interface: Option<String>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("soar_aggregator=info,tower_http=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .event_format(soar_aggregator::log_format::TargetFirstFormat)
        .init();
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let args = Args::parse();
    let mut config = AppConfig::from_env();
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(interface) = args.interface {
        config.interface = interface;
    }
    let config = Arc::new(config);

    // Held for the lifetime of `main` so the Sentry transport keeps flushing;
    // dropping it early would silently stop error reporting.
    let _sentry_guard = config.sentry_dsn.as_ref().map(|dsn| {
        sentry::init((
            dsn.as_str(),
            sentry::ClientOptions {
                release: sentry::release_name!(),
                traces_sample_rate: 0.0,
                ..Default::default()
            },
        ))
    });

    let prometheus_handle = init_metrics();
    initialize_metrics();

    if config.byok_enabled && !config.has_opensky_credentials() {
        tracing::warn!("BYOK is enabled but no server-wide OpenSky credentials are configured; anonymous requests will have no default token manager");
    }

    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .expect("failed to build HTTP client");

    let cache = Cache::new(10_000);
    let sessions = SessionStore::new(format!("{}/oauth/token", config.opensky_api_url), http.clone());
    let rate_limiter = RateLimiter::new();

    let anonymous_token_manager = if config.has_opensky_credentials() {
        Some(TokenManager::new(
            config.opensky_client_id.clone().unwrap(),
            config.opensky_client_secret.clone().unwrap(),
            format!("{}/oauth/token", config.opensky_api_url),
            http.clone(),
        ))
    } else {
        None
    };

    let upstream = UpstreamFlightClient::new(
        http.clone(),
        config.opensky_api_url.clone(),
        config.opensky_tracks_api_url.clone(),
    );

    let flight_service = Arc::new(FlightService::new(
        cache.clone(),
        sessions.clone(),
        anonymous_token_manager.clone(),
        upstream,
    ));

    let route_client = Arc::new(RouteClient::new(
        http.clone(),
        config.aviationstack_api_url.clone(),
        config.aviationstack_api_key.clone().unwrap_or_default(),
        cache.clone(),
    ));

    let elevation_client = Arc::new(ElevationClient::new(http.clone(), config.elevation_api_url.clone(), cache.clone()));

    let ws_hub = WsHub::new();
    ws_hub.clone().spawn_broadcast_loop(flight_service.clone());

    let state = Arc::new(AppState {
        config: config.clone(),
        cache,
        sessions,
        rate_limiter,
        flight_service,
        route_client,
        elevation_client,
        anonymous_token_manager,
        ws_hub,
        started_at: Instant::now(),
    });

    let router = build_router(state).merge(soar_aggregator::metrics::metrics_router(prometheus_handle));

    let addr = format!("{}:{}", config.interface, config.port);
    tracing::info!(%addr, "starting soar-aggregator");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {addr}: {e}"));

    axum::serve(listener, router)
        .await
        .expect("server failed");
}

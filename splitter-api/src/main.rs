use std::{net::SocketAddr, sync::Arc};
use anyhow::Context;
use axum::{http::{HeaderValue, Method, header}, Router};
use tower_http::{cors::CorsLayer, compression::CompressionLayer};
use tracing_subscriber::EnvFilter;
use sqlx::postgres::PgPoolOptions;

use splitter_api::auth::{AuthService, JwtAuthService};
use splitter_api::config::AppConfig;
use splitter_api::handlers::{app, AppState};
use splitter_api::places::PlaceCatalog;
use splitter_api::repository::RepositoryFactory;
use splitter_api::uploads::AvatarStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,axum=info,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).compact().init();

    let cfg = match AppConfig::from_env() { Ok(c) => c, Err(e) => { eprintln!("Configuration error: {}", e); std::process::exit(1);} };

    // Postgres when configured and reachable; in-memory otherwise
    let pool = match cfg.database.url.as_deref() {
        None => {
            tracing::warn!("DATABASE_URL not set; starting with in-memory store");
            None
        }
        Some(url) => match PgPoolOptions::new().max_connections(cfg.database.max_connections).connect(url).await {
            Ok(p) => {
                if let Err(e) = sqlx::migrate!("./migrations").run(&p).await {
                    tracing::error!(error = %e, "migrations failed; continuing with in-memory store");
                    None
                } else {
                    Some(p)
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Postgres not available; starting with in-memory store");
                None
            }
        },
    };

    let repos = match pool {
        Some(ref p) => RepositoryFactory::postgres(p.clone()),
        None => RepositoryFactory::in_memory(),
    };

    let auth = Arc::new(JwtAuthService::new(&cfg.jwt.secret)) as Arc<dyn AuthService>;
    let places = PlaceCatalog::load(cfg.places_file.as_deref()).context("loading places catalog")?;

    let state = AppState {
        repos,
        auth,
        avatars: AvatarStore::new(cfg.uploads.dir.clone()),
        places: Arc::new(places),
        default_currency: cfg.default_currency.clone(),
        max_page_size: cfg.max_page_size,
        max_upload_bytes: cfg.uploads.max_bytes,
        db: pool,
    };

    let router: Router = app(state)
        .layer(CompressionLayer::new())
        .layer(cors_layer(&cfg.server.cors_origins));

    let addr: SocketAddr = format!("{}:{}", cfg.server.host, cfg.server.port).parse().context("invalid HOST/PORT")?;
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(v) => Some(v),
            Err(_) => { tracing::warn!(origin = %o, "ignoring invalid CORS origin"); None }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

async fn shutdown_signal() {
    let ctrl_c = async { tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler"); };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate()).expect("failed to install signal handler");
        term.recv().await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();
    tokio::select! { _ = ctrl_c => {}, _ = terminate => {}, }
}

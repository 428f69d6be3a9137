pub mod analytics;
pub mod auth;
pub mod config;
pub mod error;
pub mod images;
pub mod models;
pub mod notify;
pub mod routes;
pub mod storage;

use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::analytics::StatsCache;
use crate::auth::SessionStore;
use crate::config::Config;
use crate::images::{ChartCapture, CloudinaryClient, ImageHost};
use crate::notify::TradeUpdateBus;
use crate::storage::MemStorage;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<MemStorage>,
    pub sessions: Arc<SessionStore>,
    pub bus: Arc<TradeUpdateBus>,
    pub stats_cache: Arc<StatsCache>,
    pub image_host: Option<Arc<dyn ImageHost>>,
    pub capture: Arc<ChartCapture>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let image_host: Option<Arc<dyn ImageHost>> =
            CloudinaryClient::from_config(&config).map(|c| Arc::new(c) as Arc<dyn ImageHost>);
        if image_host.is_none() {
            log::warn!("Cloudinary credentials missing; images will be stored locally only");
        }
        let capture = Arc::new(ChartCapture::new(
            config.chart_service_url.clone(),
            config.upload_dir.clone(),
            config.upload_timeout_secs,
        ));

        AppState {
            storage: Arc::new(MemStorage::new()),
            sessions: Arc::new(SessionStore::new()),
            bus: Arc::new(TradeUpdateBus::new()),
            stats_cache: Arc::new(StatsCache::new()),
            image_host,
            capture,
            config: Arc::new(config),
        }
    }

    pub fn image_host(&self) -> Option<&dyn ImageHost> {
        self.image_host.as_deref()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        ApiResponse { success: true, data }
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

pub fn router(state: AppState) -> Router {
    let uploads = ServeDir::new(state.config.upload_dir.clone());

    Router::new()
        .route("/health", get(health))
        .merge(routes::auth_routes())
        .merge(routes::user_routes())
        .merge(routes::trade_routes())
        .merge(routes::strategy_routes())
        .merge(routes::goal_routes())
        .merge(routes::analytics_routes())
        .merge(routes::image_routes(state.clone()))
        .nest_service("/uploads", uploads)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run_server() -> anyhow::Result<()> {
    let config = Config::from_env();
    let bind_addr = config.bind_addr.clone();
    if config.dev_mode {
        log::warn!("dev mode: upload authentication disabled");
    }

    let state = AppState::new(config);

    // The stats cache tracks trade writes through the bus, the server-side
    // counterpart of the dashboard widgets refreshing on notification.
    let mut events = state.bus.subscribe();
    let cache = state.stats_cache.clone();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => cache.invalidate(&event.user_id),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!("trade event stream lagged, {} events skipped", skipped);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let app = router(state);

    log::info!("listening on {}", bind_addr);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

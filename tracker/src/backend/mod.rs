//! # Backend Module
//!
//! Contains all non-UI logic of the tracker:
//!
//! - **config**: YAML configuration and environment overrides
//! - **domain**: slot schedule, entry services, overview and export
//! - **storage**: local and remote store adapters
//! - **io**: the REST API
//!
//! ```text
//! Web client / CLI
//!     ↓
//! IO Layer (REST handlers)
//!     ↓
//! Domain Layer (services, slot schedule)
//!     ↓
//! Storage Layer (local key-value store or remote tables)
//! ```

pub mod config;
pub mod domain;
pub mod io;
pub mod storage;

use anyhow::Result;
use axum::{
    http::{HeaderValue, Method},
    Router,
};
use log::{info, warn};
use shared::StorageInfo;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::backend::config::{AppConfig, ServerConfig};
use crate::backend::domain::{
    Clock, DiaryService, ExportService, FeedingService, OverviewService, SlotSchedule,
    SystemClock, ToiletService,
};
use crate::backend::storage::{open_stores, StoreSet};

/// Application state shared by every handler and CLI command
#[derive(Clone)]
pub struct AppState {
    pub feeding_service: FeedingService,
    pub toilet_service: ToiletService,
    pub diary_service: DiaryService,
    pub overview_service: OverviewService,
    pub export_service: ExportService,
    pub storage_info: StorageInfo,
}

/// Open the configured store and build all services on the system clock
pub async fn initialize_backend(config: &AppConfig) -> Result<AppState> {
    initialize_backend_with_clock(config, Arc::new(SystemClock)).await
}

pub async fn initialize_backend_with_clock(config: &AppConfig, clock: Arc<dyn Clock>) -> Result<AppState> {
    info!("Setting up storage");
    let stores = open_stores(config, clock.clone()).await?;
    build_state(config, stores, clock)
}

/// Wire services on top of already opened stores
pub fn build_state(config: &AppConfig, stores: StoreSet, clock: Arc<dyn Clock>) -> Result<AppState> {
    info!("Setting up domain services");
    let zone = config.zone()?;
    let schedule = SlotSchedule::from_config(&config.schedule);

    let feeding_service = FeedingService::new(stores.feedings.clone(), schedule, zone, clock.clone());
    let toilet_service = ToiletService::new(stores.toilet.clone(), clock.clone());
    let diary_service = DiaryService::new(stores.diary.clone());
    let overview_service = OverviewService::new(
        feeding_service.clone(),
        toilet_service.clone(),
        diary_service.clone(),
        zone,
        clock.clone(),
    );
    let export_service = ExportService::new(
        stores.feedings,
        stores.toilet,
        stores.diary,
        config.export.clone(),
        zone,
        clock,
    );

    Ok(AppState {
        feeding_service,
        toilet_service,
        diary_service,
        overview_service,
        export_service,
        storage_info: stores.info,
    })
}

/// Create the Axum router with all routes configured
pub fn create_router(app_state: AppState, server: &ServerConfig) -> Router {
    let origin = match server.cors_origin.parse::<HeaderValue>() {
        Ok(origin) => AllowOrigin::exact(origin),
        Err(_) => {
            warn!("Invalid CORS origin '{}', allowing any origin", server.cors_origin);
            AllowOrigin::any()
        }
    };
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any);

    let api_routes = Router::new()
        .merge(io::rest::overview_apis::router())
        .nest("/feedings", io::rest::feeding_apis::router())
        .nest("/toilet", io::rest::toilet_apis::router())
        .nest("/diary", io::rest::diary_apis::router())
        .nest("/export", io::rest::export_apis::router());

    let mut router = Router::new().nest("/api", api_routes);
    if let Some(static_dir) = &server.static_dir {
        info!("Serving static files from {}", static_dir.display());
        router = router.fallback_service(ServeDir::new(static_dir));
    }

    router.layer(cors).with_state(app_state)
}

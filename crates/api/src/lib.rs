//! Drowsiness Monitor API Server
//!
//! Serves the latest drowsiness flag and an annotated MJPEG stream while a
//! dedicated acquisition thread feeds frames through the driver monitoring
//! module.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::State,
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use camera_capture::{CameraConfig, CameraError, FrameSource};
use dms::{DmsConfig, DmsError, DmsModule, FrameClassifier, ManifestClassifier};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::{Deserialize, Serialize};
use status_publisher::{FrameFeed, StatusPublisher};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

pub mod config;
pub mod pipeline;
pub mod routes;
pub mod simulation;

use config::{AppConfig, ConfigError, LoggingConfig, ServerConfig};
use pipeline::{Pipeline, PipelineError, PipelineReport};

/// Server error types
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("DMS error: {0}")]
    Dms(#[from] DmsError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid allowed origin {0:?}")]
    InvalidOrigin(String),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

/// Application state shared across handlers
pub struct AppState {
    /// Latest drowsiness status
    pub status: StatusPublisher,
    /// Latest annotated frame
    pub frames: FrameFeed,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: Instant,
    /// Prometheus exporter, when installed
    pub metrics: Option<PrometheusHandle>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Create new application state
    pub fn new(status: StatusPublisher, frames: FrameFeed) -> Self {
        Self {
            status,
            frames,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: Instant::now(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: Option<PrometheusHandle>) -> Self {
        self.metrics = handle;
        self
    }
}

/// Health response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub pipeline: PipelineHealth,
}

/// Acquisition loop health
#[derive(Debug, Serialize, Deserialize)]
pub struct PipelineHealth {
    pub running: bool,
    pub last_frame_sequence: Option<u32>,
    pub is_drowsy: bool,
}

/// Create the application router.
///
/// The status and health routes accept the configured front-end origins;
/// the video stream accepts any origin.
pub fn create_router(state: SharedState, server: &ServerConfig) -> Result<Router, ServerError> {
    let origins = server.origin_headers().map_err(ServerError::InvalidOrigin)?;

    let status_routes = Router::new()
        .route("/drowsy_status", get(routes::status::get_drowsy_status))
        .route("/api/v1/health", get(health_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods([Method::GET]),
        );

    let stream_routes = Router::new()
        .route("/video_feed", get(routes::stream::video_feed))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods([Method::GET]));

    Ok(Router::new()
        .merge(status_routes)
        .merge(stream_routes)
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// Health check handler
async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let status = state.status.read();
    let running = !state.frames.is_closed();

    Json(HealthResponse {
        status: if running { "healthy" } else { "degraded" }.to_string(),
        timestamp,
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        pipeline: PipelineHealth {
            running,
            last_frame_sequence: status.frame_sequence,
            is_drowsy: status.is_drowsy,
        },
    })
}

/// Prometheus scrape endpoint
async fn metrics_handler(State(state): State<SharedState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics exporter not installed".to_string()),
    }
}

/// Initialize logging
pub fn init_logging(config: &LoggingConfig) -> Result<(), ServerError> {
    let level = config
        .level
        .parse::<Level>()
        .map_err(|e| ServerError::Logging(format!("{:?}: {}", config.level, e)))?;

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    let result = if config.json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    result.map_err(|e| ServerError::Logging(e.to_string()))
}

/// Install the global Prometheus recorder
pub fn install_metrics() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Metrics exporter unavailable: {}", e);
            None
        }
    }
}

/// Classifier for the configured DMS.
///
/// With a manifest, recorded observations are replayed. Without one no eye
/// detector is available and every frame reports no face.
pub fn build_classifier(config: &DmsConfig) -> Result<Box<dyn FrameClassifier>, DmsError> {
    match &config.manifest_path {
        Some(path) => Ok(Box::new(ManifestClassifier::from_path(path)?)),
        None => {
            warn!("No detector configured; every frame will report no face");
            Ok(Box::new(ManifestClassifier::empty()))
        }
    }
}

/// Open the configured source and read one frame; returns its resolution
pub fn check_source(config: &CameraConfig) -> Result<(u32, u32), CameraError> {
    let mut source = camera_capture::open_source(config)?;
    let frame = source.read_frame()?;
    info!(
        "Source {:?} ({:?}) delivered frame {}x{}",
        config.device, config.kind, frame.width, frame.height
    );
    Ok((frame.width, frame.height))
}

/// Open the configured source, then serve on `listener` until `shutdown`
/// resolves.
///
/// Failing to open the frame source is fatal.
pub async fn serve<F>(
    listener: TcpListener,
    config: &AppConfig,
    metrics: Option<PrometheusHandle>,
    shutdown: F,
) -> Result<PipelineReport, ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let source = camera_capture::open_source(&config.camera)?;
    serve_source(listener, source, config, metrics, shutdown).await
}

/// Start acquisition from `source` and serve until `shutdown` resolves.
///
/// Everything that can fail before serving is set up before the acquisition
/// thread starts. Once serving ends, for any reason, the acquisition loop is
/// asked to stop and every open stream ends.
pub async fn serve_source<S, F>(
    listener: TcpListener,
    source: S,
    config: &AppConfig,
    metrics: Option<PrometheusHandle>,
    shutdown: F,
) -> Result<PipelineReport, ServerError>
where
    S: FrameSource + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let classifier = build_classifier(&config.dms)?;
    let dms = DmsModule::new(config.dms.clone(), classifier)?;

    let status = StatusPublisher::new();
    let frames = FrameFeed::new();
    let state = Arc::new(AppState::new(status.clone(), frames.clone()).with_metrics(metrics));
    let app = create_router(state, &config.server)?;
    let addr = listener.local_addr()?;

    let acquisition = Pipeline::new(
        source,
        dms,
        status,
        frames.clone(),
        config.pipeline.clone(),
    )
    .spawn()?;

    let stop = acquisition.stop_signal();
    let graceful = {
        let stop = stop.clone();
        let frames = frames.clone();
        async move {
            shutdown.await;
            info!("Shutting down");
            stop.raise();
            frames.close();
        }
    };

    info!("Serving on {}", addr);
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(graceful)
        .await;
    if let Err(e) = &served {
        warn!("Server stopped with error: {}", e);
    }
    stop.raise();
    frames.close();

    let report = tokio::task::spawn_blocking(move || acquisition.join())
        .await
        .map_err(|_| PipelineError::Panicked)??;
    served?;
    Ok(report)
}

/// Run the server until Ctrl-C
pub async fn run_server(config: &AppConfig) -> Result<PipelineReport, ServerError> {
    let listener = TcpListener::bind(&config.server.addr).await?;
    let metrics = install_metrics();

    serve(listener, config, metrics, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await
}

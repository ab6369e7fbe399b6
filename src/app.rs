#![cfg(feature = "web")]
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::chart::ChartSpec;
use crate::config::ServerConfig;
use crate::dashboard::{self, DashboardState};
use crate::graph::{self, GraphOptions};
use crate::loader::{self, UploadedFile};

/// Read-only settings shared by the handlers; no upload is ever kept here
pub struct AppState {
    config: ServerConfig,
}

#[derive(Deserialize)]
struct ChartQuery {
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Serialize)]
struct ErrorResponse {
    status: String,
    message: String,
}

/// Multipart field that carries the uploaded file
const FILE_FIELD: &str = "file";

pub fn router(config: ServerConfig) -> Router {
    let static_dir = config.static_dir.clone();
    let body_limit = config.max_upload_bytes;
    let app_state = Arc::new(AppState { config });

    Router::new()
        .route("/", get(serve_dashboard))
        .route("/api/dashboard", get(get_dashboard))
        .route("/api/upload", post(upload_contents))
        .route("/api/upload/file", post(upload_file))
        .route("/api/chart", post(render_chart))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(app_state)
}

pub async fn run(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config.addr;
    let app = router(config);

    let listener = TcpListener::bind(addr).await?;
    log::info!("Listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn serve_dashboard() -> Html<&'static str> {
    Html(include_str!("./static/dashboard.html"))
}

async fn get_dashboard() -> Json<DashboardState> {
    Json(dashboard::render(None))
}

async fn upload_contents(Json(upload): Json<UploadedFile>) -> Json<DashboardState> {
    log::info!("Upload received: {}", upload.filename);

    let state = tokio::task::spawn_blocking(move || dashboard::render(Some(&upload)))
        .await
        .unwrap_or_else(|e| {
            log::error!("Dashboard task failed: {}", e);
            DashboardState::error()
        });

    Json(state)
}

async fn upload_file(mut multipart: Multipart) -> Json<DashboardState> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                log::warn!("Malformed multipart upload: {}", e);
                return Json(DashboardState::error());
            }
        };

        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        match field.bytes().await {
            Ok(bytes) => upload = Some((filename, bytes.to_vec())),
            Err(e) => {
                log::warn!("Failed to read uploaded file {}: {}", filename, e);
                return Json(DashboardState::error());
            }
        }
    }

    let Some((filename, bytes)) = upload else {
        return Json(DashboardState::empty());
    };
    log::info!("Upload received: {} ({} bytes)", filename, bytes.len());

    let state = tokio::task::spawn_blocking(move || {
        DashboardState::from_ingestion(loader::parse_file(&filename, &bytes))
    })
    .await
    .unwrap_or_else(|e| {
        log::error!("Dashboard task failed: {}", e);
        DashboardState::error()
    });

    Json(state)
}

async fn render_chart(
    Query(params): Query<ChartQuery>,
    State(state): State<Arc<AppState>>,
    Json(spec): Json<ChartSpec>,
) -> Response {
    let options = GraphOptions {
        width: params.width.unwrap_or(state.config.chart_width),
        height: params.height.unwrap_or(state.config.chart_height),
    };

    let result = tokio::task::spawn_blocking(move || {
        graph::render_png(&spec, &options).map_err(|e| e.to_string())
    })
    .await
    .unwrap_or_else(|e| Err(e.to_string()));

    match result {
        Ok(png) => ([(header::CONTENT_TYPE, "image/png")], png).into_response(),
        Err(message) => {
            log::error!("Chart rendering failed: {}", message);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    status: "error".to_string(),
                    message,
                }),
            )
                .into_response()
        }
    }
}

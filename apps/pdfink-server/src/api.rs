//! API handlers for the pdfink server
//!
//! Provides REST endpoints for:
//! - Page inspection (sizes for client previews)
//! - Export (annotations flattened onto the uploaded PDF)

use std::time::{Duration, Instant};

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use pdfink_core::{
    inspect, Compositor, ExportCommand, PageInfo, PdfInkError, ProcessMetrics, ProcessResult,
    RenderReport, EXPORT_FILE_NAME, EXPORT_MIME_TYPE,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ServerError;
use crate::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Handler: GET /health
pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "pdfink-server",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Run CPU-bound PDF work on a blocking thread, bounded by the render timeout
pub async fn run_blocking<T, F>(timeout_ms: u64, work: F) -> Result<T, ServerError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, PdfInkError> + Send + 'static,
{
    let result = tokio::time::timeout(
        Duration::from_millis(timeout_ms),
        tokio::task::spawn_blocking(work),
    )
    .await;

    match result {
        Ok(Ok(output)) => output.map_err(ServerError::from),
        Ok(Err(join_error)) => Err(ServerError::Internal(format!(
            "Render task panicked: {}",
            join_error
        ))),
        Err(_timeout) => Err(ServerError::Timeout(timeout_ms)),
    }
}

/// Query parameters for POST /api/inspect
#[derive(Deserialize)]
pub struct InspectParams {
    /// Preview zoom; defaults to the configured zoom
    pub zoom: Option<f64>,
}

/// Inspect response
#[derive(Serialize, Deserialize)]
pub struct InspectResponse {
    pub success: bool,
    pub page_count: usize,
    pub pages: Vec<PageInfo>,
}

/// Handler: POST /api/inspect
pub async fn handle_inspect(
    State(state): State<AppState>,
    Query(params): Query<InspectParams>,
    body: Bytes,
) -> Result<Json<InspectResponse>, ServerError> {
    if body.is_empty() {
        return Err(ServerError::EmptyInput);
    }
    let zoom = params.zoom.unwrap_or(state.render.preview_zoom);
    if !zoom.is_finite() || zoom <= 0.0 {
        return Err(ServerError::InvalidRequest(format!(
            "zoom must be a positive number (got {})",
            zoom
        )));
    }

    info!("Inspect request: {} bytes, zoom={}", body.len(), zoom);
    let pages = run_blocking(state.timeout_ms, move || inspect(&body, zoom)).await?;

    Ok(Json(InspectResponse {
        success: true,
        page_count: pages.len(),
        pages,
    }))
}

async fn render_command(
    state: &AppState,
    command: Result<Json<ExportCommand>, JsonRejection>,
) -> Result<(RenderReport, ProcessMetrics), ServerError> {
    let Json(command) = command.map_err(|e| ServerError::InvalidRequest(e.body_text()))?;
    if command.pdf.is_empty() {
        return Err(ServerError::EmptyInput);
    }

    let options = command.render_options(&state.render);
    let input_size = command.pdf.len();
    info!(
        "Export request: {} bytes, {} annotations, fault_policy={:?}",
        input_size,
        command.annotations.len(),
        options.fault_policy
    );

    let start = Instant::now();
    let report = run_blocking(state.timeout_ms, move || {
        Compositor::new(options).render_with_report(&command.pdf, &command.annotations)
    })
    .await?;
    let elapsed_ms = start.elapsed().as_millis() as u64;

    debug!(
        "Export finished in {}ms: {} drawn, {} skipped",
        elapsed_ms, report.drawn, report.skipped
    );
    let metrics = ProcessMetrics::from_report(input_size, &report, elapsed_ms);
    Ok((report, metrics))
}

/// Handler: POST /api/export
///
/// Responds with the rendered PDF as a download.
pub async fn handle_export(
    State(state): State<AppState>,
    command: Result<Json<ExportCommand>, JsonRejection>,
) -> Result<Response, ServerError> {
    let (report, _) = render_command(&state, command).await?;

    Ok((
        [
            (header::CONTENT_TYPE, EXPORT_MIME_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", EXPORT_FILE_NAME),
            ),
        ],
        report.pdf,
    )
        .into_response())
}

/// Handler: POST /api/export/json
///
/// Same as /api/export, but the PDF comes back base64-encoded with metrics.
pub async fn handle_export_json(
    State(state): State<AppState>,
    command: Result<Json<ExportCommand>, JsonRejection>,
) -> Result<Json<ProcessResult>, ServerError> {
    let (report, metrics) = render_command(&state, command).await?;
    Ok(Json(ProcessResult::ok(&report.pdf, metrics)))
}

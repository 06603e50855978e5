use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::get,
    Router,
};
use tracing::{info, instrument, warn};

use super::report::build_report;
use crate::{auth::extractors::AuthUser, error::AppError, state::AppState};

pub fn report_routes() -> Router<AppState> {
    Router::new().route("/grievances/:code/report", get(download_report))
}

/// GET /grievances/:code/report → PDF attachment.
#[instrument(skip(state, caller))]
pub async fn download_report(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let Some(grievance) = state.grievances.find_by_code(&code).await? else {
        warn!(%code, "report for unknown grievance");
        return Err(AppError::NotFound("Grievance not found".into()));
    };

    let report = build_report(state.ai.as_ref(), &grievance).await;
    let filename = report.filename();
    let pdf = tokio::task::spawn_blocking(move || report.render_pdf())
        .await
        .map_err(anyhow::Error::from)??;

    info!(%code, caller = %caller.id, bytes = pdf.len(), "grievance report generated");
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        pdf,
    ))
}

//! Axum route handler for PDF generation.

use axum::{
    extract::State,
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{IntoResponse, Response},
    Json,
};
use anyhow::Context;
use serde_json::Value;
use tracing::info;

use crate::errors::AppError;
use crate::render::latex::render_resume_value;
use crate::state::AppState;

/// Filename the browser sees for every generated résumé.
const DOWNLOAD_NAME: &str = "document.pdf";

/// POST /generate_pdf
///
/// Renders the résumé payload to LaTeX, compiles it, and streams the PDF back.
/// The compiled file is deleted once its bytes are in the response.
pub async fn handle_generate_pdf(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<Response, AppError> {
    let latex = render_resume_value(payload)?;
    info!(bytes = latex.len(), "LaTeX content generated");

    let artifact = state.pipeline.compile(&latex).await?;
    let pdf = artifact
        .into_bytes()
        .await
        .context("Failed to read compiled PDF")?;

    Ok((
        [
            (CONTENT_TYPE, "application/pdf".to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{DOWNLOAD_NAME}\""),
            ),
        ],
        pdf,
    )
        .into_response())
}

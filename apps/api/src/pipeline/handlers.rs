use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::models::Record;
use crate::pipeline::error::PipelineError;
use crate::pipeline::reference::ReferenceDocument;
use crate::pipeline::{AssessmentPipeline, RunReport};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AssessRequest {
    pub records: Vec<Record>,
    pub resume_text: String,
}

/// POST /api/v1/assessments
pub async fn handle_assess(
    State(state): State<AppState>,
    Json(req): Json<AssessRequest>,
) -> Result<Json<RunReport>, AppError> {
    validate_records(&req.records)?;
    let reference = ReferenceDocument::new(&req.resume_text, state.estimator.as_ref())?;
    let report = run_assessment(&state, req.records, &reference).await?;
    Ok(Json(report))
}

/// POST /api/v1/assessments/upload
///
/// Multipart fields: `resume` (PDF bytes) and `records` (JSON array).
pub async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<RunReport>, AppError> {
    let mut resume: Option<Vec<u8>> = None;
    let mut records: Option<Vec<Record>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "resume" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Could not read resume: {e}")))?;
                resume = Some(bytes.to_vec());
            }
            "records" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Could not read records: {e}")))?;
                let parsed = serde_json::from_str(&text).map_err(|e| {
                    AppError::Validation(format!("records must be a JSON array of postings: {e}"))
                })?;
                records = Some(parsed);
            }
            other => warn!("Ignoring unexpected multipart field '{other}'"),
        }
    }

    let resume = resume.ok_or_else(|| AppError::Validation("Missing 'resume' field".into()))?;
    let records = records.ok_or_else(|| AppError::Validation("Missing 'records' field".into()))?;
    validate_records(&records)?;

    // pdf-extract is CPU-bound and may panic on hostile input
    let estimator = Arc::clone(&state.estimator);
    let reference = tokio::task::spawn_blocking(move || {
        ReferenceDocument::from_pdf(&resume, estimator.as_ref())
    })
    .await
    .map_err(|e| PipelineError::UnreadableReference(e.to_string()))??;

    let report = run_assessment(&state, records, &reference).await?;
    Ok(Json(report))
}

/// POST /api/v1/assessments/cancel
///
/// Takes effect before the next batch is dispatched.
pub async fn handle_cancel(State(state): State<AppState>) -> StatusCode {
    info!("Cancellation requested");
    state.control.cancel();
    StatusCode::ACCEPTED
}

fn validate_records(records: &[Record]) -> Result<(), AppError> {
    match records.iter().position(|r| r.key().is_none()) {
        Some(index) => Err(AppError::Validation(format!(
            "Record {index} is missing a non-empty job_url"
        ))),
        None => Ok(()),
    }
}

async fn run_assessment(
    state: &AppState,
    records: Vec<Record>,
    reference: &ReferenceDocument,
) -> Result<RunReport, AppError> {
    let _gate = state
        .run_gate
        .try_lock()
        .map_err(|_| AppError::Conflict("An assessment run is already in progress".into()))?;

    let pipeline = AssessmentPipeline::new(
        &state.pipeline,
        state.estimator.as_ref(),
        state.llm.as_ref(),
        state.control.clone(),
    );
    Ok(pipeline.run(records, reference).await?)
}

//! Border service (granicna policija).

use super::ApiResult;
use crate::api::AppState;
use crate::api::auth::Caller;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use euprava_core::border::{CrossingRequest, Note};
use euprava_core::{Crossing, CriminalReport, RecordId, SuspiciousPerson};

/// POST /prelaz/new - Record a crossing after the registry approves the documents.
pub async fn record_crossing(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<CrossingRequest>,
) -> ApiResult<(StatusCode, Json<Crossing>)> {
    request.validate()?;
    let verdict = state.gateway.validate(&caller.ctx, &request.claim()).await?;
    if let Err(rejection) = &verdict {
        tracing::info!(
            event = "crossing_rejected",
            reason = %rejection,
            "Traveller documents refused"
        );
    }
    let crossing = state.border.record_crossing(request, verdict, Utc::now())?;
    Ok((StatusCode::CREATED, Json(crossing)))
}

/// GET /prelaz/all
pub async fn list_crossings(State(state): State<AppState>) -> ApiResult<Json<Vec<Crossing>>> {
    Ok(Json(state.border.crossings()?))
}

/// PUT /sumnjivo-lice/new/{crossingId}
pub async fn flag_suspicious(
    State(state): State<AppState>,
    Path(crossing_id): Path<RecordId>,
    Json(note): Json<Note>,
) -> ApiResult<(StatusCode, Json<SuspiciousPerson>)> {
    let flag = state.border.flag_suspicious(crossing_id, note)?;
    Ok((StatusCode::CREATED, Json(flag)))
}

/// GET /sumnjivo-lice/all
pub async fn list_suspicious(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<SuspiciousPerson>>> {
    Ok(Json(state.border.suspicious_persons()?))
}

/// PUT /krivicna-prijava/new/{crossingId}
pub async fn file_criminal_report(
    State(state): State<AppState>,
    Path(crossing_id): Path<RecordId>,
    Json(note): Json<Note>,
) -> ApiResult<(StatusCode, Json<CriminalReport>)> {
    let report = state
        .border
        .file_criminal_report(crossing_id, note, Utc::now())?;
    Ok((StatusCode::CREATED, Json(report)))
}

/// GET /krivicna-prijava/all
pub async fn list_criminal_reports(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<CriminalReport>>> {
    Ok(Json(state.border.criminal_reports()?))
}

/// GET /krivicna-prijava/{id}
pub async fn get_criminal_report(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
) -> ApiResult<Json<CriminalReport>> {
    Ok(Json(state.border.criminal_report(id)?))
}

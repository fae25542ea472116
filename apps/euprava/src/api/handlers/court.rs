//! Court service (sud): cases, hearings and verdicts.

use super::ApiResult;
use crate::api::AppState;
use crate::api::auth::Caller;
use crate::workflow::feeds;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use euprava_core::court::{NewCase, NewHearing, NewVerdict};
use euprava_core::{Case, Hearing, RecordId, Verdict};

/// GET /predmeti
pub async fn list_cases(State(state): State<AppState>) -> ApiResult<Json<Vec<Case>>> {
    Ok(Json(state.court.cases()?))
}

/// GET /predmeti/{id}
pub async fn get_case(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
) -> ApiResult<Json<Case>> {
    Ok(Json(state.court.case(id)?))
}

/// POST /predmeti - Open a case from a judicial request supplied in the body.
pub async fn open_case(
    State(state): State<AppState>,
    caller: Caller,
    Json(new): Json<NewCase>,
) -> ApiResult<(StatusCode, Json<Case>)> {
    let judge_id = caller.claims()?.sub;
    let case = state.court.open_case(new, judge_id, Utc::now())?;
    Ok((StatusCode::CREATED, Json(case)))
}

/// POST /predmeti/zahtjevi - Open cases for judicial requests filed at the prosecution.
pub async fn open_cases_from_requests(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<(StatusCode, Json<Vec<Case>>)> {
    let judge_id = caller.claims()?.sub;
    let requests = feeds::judicial_requests(&state.upstream.prosecution, &caller.ctx).await?;
    let fetched = requests.len();
    let opened = state.court.open_cases_from(requests, judge_id, Utc::now())?;
    tracing::info!(fetched, opened = opened.len(), "Cases opened from judicial requests");
    Ok((StatusCode::CREATED, Json(opened)))
}

/// GET /termini
pub async fn list_hearings(State(state): State<AppState>) -> ApiResult<Json<Vec<Hearing>>> {
    Ok(Json(state.court.hearings()?))
}

/// GET /termini/{id}
pub async fn get_hearing(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
) -> ApiResult<Json<Hearing>> {
    Ok(Json(state.court.hearing(id)?))
}

/// POST /termini/{caseId}
pub async fn schedule_hearing(
    State(state): State<AppState>,
    Path(case_id): Path<RecordId>,
    Json(new): Json<NewHearing>,
) -> ApiResult<(StatusCode, Json<Hearing>)> {
    let hearing = state.court.schedule_hearing(case_id, new)?;
    Ok((StatusCode::CREATED, Json(hearing)))
}

/// GET /presude
pub async fn list_verdicts(State(state): State<AppState>) -> ApiResult<Json<Vec<Verdict>>> {
    Ok(Json(state.court.verdicts()?))
}

/// GET /presude/{id}
pub async fn get_verdict(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
) -> ApiResult<Json<Verdict>> {
    Ok(Json(state.court.verdict(id)?))
}

/// POST /presude/{hearingId}
pub async fn record_verdict(
    State(state): State<AppState>,
    caller: Caller,
    Path(hearing_id): Path<RecordId>,
    Json(new): Json<NewVerdict>,
) -> ApiResult<(StatusCode, Json<Verdict>)> {
    let judge_id = caller.claims()?.sub;
    let verdict = state
        .court
        .record_verdict(hearing_id, new, judge_id, Utc::now())?;
    Ok((StatusCode::CREATED, Json(verdict)))
}

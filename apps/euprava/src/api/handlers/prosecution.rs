//! Prosecution service (tuzilastvo): escalation, plea deals and channels.

use super::ApiResult;
use crate::api::AppState;
use crate::api::auth::Caller;
use crate::api::error::ApiError;
use crate::api::types::FiledResponse;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use euprava_core::channel::{NewChannel, NewMessage};
use euprava_core::escalation::{JudicialTerms, PleaTerms};
use euprava_core::{
    Channel, CriminalReport, JudicialRequest, Message, PleaDealRequest, RecordId, Role, Settlement,
};

// =============================================================================
// ESCALATION
// =============================================================================

/// POST /kreirajZahtevZaSudskiPostupak/{reportId}
pub async fn file_judicial_request(
    State(state): State<AppState>,
    caller: Caller,
    Path(report_id): Path<RecordId>,
    Json(terms): Json<JudicialTerms>,
) -> ApiResult<Json<FiledResponse<JudicialRequest>>> {
    let prosecutor_id = caller.claims()?.sub;
    let request = state
        .coordinator
        .file_judicial_request(&caller.ctx, report_id, prosecutor_id, terms)
        .await?;
    Ok(Json(FiledResponse {
        message: format!("judicial request filed for criminal report {}", report_id),
        request,
    }))
}

/// POST /kreirajZahtevZaSklapanjeSporazuma/{reportId}
pub async fn file_plea_deal_request(
    State(state): State<AppState>,
    caller: Caller,
    Path(report_id): Path<RecordId>,
    Json(terms): Json<PleaTerms>,
) -> ApiResult<Json<FiledResponse<PleaDealRequest>>> {
    let prosecutor_id = caller.claims()?.sub;
    let request = state
        .coordinator
        .file_plea_deal_request(&caller.ctx, report_id, prosecutor_id, terms)
        .await?;
    Ok(Json(FiledResponse {
        message: format!("plea-deal request filed for criminal report {}", report_id),
        request,
    }))
}

/// GET /krivicnePrijave - Criminal reports not yet escalated.
pub async fn list_unescalated(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<Json<Vec<CriminalReport>>> {
    Ok(Json(state.coordinator.list_unescalated(&caller.ctx).await?))
}

/// GET /dobaviZahteveZaSudskiPostupak
pub async fn list_judicial_requests(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<JudicialRequest>>> {
    Ok(Json(state.ledger.judicial_requests()?))
}

/// GET /dobaviZahteveZaSklapanjeSporazuma
pub async fn list_plea_deal_requests(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<PleaDealRequest>>> {
    Ok(Json(state.ledger.plea_deal_requests()?))
}

// =============================================================================
// PLEA DEALS
// =============================================================================

/// A citizen may only answer a plea deal filed against their own crossing.
async fn ensure_own_plea_request(
    state: &AppState,
    caller: &Caller,
    request_id: RecordId,
) -> Result<(), ApiError> {
    let claims = caller.claims()?;
    if claims.role != Role::Citizen {
        return Ok(());
    }
    let owns = state
        .coordinator
        .citizen_owns_plea_request(&caller.ctx, RecordId(claims.sub), request_id)
        .await?;
    if !owns {
        return Err(ApiError::forbidden(
            "citizens may only answer their own plea deals",
        ));
    }
    Ok(())
}

/// PUT /prihvatiZahtev/{id} - Accept a plea deal and settle it.
pub async fn accept_plea_deal(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<RecordId>,
) -> ApiResult<Json<Settlement>> {
    ensure_own_plea_request(&state, &caller, id).await?;
    let settlement = state.deals.accept(id, Utc::now())?;
    tracing::info!(plea_request = %id, settlement = %settlement.id, "Plea deal settled");
    Ok(Json(settlement))
}

/// PUT /odbijZahtev/{id} - Reject a plea deal; a judicial request takes its place.
pub async fn reject_plea_deal(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<RecordId>,
) -> ApiResult<Json<JudicialRequest>> {
    ensure_own_plea_request(&state, &caller, id).await?;
    let judicial = state.deals.reject(id, Utc::now())?;
    tracing::info!(plea_request = %id, judicial_request = %judicial.id, "Plea deal rejected");
    Ok(Json(judicial))
}

/// GET /dobaviSporazume
pub async fn list_settlements(State(state): State<AppState>) -> ApiResult<Json<Vec<Settlement>>> {
    Ok(Json(state.deals.settlements()?))
}

/// A citizen may only look at their own records.
fn ensure_own_records(caller: &Caller, citizen_id: RecordId) -> Result<(), ApiError> {
    let claims = caller.claims()?;
    if claims.role == Role::Citizen && claims.sub != citizen_id.value() {
        return Err(ApiError::forbidden("citizens may only view their own records"));
    }
    Ok(())
}

/// GET /gradjanin/zahteviZaSporazum/{userId}
pub async fn citizen_plea_requests(
    State(state): State<AppState>,
    caller: Caller,
    Path(citizen_id): Path<RecordId>,
) -> ApiResult<Json<Vec<PleaDealRequest>>> {
    ensure_own_records(&caller, citizen_id)?;
    Ok(Json(
        state
            .coordinator
            .plea_requests_for_citizen(&caller.ctx, citizen_id)
            .await?,
    ))
}

/// GET /gradjanin/sporazumi/{userId}
pub async fn citizen_settlements(
    State(state): State<AppState>,
    caller: Caller,
    Path(citizen_id): Path<RecordId>,
) -> ApiResult<Json<Vec<Settlement>>> {
    ensure_own_records(&caller, citizen_id)?;
    Ok(Json(
        state
            .coordinator
            .settlements_for_citizen(&caller.ctx, citizen_id)
            .await?,
    ))
}

// =============================================================================
// CHANNELS
// =============================================================================

/// POST /kanali
pub async fn create_channel(
    State(state): State<AppState>,
    Json(new): Json<NewChannel>,
) -> ApiResult<(StatusCode, Json<Channel>)> {
    let channel = state.channels.create_channel(new, Utc::now())?;
    Ok((StatusCode::CREATED, Json(channel)))
}

/// GET /kanali
pub async fn list_channels(State(state): State<AppState>) -> ApiResult<Json<Vec<Channel>>> {
    Ok(Json(state.channels.channels()?))
}

/// POST /kanali/{id}/poruke - The sender is the caller's role, never the body.
pub async fn post_message(
    State(state): State<AppState>,
    caller: Caller,
    Path(channel_id): Path<RecordId>,
    Json(new): Json<NewMessage>,
) -> ApiResult<(StatusCode, Json<Message>)> {
    let sender = caller.claims()?.role;
    let message = state
        .channels
        .post_message(channel_id, sender, new, Utc::now())?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// GET /kanali/{id}/poruke
pub async fn list_messages(
    State(state): State<AppState>,
    Path(channel_id): Path<RecordId>,
) -> ApiResult<Json<Vec<Message>>> {
    Ok(Json(state.channels.list_messages(channel_id)?))
}

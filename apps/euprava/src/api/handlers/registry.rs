//! Registry service (MUP).

use super::ApiResult;
use crate::api::AppState;
use crate::api::auth::Caller;
use crate::api::types::MessageResponse;
use crate::workflow::feeds::{self, JmbgResponse};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use euprava_core::registry::{
    DrivingLicenceRequest, IdentityCardRequest, NewCitizen, PassportRequest, SurveillanceSummary,
    VehicleRegistrationRequest,
};
use euprava_core::{Citizen, DocumentClaim, EupravaError, RecordId, SurveillanceOrder};

/// POST /kreirajKorisnika
pub async fn register_citizen(
    State(state): State<AppState>,
    Json(new): Json<NewCitizen>,
) -> ApiResult<(StatusCode, Json<Citizen>)> {
    let citizen = state.registry.register(new)?;
    Ok((StatusCode::CREATED, Json(citizen)))
}

/// GET /dobaviKorisnike
pub async fn list_citizens(State(state): State<AppState>) -> ApiResult<Json<Vec<Citizen>>> {
    Ok(Json(state.registry.citizens()?))
}

/// PUT /kreirajLicnuKartu/{id}
pub async fn issue_identity_card(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
    Json(request): Json<IdentityCardRequest>,
) -> ApiResult<(StatusCode, Json<Citizen>)> {
    let citizen = state.registry.issue_identity_card(
        id,
        request,
        Utc::now().date_naive(),
        &mut rand::thread_rng(),
    )?;
    Ok((StatusCode::CREATED, Json(citizen)))
}

/// PUT /kreirajPasos/{id}
pub async fn issue_passport(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
    Json(request): Json<PassportRequest>,
) -> ApiResult<(StatusCode, Json<Citizen>)> {
    let citizen = state.registry.issue_passport(
        id,
        request,
        Utc::now().date_naive(),
        &mut rand::thread_rng(),
    )?;
    Ok((StatusCode::CREATED, Json(citizen)))
}

/// PUT /kreirajVozackuDozvolu/{id}
pub async fn issue_driving_licence(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
    Json(request): Json<DrivingLicenceRequest>,
) -> ApiResult<(StatusCode, Json<Citizen>)> {
    let citizen = state
        .registry
        .issue_driving_licence(id, request, Utc::now().date_naive())?;
    Ok((StatusCode::CREATED, Json(citizen)))
}

/// PUT /kreirajSaobracajnuDozvolu/{id}
pub async fn issue_vehicle_registration(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
    Json(request): Json<VehicleRegistrationRequest>,
) -> ApiResult<(StatusCode, Json<Citizen>)> {
    let citizen = state
        .registry
        .issue_vehicle_registration(id, request, Utc::now().date_naive())?;
    Ok((StatusCode::CREATED, Json(citizen)))
}

/// GET /dobaviJmbgKorisnika/{id}
pub async fn citizen_jmbg(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
) -> ApiResult<Json<JmbgResponse>> {
    let jmbg = state.registry.jmbg_of(id)?;
    Ok(Json(JmbgResponse { jmbg }))
}

/// POST /validirajDokumente - 200 if the claim holds, 403 with the reason otherwise.
pub async fn validate_documents(
    State(state): State<AppState>,
    Json(claim): Json<DocumentClaim>,
) -> ApiResult<Response> {
    match state.registry.validate(&claim, Utc::now().date_naive())? {
        Ok(()) => Ok(Json(MessageResponse::new("documents are valid")).into_response()),
        Err(rejection) => Err(EupravaError::DocumentRejected(rejection).into()),
    }
}

/// POST /kreirajNalogZaPracenje - Open orders for travellers flagged at the border.
pub async fn open_surveillance_orders(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<(StatusCode, Json<SurveillanceSummary>)> {
    let suspects = feeds::suspicious_persons(&state.upstream.border, &caller.ctx).await?;
    let summary = state
        .registry
        .open_surveillance_orders(&suspects, Utc::now())?;
    tracing::info!(
        created = summary.created.len(),
        already_covered = summary.already_covered,
        unknown = summary.unknown,
        "Surveillance sweep finished"
    );
    Ok((StatusCode::CREATED, Json(summary)))
}

/// GET /dobaviNalogeZaPracenje
pub async fn list_surveillance_orders(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<SurveillanceOrder>>> {
    Ok(Json(state.registry.surveillance_orders()?))
}

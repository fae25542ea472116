//! Typed reads of peer endpoints.
//!
//! A 404 from the peer becomes `NotFound` for the requested record. Every
//! other failure keeps its client-error meaning (`Unavailable` for an open
//! breaker, a timeout or a 5xx, `UpstreamRejected` for other refusals).

use crate::client::{CallContext, ClientError, ResilientClient};
use euprava_core::{CriminalReport, EupravaError, JudicialRequest, RecordId, SuspiciousPerson};
use serde::{Deserialize, Serialize};

/// Body of `GET /dobaviJmbgKorisnika/{id}` on the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JmbgResponse {
    pub jmbg: String,
}

fn not_found_as(
    collection: &'static str,
    id: RecordId,
) -> impl FnOnce(ClientError) -> EupravaError {
    move |e| match e.status() {
        Some(404) => EupravaError::not_found(collection, id),
        _ => e.into(),
    }
}

/// One criminal report from the border service.
pub async fn criminal_report(
    border: &ResilientClient,
    ctx: &CallContext,
    id: RecordId,
) -> Result<CriminalReport, EupravaError> {
    border
        .get_json(ctx, &format!("/krivicna-prijava/{}", id))
        .await
        .map_err(not_found_as("criminal report", id))
}

/// Every criminal report on file at the border service.
pub async fn criminal_reports(
    border: &ResilientClient,
    ctx: &CallContext,
) -> Result<Vec<CriminalReport>, EupravaError> {
    Ok(border.get_json(ctx, "/krivicna-prijava/all").await?)
}

/// Every suspicious-person flag raised at the border.
pub async fn suspicious_persons(
    border: &ResilientClient,
    ctx: &CallContext,
) -> Result<Vec<SuspiciousPerson>, EupravaError> {
    Ok(border.get_json(ctx, "/sumnjivo-lice/all").await?)
}

/// Judicial requests on file at the prosecution.
pub async fn judicial_requests(
    prosecution: &ResilientClient,
    ctx: &CallContext,
) -> Result<Vec<JudicialRequest>, EupravaError> {
    Ok(prosecution
        .get_json(ctx, "/dobaviZahteveZaSudskiPostupak")
        .await?)
}

/// JMBG of a registered citizen. `NotFound` until an identity card is issued.
pub async fn citizen_jmbg(
    registry: &ResilientClient,
    ctx: &CallContext,
    citizen_id: RecordId,
) -> Result<String, EupravaError> {
    let response: JmbgResponse = registry
        .get_json(ctx, &format!("/dobaviJmbgKorisnika/{}", citizen_id))
        .await
        .map_err(not_found_as("JMBG of citizen", citizen_id))?;
    Ok(response.jmbg)
}

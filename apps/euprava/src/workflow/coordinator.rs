//! # Case Escalation Coordinator
//!
//! Files judicial and plea-deal requests against criminal reports held by the
//! border service.
//!
//! Filing a request:
//! 1. refuse early if the report is already escalated (no network call)
//! 2. fetch the report from the border service through the resilient client
//! 3. stop with `Cancelled` if the request deadline has passed
//! 4. store the request with a copy of the report; the ledger re-checks both
//!    tracks inside the write transaction, so a concurrent filing that won
//!    between steps 1 and 4 still surfaces as `AlreadyFiled` or `Conflict`

use crate::client::{CallContext, ResilientClient};
use crate::workflow::feeds;
use chrono::Utc;
use euprava_core::escalation::{JudicialTerms, PleaTerms};
use euprava_core::{
    CriminalReport, EupravaError, JudicialRequest, PleaDealRequest, PleaDeals, ProsecutionLedger,
    RecordId, Settlement, Track,
};

/// Prosecution-side orchestration over the ledger and two peers.
#[derive(Debug, Clone)]
pub struct CaseEscalationCoordinator {
    ledger: ProsecutionLedger,
    deals: PleaDeals,
    border: ResilientClient,
    registry: ResilientClient,
}

impl CaseEscalationCoordinator {
    #[must_use]
    pub fn new(
        ledger: ProsecutionLedger,
        deals: PleaDeals,
        border: ResilientClient,
        registry: ResilientClient,
    ) -> Self {
        Self {
            ledger,
            deals,
            border,
            registry,
        }
    }

    pub async fn file_judicial_request(
        &self,
        ctx: &CallContext,
        report_id: RecordId,
        prosecutor_id: u64,
        terms: JudicialTerms,
    ) -> Result<JudicialRequest, EupravaError> {
        let report = self.fetch_for_filing(ctx, report_id, Track::Judicial).await?;
        self.ledger
            .file_judicial_request(&report, prosecutor_id, terms, Utc::now())
            .inspect_err(|e| log_conflict(report_id, Track::Judicial, e))
    }

    pub async fn file_plea_deal_request(
        &self,
        ctx: &CallContext,
        report_id: RecordId,
        prosecutor_id: u64,
        terms: PleaTerms,
    ) -> Result<PleaDealRequest, EupravaError> {
        let report = self.fetch_for_filing(ctx, report_id, Track::PleaDeal).await?;
        self.ledger
            .file_plea_deal_request(&report, prosecutor_id, terms, Utc::now())
            .inspect_err(|e| log_conflict(report_id, Track::PleaDeal, e))
    }

    /// Criminal reports at the border service with no request filed yet.
    ///
    /// Duplicates in the upstream feed are returned once.
    pub async fn list_unescalated(
        &self,
        ctx: &CallContext,
    ) -> Result<Vec<CriminalReport>, EupravaError> {
        let reports = feeds::criminal_reports(&self.border, ctx).await?;
        self.ledger.unescalated(reports)
    }

    /// Plea-deal requests on file for a citizen account.
    pub async fn plea_requests_for_citizen(
        &self,
        ctx: &CallContext,
        citizen_id: RecordId,
    ) -> Result<Vec<PleaDealRequest>, EupravaError> {
        let jmbg = feeds::citizen_jmbg(&self.registry, ctx, citizen_id).await?;
        self.deals.for_citizen(&jmbg)
    }

    /// Settlements reached with a citizen account.
    pub async fn settlements_for_citizen(
        &self,
        ctx: &CallContext,
        citizen_id: RecordId,
    ) -> Result<Vec<Settlement>, EupravaError> {
        let jmbg = feeds::citizen_jmbg(&self.registry, ctx, citizen_id).await?;
        self.deals.settlements_for_citizen(&jmbg)
    }

    /// Whether a plea-deal request was filed against this citizen's crossing.
    ///
    /// A citizen without an identity card owns no requests.
    pub async fn citizen_owns_plea_request(
        &self,
        ctx: &CallContext,
        citizen_id: RecordId,
        request_id: RecordId,
    ) -> Result<bool, EupravaError> {
        let request = self.ledger.plea_deal_request(request_id)?;
        match feeds::citizen_jmbg(&self.registry, ctx, citizen_id).await {
            Ok(jmbg) => Ok(request.report.crossing.traveller_jmbg == jmbg),
            Err(EupravaError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn fetch_for_filing(
        &self,
        ctx: &CallContext,
        report_id: RecordId,
        track: Track,
    ) -> Result<CriminalReport, EupravaError> {
        self.ledger
            .ensure_can_file(report_id, track)
            .inspect_err(|e| log_conflict(report_id, track, e))?;

        let report = feeds::criminal_report(&self.border, ctx, report_id).await?;
        if ctx.is_expired() {
            return Err(EupravaError::Cancelled);
        }
        Ok(report)
    }
}

fn log_conflict(report_id: RecordId, track: Track, e: &EupravaError) {
    if e.is_conflict() {
        tracing::info!(
            event = "escalation_conflict",
            report_id = %report_id,
            track = ?track,
            reason = %e,
            "Escalation refused"
        );
    }
}

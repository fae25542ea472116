//! # Case Escalation Ledger
//!
//! Judicial requests and plea-deal requests filed by the prosecution against
//! criminal reports.
//!
//! At most one of the two may reference a given criminal report at any time.
//! Each filing claims the report id in a unique index inside the same write
//! transaction that stores the request, so two concurrent filings for one
//! report cannot both commit:
//!
//! | existing record | filing a judicial request | filing a plea-deal request |
//! |-----------------|---------------------------|----------------------------|
//! | none            | stored                    | stored                     |
//! | judicial        | `AlreadyFiled`            | `Conflict`                 |
//! | plea deal       | `Conflict`                | `AlreadyFiled`             |
//!
//! Requests embed a copy of the report as it was at filing time.

use crate::border::CriminalReport;
use crate::storage::{RecordReader, RecordStore, WriteScope};
use crate::{EupravaError, RecordId, RecordIdSet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Unique index: criminal report id -> judicial request id
pub const JUDICIAL_BY_REPORT: &str = "idx_judicial_report";
/// Unique index: criminal report id -> plea-deal request id
pub const PLEA_BY_REPORT: &str = "idx_plea_report";

// =============================================================================
// RECORDS
// =============================================================================

/// A prosecutor's request to send a criminal report to trial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudicialRequest {
    pub id: RecordId,
    #[serde(rename = "opis")]
    pub description: String,
    #[serde(rename = "datum")]
    pub filed_at: DateTime<Utc>,
    #[serde(rename = "idTuzioca")]
    pub prosecutor_id: u64,
    #[serde(rename = "krivicnaPrijava")]
    pub report: CriminalReport,
}

crate::impl_record!(JudicialRequest, "judicial_requests", "judicial request");

/// A prosecutor's offer to settle a criminal report out of court.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PleaDealRequest {
    pub id: RecordId,
    #[serde(rename = "opis")]
    pub description: String,
    #[serde(rename = "uslovi")]
    pub conditions: String,
    #[serde(rename = "kazna")]
    pub penalty: String,
    #[serde(rename = "datum")]
    pub filed_at: DateTime<Utc>,
    #[serde(rename = "idTuzioca")]
    pub prosecutor_id: u64,
    #[serde(rename = "krivicnaPrijava")]
    pub report: CriminalReport,
    /// `false` while pending. Rejected requests are deleted.
    #[serde(rename = "prihvacen")]
    pub accepted: bool,
}

crate::impl_record!(PleaDealRequest, "plea_deal_requests", "plea-deal request");

/// Body of a judicial-request filing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudicialTerms {
    #[serde(rename = "opis")]
    pub description: String,
}

/// Body of a plea-deal filing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PleaTerms {
    #[serde(rename = "opis")]
    pub description: String,
    #[serde(rename = "uslovi")]
    pub conditions: String,
    #[serde(rename = "kazna")]
    pub penalty: String,
}

impl PleaTerms {
    fn validate(&self) -> Result<(), EupravaError> {
        let required = [
            ("opis", &self.description),
            ("uslovi", &self.conditions),
            ("kazna", &self.penalty),
        ];
        match required.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((field, _)) => Err(EupravaError::InvalidRequest(format!(
                "{} is required",
                field
            ))),
            None => Ok(()),
        }
    }
}

/// Which track a criminal report has been escalated to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    Judicial(RecordId),
    PleaDeal(RecordId),
}

impl Escalation {
    #[must_use]
    pub const fn track(self) -> Track {
        match self {
            Self::Judicial(_) => Track::Judicial,
            Self::PleaDeal(_) => Track::PleaDeal,
        }
    }
}

/// The two mutually exclusive escalation tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Track {
    Judicial,
    PleaDeal,
}

impl Track {
    const fn noun(self) -> &'static str {
        match self {
            Self::Judicial => "a judicial request",
            Self::PleaDeal => "a plea-deal request",
        }
    }
}

// =============================================================================
// LEDGER
// =============================================================================

/// Prosecution-side escalation records over a shared record store.
#[derive(Debug, Clone)]
pub struct ProsecutionLedger {
    store: Arc<RecordStore>,
}

impl ProsecutionLedger {
    #[must_use]
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    /// The escalation currently on file for a report, if any.
    pub fn escalation_of(&self, report_id: RecordId) -> Result<Option<Escalation>, EupravaError> {
        self.store.read(|scope| escalation_in(scope, report_id))
    }

    /// Fail the way a filing on `track` would, without writing anything.
    ///
    /// Lets a caller refuse early, before fetching the report from the border
    /// service. The filing itself checks again inside its transaction.
    pub fn ensure_can_file(&self, report_id: RecordId, track: Track) -> Result<(), EupravaError> {
        self.store.read(|scope| check_track(scope, report_id, track))
    }

    /// File a judicial request for `report`, embedding a copy of it.
    pub fn file_judicial_request(
        &self,
        report: &CriminalReport,
        prosecutor_id: u64,
        terms: JudicialTerms,
        now: DateTime<Utc>,
    ) -> Result<JudicialRequest, EupravaError> {
        if terms.description.trim().is_empty() {
            return Err(EupravaError::InvalidRequest("opis is required".into()));
        }
        self.store.write(|scope| {
            check_track(&*scope, report.id, Track::Judicial)?;
            insert_judicial(
                scope,
                JudicialRequest {
                    id: RecordId::UNASSIGNED,
                    description: terms.description,
                    filed_at: now,
                    prosecutor_id,
                    report: report.clone(),
                },
            )
        })
    }

    /// File a pending plea-deal request for `report`, embedding a copy of it.
    pub fn file_plea_deal_request(
        &self,
        report: &CriminalReport,
        prosecutor_id: u64,
        terms: PleaTerms,
        now: DateTime<Utc>,
    ) -> Result<PleaDealRequest, EupravaError> {
        terms.validate()?;
        self.store.write(|scope| {
            check_track(&*scope, report.id, Track::PleaDeal)?;

            let mut request = PleaDealRequest {
                id: RecordId::UNASSIGNED,
                description: terms.description,
                conditions: terms.conditions,
                penalty: terms.penalty,
                filed_at: now,
                prosecutor_id,
                report: report.clone(),
                accepted: false,
            };
            let id = scope.insert(&mut request)?;
            if !scope.claim(PLEA_BY_REPORT, &report.id.index_key(), id)? {
                return Err(already_filed(Track::PleaDeal, report.id));
            }
            Ok(request)
        })
    }

    pub fn judicial_requests(&self) -> Result<Vec<JudicialRequest>, EupravaError> {
        self.store.list()
    }

    pub fn judicial_request(&self, id: RecordId) -> Result<JudicialRequest, EupravaError> {
        self.store.require(id)
    }

    pub fn plea_deal_requests(&self) -> Result<Vec<PleaDealRequest>, EupravaError> {
        self.store.list()
    }

    pub fn plea_deal_request(&self, id: RecordId) -> Result<PleaDealRequest, EupravaError> {
        self.store.require(id)
    }

    /// Reports from `reports` with no request on file, each at most once.
    ///
    /// Both indexes are read from one snapshot.
    pub fn unescalated(
        &self,
        reports: Vec<CriminalReport>,
    ) -> Result<Vec<CriminalReport>, EupravaError> {
        let unique = RecordIdSet::dedup_by_id(reports, |report| report.id);
        self.store.read(|scope| {
            let mut escalated = RecordIdSet::new();
            for report in &unique {
                if escalation_in(scope, report.id)?.is_some() {
                    escalated.insert(report.id);
                }
            }
            Ok(unique
                .into_iter()
                .filter(|report| !escalated.contains(report.id))
                .collect())
        })
    }
}

/// Look up both indexes for a report.
pub(crate) fn escalation_in(
    scope: &impl RecordReader,
    report_id: RecordId,
) -> Result<Option<Escalation>, EupravaError> {
    let key = report_id.index_key();
    if let Some(id) = scope.lookup(JUDICIAL_BY_REPORT, &key)? {
        return Ok(Some(Escalation::Judicial(id)));
    }
    Ok(scope.lookup(PLEA_BY_REPORT, &key)?.map(Escalation::PleaDeal))
}

/// `AlreadyFiled` for the same track, `Conflict` for the other one.
fn check_track(
    scope: &impl RecordReader,
    report_id: RecordId,
    track: Track,
) -> Result<(), EupravaError> {
    match escalation_in(scope, report_id)? {
        Some(existing) if existing.track() == track => Err(already_filed(track, report_id)),
        Some(existing) => Err(EupravaError::Conflict(format!(
            "{} already exists for criminal report {}",
            existing.track().noun(),
            report_id
        ))),
        None => Ok(()),
    }
}

fn already_filed(track: Track, report_id: RecordId) -> EupravaError {
    EupravaError::AlreadyFiled(format!(
        "{} already exists for criminal report {}",
        track.noun(),
        report_id
    ))
}

/// Store a judicial request and claim its report.
///
/// Fails with `AlreadyFiled` if a judicial request already holds the report.
pub(crate) fn insert_judicial(
    scope: &mut WriteScope<'_>,
    mut request: JudicialRequest,
) -> Result<JudicialRequest, EupravaError> {
    let id = scope.insert(&mut request)?;
    if !scope.claim(JUDICIAL_BY_REPORT, &request.report.id.index_key(), id)? {
        return Err(already_filed(Track::Judicial, request.report.id));
    }
    Ok(request)
}

// =============================================================================
// TESTS
// =============================================================================

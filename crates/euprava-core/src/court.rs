//! # Court Records
//!
//! Cases opened from judicial requests, hearings scheduled for a case and
//! verdicts handed down at a hearing. Each record embeds a copy of the record
//! it was created from.
//!
//! A judicial request opens at most one case; the request id is claimed in a
//! unique index when the case is stored.

use crate::escalation::JudicialRequest;
use crate::storage::{RecordReader, RecordStore};
use crate::{EupravaError, RecordId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Unique index: judicial request id -> case id
pub const CASE_BY_REQUEST: &str = "idx_case_request";

// =============================================================================
// RECORDS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Case {
    pub id: RecordId,
    #[serde(rename = "opis")]
    pub description: String,
    #[serde(rename = "datum")]
    pub opened_at: DateTime<Utc>,
    #[serde(rename = "idSudije")]
    pub judge_id: u64,
    #[serde(rename = "zahtev")]
    pub request: JudicialRequest,
}

crate::impl_record!(Case, "cases", "case");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hearing {
    pub id: RecordId,
    #[serde(rename = "adresa")]
    pub address: String,
    #[serde(rename = "datum")]
    pub scheduled_for: DateTime<Utc>,
    #[serde(rename = "prostorija")]
    pub room: String,
    #[serde(rename = "predmet")]
    pub case: Case,
}

crate::impl_record!(Hearing, "hearings", "hearing");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub id: RecordId,
    #[serde(rename = "opis")]
    pub outcome: String,
    #[serde(rename = "datum")]
    pub issued_at: DateTime<Utc>,
    #[serde(rename = "terminSudjenja")]
    pub hearing: Hearing,
    #[serde(rename = "idSudije")]
    pub judge_id: u64,
}

crate::impl_record!(Verdict, "verdicts", "verdict");

// =============================================================================
// REQUESTS
// =============================================================================

/// A case opened by hand from a judicial request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCase {
    #[serde(rename = "opis")]
    pub description: String,
    #[serde(rename = "zahtev")]
    pub request: JudicialRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewHearing {
    #[serde(rename = "adresa")]
    pub address: String,
    #[serde(rename = "datum")]
    pub scheduled_for: DateTime<Utc>,
    #[serde(rename = "prostorija")]
    pub room: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVerdict {
    #[serde(rename = "opis")]
    pub outcome: String,
}

// =============================================================================
// COURT
// =============================================================================

/// Court-service operations over a shared record store.
#[derive(Debug, Clone)]
pub struct Court {
    store: Arc<RecordStore>,
}

impl Court {
    #[must_use]
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    /// Open a case for a single judicial request.
    ///
    /// Fails with `AlreadyFiled` if the request already has a case.
    pub fn open_case(
        &self,
        new: NewCase,
        judge_id: u64,
        now: DateTime<Utc>,
    ) -> Result<Case, EupravaError> {
        if new.description.trim().is_empty() {
            return Err(EupravaError::InvalidRequest("opis is required".into()));
        }
        if new.request.id == RecordId::UNASSIGNED {
            return Err(EupravaError::InvalidRequest("zahtev.id is required".into()));
        }
        self.store.write(|scope| {
            let mut case = Case {
                id: RecordId::UNASSIGNED,
                description: new.description,
                opened_at: now,
                judge_id,
                request: new.request,
            };
            let id = scope.insert(&mut case)?;
            if !scope.claim(CASE_BY_REQUEST, &case.request.id.index_key(), id)? {
                return Err(EupravaError::AlreadyFiled(format!(
                    "judicial request {} already has a case",
                    case.request.id
                )));
            }
            Ok(case)
        })
    }

    /// Open a case for every request in `requests` that has none yet.
    ///
    /// Returns only the newly opened cases. Duplicate requests in the batch
    /// open one case.
    pub fn open_cases_from(
        &self,
        requests: Vec<JudicialRequest>,
        judge_id: u64,
        now: DateTime<Utc>,
    ) -> Result<Vec<Case>, EupravaError> {
        self.store.write(|scope| {
            let mut opened = Vec::new();
            for request in requests {
                let key = request.id.index_key();
                if scope.lookup(CASE_BY_REQUEST, &key)?.is_some() {
                    continue;
                }
                let mut case = Case {
                    id: RecordId::UNASSIGNED,
                    description: request.description.clone(),
                    opened_at: now,
                    judge_id,
                    request,
                };
                let id = scope.insert(&mut case)?;
                scope.claim(CASE_BY_REQUEST, &key, id)?;
                opened.push(case);
            }
            Ok(opened)
        })
    }

    pub fn cases(&self) -> Result<Vec<Case>, EupravaError> {
        self.store.list()
    }

    pub fn case(&self, id: RecordId) -> Result<Case, EupravaError> {
        self.store.require(id)
    }

    /// Schedule a hearing for a case.
    pub fn schedule_hearing(
        &self,
        case_id: RecordId,
        new: NewHearing,
    ) -> Result<Hearing, EupravaError> {
        if new.address.trim().is_empty() {
            return Err(EupravaError::InvalidRequest("adresa is required".into()));
        }
        self.store.write(|scope| {
            let case: Case = scope.require(case_id)?;
            let mut hearing = Hearing {
                id: RecordId::UNASSIGNED,
                address: new.address,
                scheduled_for: new.scheduled_for,
                room: new.room,
                case,
            };
            scope.insert(&mut hearing)?;
            Ok(hearing)
        })
    }

    pub fn hearings(&self) -> Result<Vec<Hearing>, EupravaError> {
        self.store.list()
    }

    pub fn hearing(&self, id: RecordId) -> Result<Hearing, EupravaError> {
        self.store.require(id)
    }

    /// Record the verdict of a hearing.
    pub fn record_verdict(
        &self,
        hearing_id: RecordId,
        new: NewVerdict,
        judge_id: u64,
        now: DateTime<Utc>,
    ) -> Result<Verdict, EupravaError> {
        if new.outcome.trim().is_empty() {
            return Err(EupravaError::InvalidRequest("opis is required".into()));
        }
        self.store.write(|scope| {
            let hearing: Hearing = scope.require(hearing_id)?;
            let mut verdict = Verdict {
                id: RecordId::UNASSIGNED,
                outcome: new.outcome,
                issued_at: now,
                hearing,
                judge_id,
            };
            scope.insert(&mut verdict)?;
            Ok(verdict)
        })
    }

    pub fn verdicts(&self) -> Result<Vec<Verdict>, EupravaError> {
        self.store.list()
    }

    pub fn verdict(&self, id: RecordId) -> Result<Verdict, EupravaError> {
        self.store.require(id)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::criminal_report;

    fn court() -> Court {
        Court::new(Arc::new(RecordStore::in_memory().unwrap()))
    }

    fn request(id: u64) -> JudicialRequest {
        JudicialRequest {
            id: RecordId(id),
            description: format!("request {}", id),
            filed_at: Utc::now(),
            prosecutor_id: 3,
            report: criminal_report(id),
        }
    }

    #[test]
    fn pull_opens_each_request_once() {
        let court = court();
        let first = court
            .open_cases_from(vec![request(1), request(2), request(1)], 8, Utc::now())
            .unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].description, "request 1");
        assert_eq!(first[0].judge_id, 8);

        let second = court
            .open_cases_from(vec![request(1), request(2), request(3)], 8, Utc::now())
            .unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].request.id, RecordId(3));
        assert_eq!(court.cases().unwrap().len(), 3);
    }

    #[test]
    fn manual_case_respects_index() {
        let court = court();
        court
            .open_cases_from(vec![request(1)], 8, Utc::now())
            .unwrap();
        let dup = court.open_case(
            NewCase {
                description: "again".into(),
                request: request(1),
            },
            8,
            Utc::now(),
        );
        assert!(matches!(dup, Err(EupravaError::AlreadyFiled(_))));
        assert_eq!(court.cases().unwrap().len(), 1);
    }

    #[test]
    fn hearing_and_verdict_chain() {
        let court = court();
        let case = court
            .open_case(
                NewCase {
                    description: "smuggling".into(),
                    request: request(4),
                },
                8,
                Utc::now(),
            )
            .unwrap();
        let hearing = court
            .schedule_hearing(
                case.id,
                NewHearing {
                    address: "Sutjeska 3".into(),
                    scheduled_for: Utc::now(),
                    room: "12".into(),
                },
            )
            .unwrap();
        assert_eq!(hearing.case, case);

        let verdict = court
            .record_verdict(
                hearing.id,
                NewVerdict {
                    outcome: "guilty".into(),
                },
                8,
                Utc::now(),
            )
            .unwrap();
        assert_eq!(verdict.hearing, hearing);
        assert_eq!(court.verdict(verdict.id).unwrap(), verdict);
        assert!(matches!(
            court.hearing(RecordId(42)),
            Err(EupravaError::NotFound { .. })
        ));
    }
}

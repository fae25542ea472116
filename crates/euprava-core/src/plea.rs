//! # Plea-Deal State Machine
//!
//! ```text
//!            accept                 reject
//! Settled <---------- Pending -----------------> (deleted) + JudicialRequest
//! ```
//!
//! Both outcomes are terminal. Accepting keeps the request with
//! `prihvacen = true` and stores one [`Settlement`] embedding it. Rejecting
//! files a judicial request for the same criminal report and then deletes the
//! plea-deal request. Each transition runs in one write transaction, so a
//! failure leaves the request untouched.

use crate::border::CriminalReport;
use crate::escalation::{self, JudicialRequest, PLEA_BY_REPORT, PleaDealRequest};
use crate::storage::{RecordReader, RecordStore};
use crate::{EupravaError, RecordId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Unique index: plea-deal request id -> settlement id
pub const SETTLEMENT_BY_PLEA: &str = "idx_settlement_plea";

/// Description of the judicial request filed when a plea deal is rejected.
pub const REJECTED_PLEA_MARKER: &str = "Odbijen zahtev za sklapanje sporazuma";

/// A finalized plea agreement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub id: RecordId,
    #[serde(rename = "datum")]
    pub settled_at: DateTime<Utc>,
    /// The request as it was when accepted.
    #[serde(rename = "zahtev")]
    pub request: PleaDealRequest,
}

crate::impl_record!(Settlement, "settlements", "settlement");

/// State of a plea-deal request still on file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PleaStatus {
    Pending,
    Accepted,
}

impl PleaDealRequest {
    #[must_use]
    pub const fn status(&self) -> PleaStatus {
        if self.accepted {
            PleaStatus::Accepted
        } else {
            PleaStatus::Pending
        }
    }
}

/// Accept/reject transitions over a shared record store.
#[derive(Debug, Clone)]
pub struct PleaDeals {
    store: Arc<RecordStore>,
}

impl PleaDeals {
    #[must_use]
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    /// Accept a pending request and settle it.
    ///
    /// A second accept fails with `AlreadySettled`. A request that was
    /// rejected no longer exists and fails with `NotFound`.
    pub fn accept(
        &self,
        request_id: RecordId,
        now: DateTime<Utc>,
    ) -> Result<Settlement, EupravaError> {
        self.store.write(|scope| {
            if scope
                .lookup(SETTLEMENT_BY_PLEA, &request_id.index_key())?
                .is_some()
            {
                return Err(EupravaError::AlreadySettled(request_id));
            }

            let mut request: PleaDealRequest = scope.require(request_id)?;
            request.accepted = true;
            scope.put(&request)?;

            let mut settlement = Settlement {
                id: RecordId::UNASSIGNED,
                settled_at: now,
                request,
            };
            let id = scope.insert(&mut settlement)?;
            if !scope.claim(SETTLEMENT_BY_PLEA, &request_id.index_key(), id)? {
                return Err(EupravaError::AlreadySettled(request_id));
            }
            Ok(settlement)
        })
    }

    /// Reject a pending request, filing a judicial request in its place.
    ///
    /// The judicial request is written before the plea-deal request is
    /// removed. An accepted request cannot be rejected (`AlreadySettled`).
    pub fn reject(
        &self,
        request_id: RecordId,
        now: DateTime<Utc>,
    ) -> Result<JudicialRequest, EupravaError> {
        self.store.write(|scope| {
            let request: PleaDealRequest = scope.require(request_id)?;
            if request.accepted {
                return Err(EupravaError::AlreadySettled(request_id));
            }

            let report_key = request.report.id.index_key();
            let judicial = escalation::insert_judicial(
                scope,
                JudicialRequest {
                    id: RecordId::UNASSIGNED,
                    description: REJECTED_PLEA_MARKER.to_string(),
                    filed_at: now,
                    prosecutor_id: request.prosecutor_id,
                    report: request.report,
                },
            )
            .map_err(|e| match e {
                EupravaError::AlreadyFiled(msg) => EupravaError::Conflict(msg),
                other => other,
            })?;

            scope.remove::<PleaDealRequest>(request_id)?;
            scope.release(PLEA_BY_REPORT, &report_key)?;
            Ok(judicial)
        })
    }

    /// Plea-deal requests on file whose report names the traveller `jmbg`.
    ///
    /// Ordered by filing time, oldest first.
    pub fn for_citizen(&self, jmbg: &str) -> Result<Vec<PleaDealRequest>, EupravaError> {
        let mut requests: Vec<PleaDealRequest> = self
            .store
            .list::<PleaDealRequest>()?
            .into_iter()
            .filter(|request| names_traveller(&request.report, jmbg))
            .collect();
        requests.sort_by_key(|request| (request.filed_at, request.id));
        Ok(requests)
    }

    /// Settlements whose report names the traveller `jmbg`.
    pub fn settlements_for_citizen(&self, jmbg: &str) -> Result<Vec<Settlement>, EupravaError> {
        let mut settlements: Vec<Settlement> = self
            .store
            .list::<Settlement>()?
            .into_iter()
            .filter(|settlement| names_traveller(&settlement.request.report, jmbg))
            .collect();
        settlements.sort_by_key(|settlement| (settlement.settled_at, settlement.id));
        Ok(settlements)
    }

    pub fn settlements(&self) -> Result<Vec<Settlement>, EupravaError> {
        self.store.list()
    }
}

fn names_traveller(report: &CriminalReport, jmbg: &str) -> bool {
    !jmbg.is_empty() && report.crossing.traveller_jmbg == jmbg
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::escalation::{Escalation, JudicialTerms, PleaTerms, ProsecutionLedger};
    use crate::test_support::{criminal_report, criminal_report_for};

    fn setup() -> (ProsecutionLedger, PleaDeals) {
        let store = Arc::new(RecordStore::in_memory().unwrap());
        (
            ProsecutionLedger::new(Arc::clone(&store)),
            PleaDeals::new(store),
        )
    }

    fn terms() -> PleaTerms {
        PleaTerms {
            description: "offer".into(),
            conditions: "restitution".into(),
            penalty: "fine".into(),
        }
    }

    #[test]
    fn accept_settles_once() {
        let (ledger, deals) = setup();
        let request = ledger
            .file_plea_deal_request(&criminal_report(1), 5, terms(), Utc::now())
            .unwrap();

        let settlement = deals.accept(request.id, Utc::now()).unwrap();
        assert!(settlement.request.accepted);
        assert_eq!(settlement.request.status(), PleaStatus::Accepted);

        assert_eq!(
            deals.accept(request.id, Utc::now()),
            Err(EupravaError::AlreadySettled(request.id))
        );
        assert_eq!(deals.settlements().unwrap().len(), 1);
        // The accepted request stays on file
        assert!(ledger.plea_deal_requests().unwrap()[0].accepted);
    }

    #[test]
    fn accept_unknown_is_not_found() {
        let (_, deals) = setup();
        assert!(matches!(
            deals.accept(RecordId(3), Utc::now()),
            Err(EupravaError::NotFound { .. })
        ));
    }

    #[test]
    fn reject_files_judicial_request() {
        let (ledger, deals) = setup();
        let report = criminal_report(7);
        let request = ledger
            .file_plea_deal_request(&report, 5, terms(), Utc::now())
            .unwrap();

        let judicial = deals.reject(request.id, Utc::now()).unwrap();
        assert_eq!(judicial.description, REJECTED_PLEA_MARKER);
        assert_eq!(judicial.report, report);
        assert_eq!(judicial.prosecutor_id, 5);
        assert!(ledger.plea_deal_requests().unwrap().is_empty());
        assert_eq!(
            ledger.escalation_of(report.id).unwrap(),
            Some(Escalation::Judicial(judicial.id))
        );

        // Report is now on the judicial track
        assert!(matches!(
            ledger.file_plea_deal_request(&report, 5, terms(), Utc::now()),
            Err(EupravaError::Conflict(_))
        ));
        assert!(matches!(
            ledger.file_judicial_request(
                &report,
                5,
                JudicialTerms {
                    description: "x".into()
                },
                Utc::now()
            ),
            Err(EupravaError::AlreadyFiled(_))
        ));
    }

    #[test]
    fn reject_after_accept_is_refused() {
        let (ledger, deals) = setup();
        let request = ledger
            .file_plea_deal_request(&criminal_report(1), 5, terms(), Utc::now())
            .unwrap();
        deals.accept(request.id, Utc::now()).unwrap();
        assert_eq!(
            deals.reject(request.id, Utc::now()),
            Err(EupravaError::AlreadySettled(request.id))
        );
        assert!(ledger.judicial_requests().unwrap().is_empty());
    }

    #[test]
    fn reject_twice_is_not_found() {
        let (ledger, deals) = setup();
        let request = ledger
            .file_plea_deal_request(&criminal_report(1), 5, terms(), Utc::now())
            .unwrap();
        deals.reject(request.id, Utc::now()).unwrap();
        assert!(matches!(
            deals.reject(request.id, Utc::now()),
            Err(EupravaError::NotFound { .. })
        ));
        assert_eq!(ledger.judicial_requests().unwrap().len(), 1);
    }

    #[test]
    fn citizen_lookup_matches_traveller() {
        let (ledger, deals) = setup();
        let file = |report_id: u64, jmbg: &str| {
            let report = criminal_report_for(report_id, jmbg);
            ledger
                .file_plea_deal_request(&report, 5, terms(), Utc::now())
                .unwrap()
        };
        let mine = file(1, "1111111111111");
        file(2, "2222222222222");
        let settled = file(3, "1111111111111");
        deals.accept(settled.id, Utc::now()).unwrap();

        let found = deals.for_citizen("1111111111111").unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].id, mine.id);
        assert_eq!(found[1].status(), PleaStatus::Accepted);

        assert_eq!(deals.settlements_for_citizen("1111111111111").unwrap().len(), 1);
        assert!(deals.settlements_for_citizen("2222222222222").unwrap().is_empty());
        assert!(deals.for_citizen("").unwrap().is_empty());
    }
}

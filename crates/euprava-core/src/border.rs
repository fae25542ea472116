//! # Border Crossings
//!
//! Crossing events recorded at a border post, travellers flagged as
//! suspicious, and criminal reports escalated from a crossing.
//!
//! Suspicious-person flags and criminal reports embed a copy of the crossing
//! as it was when they were created.

use crate::storage::{RecordReader, RecordStore};
use crate::validation::DocumentClaim;
use crate::{DocumentRejection, EupravaError, RecordId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// =============================================================================
// RECORDS
// =============================================================================

/// One crossing-point event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crossing {
    pub id: RecordId,
    #[serde(rename = "datum")]
    pub crossed_at: DateTime<Utc>,
    #[serde(rename = "imePutnika")]
    pub traveller_first_name: String,
    #[serde(rename = "prezimePutnika")]
    pub traveller_last_name: String,
    #[serde(rename = "JMBGPutnika")]
    pub traveller_jmbg: String,
    #[serde(rename = "brojLicneKartePutnika")]
    pub traveller_card_number: String,
    #[serde(rename = "brojPasosaPutnika")]
    pub traveller_passport_number: String,
    #[serde(rename = "drzavljanstvoPutnika")]
    pub traveller_citizenship: String,
    #[serde(rename = "markaVozila")]
    pub vehicle_make: String,
    #[serde(rename = "modelVozila")]
    pub vehicle_model: String,
    #[serde(rename = "svrhaPutovanja")]
    pub purpose: String,
    #[serde(rename = "odobren")]
    pub approved: bool,
}

crate::impl_record!(Crossing, "crossings", "border crossing");

/// A crossing flagged by an officer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuspiciousPerson {
    pub id: RecordId,
    #[serde(rename = "prelaz")]
    pub crossing: Crossing,
    #[serde(rename = "opis")]
    pub note: String,
}

crate::impl_record!(SuspiciousPerson, "suspicious_persons", "suspicious person");

/// A formal report tied to a crossing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriminalReport {
    pub id: RecordId,
    #[serde(rename = "datum")]
    pub filed_at: DateTime<Utc>,
    #[serde(rename = "opis")]
    pub description: String,
    #[serde(rename = "prelaz")]
    pub crossing: Crossing,
}

crate::impl_record!(CriminalReport, "criminal_reports", "criminal report");

// =============================================================================
// REQUESTS
// =============================================================================

/// Crossing data presented by a border officer.
///
/// Any `id`, `datum` or `odobren` sent by the client is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossingRequest {
    #[serde(rename = "imePutnika")]
    pub traveller_first_name: String,
    #[serde(rename = "prezimePutnika")]
    pub traveller_last_name: String,
    #[serde(rename = "JMBGPutnika")]
    pub traveller_jmbg: String,
    #[serde(rename = "brojLicneKartePutnika")]
    pub traveller_card_number: String,
    #[serde(rename = "brojPasosaPutnika")]
    pub traveller_passport_number: String,
    #[serde(rename = "drzavljanstvoPutnika")]
    pub traveller_citizenship: String,
    #[serde(rename = "markaVozila", default)]
    pub vehicle_make: String,
    #[serde(rename = "modelVozila", default)]
    pub vehicle_model: String,
    #[serde(rename = "svrhaPutovanja", default)]
    pub purpose: String,
}

impl CrossingRequest {
    /// Check that every identity field needed for validation is present.
    pub fn validate(&self) -> Result<(), EupravaError> {
        let required = [
            ("imePutnika", &self.traveller_first_name),
            ("prezimePutnika", &self.traveller_last_name),
            ("JMBGPutnika", &self.traveller_jmbg),
            ("brojLicneKartePutnika", &self.traveller_card_number),
            ("brojPasosaPutnika", &self.traveller_passport_number),
            ("drzavljanstvoPutnika", &self.traveller_citizenship),
        ];
        match required.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((field, _)) => Err(EupravaError::InvalidRequest(format!(
                "{} is required",
                field
            ))),
            None => Ok(()),
        }
    }

    /// The document claim the registry has to confirm.
    #[must_use]
    pub fn claim(&self) -> DocumentClaim {
        DocumentClaim {
            jmbg: self.traveller_jmbg.clone(),
            first_name: self.traveller_first_name.clone(),
            last_name: self.traveller_last_name.clone(),
            card_number: self.traveller_card_number.clone(),
            passport_number: self.traveller_passport_number.clone(),
            citizenship: self.traveller_citizenship.clone(),
        }
    }
}

/// Free-text body shared by flags and reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    #[serde(rename = "opis")]
    pub text: String,
}

// =============================================================================
// BORDER POST
// =============================================================================

/// Border-service operations over a shared record store.
#[derive(Debug, Clone)]
pub struct BorderPost {
    store: Arc<RecordStore>,
}

impl BorderPost {
    #[must_use]
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    /// Record a crossing once the registry has ruled on the traveller's documents.
    ///
    /// A rejected claim stores nothing and surfaces as `DocumentRejected`.
    pub fn record_crossing(
        &self,
        request: CrossingRequest,
        verdict: Result<(), DocumentRejection>,
        now: DateTime<Utc>,
    ) -> Result<Crossing, EupravaError> {
        request.validate()?;
        verdict.map_err(EupravaError::DocumentRejected)?;

        let mut crossing = Crossing {
            id: RecordId::UNASSIGNED,
            crossed_at: now,
            traveller_first_name: request.traveller_first_name,
            traveller_last_name: request.traveller_last_name,
            traveller_jmbg: request.traveller_jmbg,
            traveller_card_number: request.traveller_card_number,
            traveller_passport_number: request.traveller_passport_number,
            traveller_citizenship: request.traveller_citizenship,
            vehicle_make: request.vehicle_make,
            vehicle_model: request.vehicle_model,
            purpose: request.purpose,
            approved: true,
        };
        self.store.write(|scope| scope.insert(&mut crossing))?;
        Ok(crossing)
    }

    /// Flag the traveller of a recorded crossing.
    pub fn flag_suspicious(
        &self,
        crossing_id: RecordId,
        note: Note,
    ) -> Result<SuspiciousPerson, EupravaError> {
        self.store.write(|scope| {
            let crossing: Crossing = scope.require(crossing_id)?;
            let mut flag = SuspiciousPerson {
                id: RecordId::UNASSIGNED,
                crossing,
                note: note.text,
            };
            scope.insert(&mut flag)?;
            Ok(flag)
        })
    }

    /// Escalate a crossing into a criminal report.
    pub fn file_criminal_report(
        &self,
        crossing_id: RecordId,
        note: Note,
        now: DateTime<Utc>,
    ) -> Result<CriminalReport, EupravaError> {
        if note.text.trim().is_empty() {
            return Err(EupravaError::InvalidRequest("opis is required".into()));
        }
        self.store.write(|scope| {
            let crossing: Crossing = scope.require(crossing_id)?;
            let mut report = CriminalReport {
                id: RecordId::UNASSIGNED,
                filed_at: now,
                description: note.text,
                crossing,
            };
            scope.insert(&mut report)?;
            Ok(report)
        })
    }

    pub fn crossings(&self) -> Result<Vec<Crossing>, EupravaError> {
        self.store.list()
    }

    pub fn suspicious_persons(&self) -> Result<Vec<SuspiciousPerson>, EupravaError> {
        self.store.list()
    }

    pub fn criminal_reports(&self) -> Result<Vec<CriminalReport>, EupravaError> {
        self.store.list()
    }

    pub fn criminal_report(&self, id: RecordId) -> Result<CriminalReport, EupravaError> {
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
    use crate::DocumentKind;

    fn crossing_request() -> CrossingRequest {
        CrossingRequest {
            traveller_first_name: "Petar".into(),
            traveller_last_name: "Petrovic".into(),
            traveller_jmbg: "1234567890123".into(),
            traveller_card_number: "012345678".into(),
            traveller_passport_number: "987654321".into(),
            traveller_citizenship: "Srbija".into(),
            vehicle_make: "Fiat".into(),
            vehicle_model: "Punto".into(),
            purpose: "turizam".into(),
        }
    }

    fn post() -> BorderPost {
        BorderPost::new(Arc::new(RecordStore::in_memory().unwrap()))
    }

    #[test]
    fn approved_crossing_is_recorded() {
        let post = post();
        let crossing = post
            .record_crossing(crossing_request(), Ok(()), Utc::now())
            .unwrap();
        assert!(crossing.approved);
        assert_eq!(crossing.id, RecordId(1));
        assert_eq!(post.crossings().unwrap(), vec![crossing]);
    }

    #[test]
    fn rejected_crossing_stores_nothing() {
        let post = post();
        let rejection = DocumentRejection::Expired {
            document: DocumentKind::Passport,
        };
        let result = post.record_crossing(crossing_request(), Err(rejection), Utc::now());
        assert_eq!(result, Err(EupravaError::DocumentRejected(rejection)));
        assert!(post.crossings().unwrap().is_empty());
    }

    #[test]
    fn missing_identity_field() {
        let mut request = crossing_request();
        request.traveller_jmbg = " ".into();
        assert!(matches!(
            post().record_crossing(request, Ok(()), Utc::now()),
            Err(EupravaError::InvalidRequest(_))
        ));
    }

    #[test]
    fn report_embeds_crossing_snapshot() {
        let post = post();
        let crossing = post
            .record_crossing(crossing_request(), Ok(()), Utc::now())
            .unwrap();
        let report = post
            .file_criminal_report(
                crossing.id,
                Note {
                    text: "smuggling".into(),
                },
                Utc::now(),
            )
            .unwrap();
        assert_eq!(report.crossing, crossing);
        assert_eq!(post.criminal_report(report.id).unwrap(), report);

        let missing = post.file_criminal_report(
            RecordId(77),
            Note {
                text: "x".into(),
            },
            Utc::now(),
        );
        assert!(matches!(missing, Err(EupravaError::NotFound { .. })));
    }

    #[test]
    fn flag_requires_crossing() {
        let post = post();
        assert!(matches!(
            post.flag_suspicious(RecordId(1), Note { text: "x".into() }),
            Err(EupravaError::NotFound { .. })
        ));
        let crossing = post
            .record_crossing(crossing_request(), Ok(()), Utc::now())
            .unwrap();
        let flag = post
            .flag_suspicious(crossing.id, Note { text: "nervous".into() })
            .unwrap();
        assert_eq!(flag.crossing.traveller_jmbg, "1234567890123");
        assert_eq!(post.suspicious_persons().unwrap().len(), 1);
    }
}

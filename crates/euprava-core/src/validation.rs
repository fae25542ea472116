//! # Document Validation
//!
//! Decides whether the documents a traveller presents at a border crossing
//! match the registry's records.
//!
//! Checks run in a fixed order and the first failure wins:
//! 1. a registry record exists for the claimed national id (JMBG)
//! 2. identity card: present, not expired, holder name, JMBG, card number
//! 3. passport: present, not expired, holder name, passport number, citizenship
//!
//! A document expiring today is still valid; it is expired only once the
//! validation date is strictly after the expiry date.

use crate::registry::{Citizen, Document};
use crate::types::{ClaimField, DocumentKind, DocumentRejection};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The identity fields a traveller presents at a crossing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentClaim {
    #[serde(rename = "jmbg")]
    pub jmbg: String,
    #[serde(rename = "ime")]
    pub first_name: String,
    #[serde(rename = "prezime")]
    pub last_name: String,
    #[serde(rename = "brojLicneKarte")]
    pub card_number: String,
    #[serde(rename = "brojPasosa")]
    pub passport_number: String,
    #[serde(rename = "drzavljanstvo")]
    pub citizenship: String,
}

/// True once `today` is past the document's expiry date.
#[must_use]
pub fn is_expired(document: &Document, today: NaiveDate) -> bool {
    today > document.expires
}

fn check_holder(
    document: &Document,
    kind: DocumentKind,
    claim: &DocumentClaim,
    today: NaiveDate,
) -> Result<(), DocumentRejection> {
    if is_expired(document, today) {
        return Err(DocumentRejection::Expired { document: kind });
    }
    if document.first_name != claim.first_name {
        return Err(mismatch(kind, ClaimField::FirstName));
    }
    if document.last_name != claim.last_name {
        return Err(mismatch(kind, ClaimField::LastName));
    }
    Ok(())
}

const fn mismatch(document: DocumentKind, field: ClaimField) -> DocumentRejection {
    DocumentRejection::Mismatch { document, field }
}

/// Validate `claim` against the registry record found for its JMBG.
///
/// `record` is `None` when no citizen carries the claimed JMBG.
pub fn validate_claim(
    claim: &DocumentClaim,
    record: Option<&Citizen>,
    today: NaiveDate,
) -> Result<(), DocumentRejection> {
    let citizen = record.ok_or(DocumentRejection::SubjectNotFound)?;

    let card = citizen
        .identity_card
        .as_ref()
        .ok_or(DocumentRejection::MissingDocument {
            document: DocumentKind::IdentityCard,
        })?;
    check_holder(&card.document, DocumentKind::IdentityCard, claim, today)?;
    if card.jmbg != claim.jmbg {
        return Err(mismatch(DocumentKind::IdentityCard, ClaimField::Jmbg));
    }
    if card.card_number != claim.card_number {
        return Err(mismatch(DocumentKind::IdentityCard, ClaimField::CardNumber));
    }

    let passport = citizen
        .passport
        .as_ref()
        .ok_or(DocumentRejection::MissingDocument {
            document: DocumentKind::Passport,
        })?;
    check_holder(&passport.document, DocumentKind::Passport, claim, today)?;
    if passport.passport_number != claim.passport_number {
        return Err(mismatch(DocumentKind::Passport, ClaimField::PassportNumber));
    }
    if passport.citizenship != claim.citizenship {
        return Err(mismatch(DocumentKind::Passport, ClaimField::Citizenship));
    }

    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::RecordId;
    use crate::identity::Role;
    use crate::registry::{IdentityCard, Passport, Sex};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn document(expires: NaiveDate) -> Document {
        Document {
            first_name: "Marko".into(),
            last_name: "Markovic".into(),
            date_of_birth: date(1990, 1, 1),
            place_of_birth: "Novi Sad".into(),
            issued: date(2020, 1, 1),
            expires,
        }
    }

    fn citizen() -> Citizen {
        Citizen {
            id: RecordId(1),
            first_name: "Marko".into(),
            last_name: "Markovic".into(),
            username: "marko".into(),
            identity_card: Some(IdentityCard {
                document: document(date(2030, 1, 1)),
                sex: Sex::Male,
                jmbg: "0101990800001".into(),
                card_number: "012345678".into(),
            }),
            passport: Some(Passport {
                document: document(date(2030, 1, 1)),
                sex: Sex::Male,
                citizenship: "Srbija".into(),
                passport_number: "123456789".into(),
            }),
            vehicle_registration: None,
            driving_licence: None,
            role: Role::Citizen,
        }
    }

    fn claim() -> DocumentClaim {
        DocumentClaim {
            jmbg: "0101990800001".into(),
            first_name: "Marko".into(),
            last_name: "Markovic".into(),
            card_number: "012345678".into(),
            passport_number: "123456789".into(),
            citizenship: "Srbija".into(),
        }
    }

    #[test]
    fn valid_claim_passes() {
        assert!(validate_claim(&claim(), Some(&citizen()), date(2025, 6, 1)).is_ok());
    }

    #[test]
    fn unknown_subject() {
        assert_eq!(
            validate_claim(&claim(), None, date(2025, 6, 1)),
            Err(DocumentRejection::SubjectNotFound)
        );
    }

    #[test]
    fn missing_documents_in_order() {
        let mut record = citizen();
        record.passport = None;
        assert_eq!(
            validate_claim(&claim(), Some(&record), date(2025, 6, 1)),
            Err(DocumentRejection::MissingDocument {
                document: DocumentKind::Passport
            })
        );

        record.identity_card = None;
        assert_eq!(
            validate_claim(&claim(), Some(&record), date(2025, 6, 1)),
            Err(DocumentRejection::MissingDocument {
                document: DocumentKind::IdentityCard
            })
        );
    }

    #[test]
    fn expiry_boundary() {
        let today = date(2025, 6, 1);
        let mut record = citizen();
        if let Some(card) = record.identity_card.as_mut() {
            card.document.expires = today;
        }
        assert!(validate_claim(&claim(), Some(&record), today).is_ok());

        if let Some(card) = record.identity_card.as_mut() {
            card.document.expires = date(2025, 5, 31);
        }
        assert_eq!(
            validate_claim(&claim(), Some(&record), today),
            Err(DocumentRejection::Expired {
                document: DocumentKind::IdentityCard
            })
        );
    }

    #[test]
    fn first_mismatch_wins() {
        let mut bad = claim();
        bad.last_name = "Petrovic".into();
        bad.card_number = "000000000".into();
        bad.citizenship = "Hrvatska".into();
        assert_eq!(
            validate_claim(&bad, Some(&citizen()), date(2025, 6, 1)),
            Err(DocumentRejection::Mismatch {
                document: DocumentKind::IdentityCard,
                field: ClaimField::LastName
            })
        );

        let mut bad = claim();
        bad.citizenship = "Hrvatska".into();
        assert_eq!(
            validate_claim(&bad, Some(&citizen()), date(2025, 6, 1)),
            Err(DocumentRejection::Mismatch {
                document: DocumentKind::Passport,
                field: ClaimField::Citizenship
            })
        );
    }

    #[test]
    fn card_checked_before_passport() {
        let mut record = citizen();
        if let Some(passport) = record.passport.as_mut() {
            passport.document.expires = date(2000, 1, 1);
        }
        let mut bad = claim();
        bad.card_number = "099999999".into();
        assert_eq!(
            validate_claim(&bad, Some(&record), date(2025, 6, 1)),
            Err(DocumentRejection::Mismatch {
                document: DocumentKind::IdentityCard,
                field: ClaimField::CardNumber
            })
        );
    }
}

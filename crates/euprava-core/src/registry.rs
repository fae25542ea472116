//! # Civil Registry
//!
//! Citizens, the documents the registry issues to them, and surveillance
//! orders opened for travellers flagged at the border.
//!
//! ## Identifier Generation
//!
//! JMBG (13 digits), identity card numbers (`0` + 8 digits) and passport
//! numbers (9 digits) are drawn at random and claimed in a unique index
//! inside the issuing write transaction. A taken candidate is discarded and
//! a new one drawn, so two concurrent issuances can never end up with the
//! same number.

use crate::border::SuspiciousPerson;
use crate::identity::Role;
use crate::storage::{RecordReader, RecordStore, WriteScope};
use crate::validation::{DocumentClaim, validate_claim};
use crate::{DocumentRejection, EupravaError, RecordId, RecordIdSet};
use chrono::{DateTime, Months, NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Unique index: JMBG -> citizen id
pub const CITIZEN_BY_JMBG: &str = "idx_citizen_jmbg";
/// Unique index: username -> citizen id
pub const CITIZEN_BY_USERNAME: &str = "idx_citizen_username";
/// Unique index: identity card number -> citizen id
pub const CARD_NUMBERS: &str = "idx_card_number";
/// Unique index: passport number -> citizen id
pub const PASSPORT_NUMBERS: &str = "idx_passport_number";
/// Unique index: JMBG -> surveillance order id
pub const SURVEILLANCE_BY_JMBG: &str = "idx_surveillance_jmbg";

/// Attempts at drawing an unused number before giving up.
const MAX_GENERATION_ATTEMPTS: usize = 1000;

const IDENTITY_CARD_VALIDITY: Months = Months::new(5 * 12);
const PASSPORT_VALIDITY: Months = Months::new(10 * 12);
const DRIVING_LICENCE_VALIDITY: Months = Months::new(10 * 12);
const VEHICLE_REGISTRATION_VALIDITY: Months = Months::new(12);

// =============================================================================
// DOCUMENTS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    #[serde(rename = "Muski")]
    Male,
    #[serde(rename = "Zenski")]
    Female,
}

/// Driving licence category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LicenceCategory {
    A,
    B,
    C,
    D,
    F,
}

/// Holder data and validity period common to every issued document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "ime")]
    pub first_name: String,
    #[serde(rename = "prezime")]
    pub last_name: String,
    #[serde(rename = "datumRodjenja")]
    pub date_of_birth: NaiveDate,
    #[serde(rename = "mestoRodjenja")]
    pub place_of_birth: String,
    #[serde(rename = "izdato")]
    pub issued: NaiveDate,
    #[serde(rename = "istice")]
    pub expires: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityCard {
    #[serde(rename = "dokument")]
    pub document: Document,
    #[serde(rename = "pol")]
    pub sex: Sex,
    #[serde(rename = "jmbg")]
    pub jmbg: String,
    #[serde(rename = "brojLicneKarte")]
    pub card_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passport {
    #[serde(rename = "dokument")]
    pub document: Document,
    #[serde(rename = "pol")]
    pub sex: Sex,
    #[serde(rename = "drzavljanstvo")]
    pub citizenship: String,
    #[serde(rename = "brojPasosa")]
    pub passport_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrivingLicence {
    #[serde(rename = "dokument")]
    pub document: Document,
    #[serde(rename = "kategorija")]
    pub category: LicenceCategory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleRegistration {
    #[serde(rename = "markaVozila")]
    pub make: String,
    #[serde(rename = "modelVozila")]
    pub model: String,
    #[serde(rename = "izdato")]
    pub issued: NaiveDate,
    #[serde(rename = "istice")]
    pub expires: NaiveDate,
}

// =============================================================================
// CITIZENS AND ORDERS
// =============================================================================

/// A registry account and the documents issued to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citizen {
    pub id: RecordId,
    #[serde(rename = "ime")]
    pub first_name: String,
    #[serde(rename = "prezime")]
    pub last_name: String,
    #[serde(rename = "korisnickoIme")]
    pub username: String,
    #[serde(rename = "licnaKarta")]
    pub identity_card: Option<IdentityCard>,
    #[serde(rename = "pasos")]
    pub passport: Option<Passport>,
    #[serde(rename = "saobracajna")]
    pub vehicle_registration: Option<VehicleRegistration>,
    #[serde(rename = "vozacka")]
    pub driving_licence: Option<DrivingLicence>,
    #[serde(rename = "rola")]
    pub role: Role,
}

impl Citizen {
    /// JMBG from the identity card, if one was issued.
    #[must_use]
    pub fn jmbg(&self) -> Option<&str> {
        self.identity_card.as_ref().map(|card| card.jmbg.as_str())
    }
}

crate::impl_record!(Citizen, "citizens", "citizen");

/// Order to keep a flagged citizen under surveillance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveillanceOrder {
    pub id: RecordId,
    /// Snapshot of the citizen at the time the order was opened.
    #[serde(rename = "gradjanin")]
    pub citizen: Citizen,
    #[serde(rename = "opis")]
    pub note: String,
    #[serde(rename = "datum")]
    pub opened_at: DateTime<Utc>,
}

crate::impl_record!(SurveillanceOrder, "surveillance_orders", "surveillance order");

// =============================================================================
// REQUESTS
// =============================================================================

/// Account registration data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCitizen {
    #[serde(rename = "ime")]
    pub first_name: String,
    #[serde(rename = "prezime")]
    pub last_name: String,
    #[serde(rename = "korisnickoIme")]
    pub username: String,
    #[serde(rename = "rola", default = "default_role")]
    pub role: Role,
}

const fn default_role() -> Role {
    Role::Citizen
}

/// Holder data supplied when a document is requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolderDetails {
    #[serde(rename = "ime")]
    pub first_name: String,
    #[serde(rename = "prezime")]
    pub last_name: String,
    #[serde(rename = "datumRodjenja")]
    pub date_of_birth: NaiveDate,
    #[serde(rename = "mestoRodjenja")]
    pub place_of_birth: String,
}

impl HolderDetails {
    fn validate(&self) -> Result<(), EupravaError> {
        require_text("ime", &self.first_name)?;
        require_text("prezime", &self.last_name)?;
        require_text("mestoRodjenja", &self.place_of_birth)
    }

    fn into_document(self, issued: NaiveDate, validity: Months) -> Result<Document, EupravaError> {
        Ok(Document {
            first_name: self.first_name,
            last_name: self.last_name,
            date_of_birth: self.date_of_birth,
            place_of_birth: self.place_of_birth,
            issued,
            expires: add_months(issued, validity)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityCardRequest {
    #[serde(rename = "dokument")]
    pub holder: HolderDetails,
    #[serde(rename = "pol")]
    pub sex: Sex,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassportRequest {
    #[serde(rename = "dokument")]
    pub holder: HolderDetails,
    #[serde(rename = "pol")]
    pub sex: Sex,
    #[serde(rename = "drzavljanstvo")]
    pub citizenship: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrivingLicenceRequest {
    #[serde(rename = "dokument")]
    pub holder: HolderDetails,
    #[serde(rename = "kategorija")]
    pub category: LicenceCategory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleRegistrationRequest {
    #[serde(rename = "markaVozila")]
    pub make: String,
    #[serde(rename = "modelVozila")]
    pub model: String,
}

/// Outcome of a surveillance sweep over flagged travellers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveillanceSummary {
    #[serde(rename = "kreirani")]
    pub created: Vec<SurveillanceOrder>,
    /// Flagged travellers whose JMBG already has an order.
    #[serde(rename = "vecPostoje")]
    pub already_covered: usize,
    /// Flagged travellers with no matching citizen.
    #[serde(rename = "nepoznati")]
    pub unknown: usize,
}

fn require_text(field: &str, value: &str) -> Result<(), EupravaError> {
    if value.trim().is_empty() {
        return Err(EupravaError::InvalidRequest(format!("{} is required", field)));
    }
    Ok(())
}

fn add_months(date: NaiveDate, months: Months) -> Result<NaiveDate, EupravaError> {
    date.checked_add_months(months)
        .ok_or_else(|| EupravaError::InvalidRequest(format!("date {} out of range", date)))
}

// =============================================================================
// NUMBER GENERATORS
// =============================================================================

fn digits(rng: &mut impl Rng, count: usize) -> String {
    (0..count)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// A random 13-digit JMBG.
pub fn generate_jmbg(rng: &mut impl Rng) -> String {
    digits(rng, 13)
}

/// A random identity card number: `0` followed by 8 digits.
pub fn generate_card_number(rng: &mut impl Rng) -> String {
    format!("0{}", digits(rng, 8))
}

/// A random 9-digit passport number.
pub fn generate_passport_number(rng: &mut impl Rng) -> String {
    digits(rng, 9)
}

/// Draw candidates until one can be claimed in `index` for `owner`.
fn claim_unique(
    scope: &mut WriteScope<'_>,
    index: &'static str,
    owner: RecordId,
    mut generate: impl FnMut() -> String,
) -> Result<String, EupravaError> {
    for _ in 0..MAX_GENERATION_ATTEMPTS {
        let candidate = generate();
        if scope.claim(index, &candidate, owner)? {
            return Ok(candidate);
        }
    }
    Err(EupravaError::Storage(format!(
        "no unused value left in {} after {} attempts",
        index, MAX_GENERATION_ATTEMPTS
    )))
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Registry operations over a shared record store.
#[derive(Debug, Clone)]
pub struct Registry {
    store: Arc<RecordStore>,
}

impl Registry {
    #[must_use]
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    /// Register a citizen account.
    pub fn register(&self, new: NewCitizen) -> Result<Citizen, EupravaError> {
        require_text("ime", &new.first_name)?;
        require_text("prezime", &new.last_name)?;
        require_text("korisnickoIme", &new.username)?;

        self.store.write(|scope| {
            let mut citizen = Citizen {
                id: RecordId::UNASSIGNED,
                first_name: new.first_name,
                last_name: new.last_name,
                username: new.username,
                identity_card: None,
                passport: None,
                vehicle_registration: None,
                driving_licence: None,
                role: new.role,
            };
            let id = scope.insert(&mut citizen)?;
            if !scope.claim(CITIZEN_BY_USERNAME, &citizen.username, id)? {
                return Err(EupravaError::Conflict(format!(
                    "username '{}' is already registered",
                    citizen.username
                )));
            }
            Ok(citizen)
        })
    }

    /// Issue an identity card, allocating the citizen's JMBG.
    pub fn issue_identity_card(
        &self,
        citizen_id: RecordId,
        request: IdentityCardRequest,
        today: NaiveDate,
        rng: &mut impl Rng,
    ) -> Result<Citizen, EupravaError> {
        request.holder.validate()?;
        self.store.write(|scope| {
            let mut citizen: Citizen = scope.require(citizen_id)?;
            if citizen.identity_card.is_some() {
                return Err(EupravaError::AlreadyFiled(format!(
                    "citizen {} already holds an identity card",
                    citizen_id
                )));
            }

            let jmbg = claim_unique(scope, CITIZEN_BY_JMBG, citizen_id, || generate_jmbg(rng))?;
            let card_number =
                claim_unique(scope, CARD_NUMBERS, citizen_id, || generate_card_number(rng))?;

            citizen.identity_card = Some(IdentityCard {
                document: request.holder.into_document(today, IDENTITY_CARD_VALIDITY)?,
                sex: request.sex,
                jmbg,
                card_number,
            });
            scope.put(&citizen)?;
            Ok(citizen)
        })
    }

    /// Issue a passport. Requires an identity card.
    pub fn issue_passport(
        &self,
        citizen_id: RecordId,
        request: PassportRequest,
        today: NaiveDate,
        rng: &mut impl Rng,
    ) -> Result<Citizen, EupravaError> {
        request.holder.validate()?;
        require_text("drzavljanstvo", &request.citizenship)?;
        self.store.write(|scope| {
            let mut citizen = require_card_holder(&*scope, citizen_id)?;
            if citizen.passport.is_some() {
                return Err(EupravaError::AlreadyFiled(format!(
                    "citizen {} already holds a passport",
                    citizen_id
                )));
            }

            let passport_number = claim_unique(scope, PASSPORT_NUMBERS, citizen_id, || {
                generate_passport_number(rng)
            })?;
            citizen.passport = Some(Passport {
                document: request.holder.into_document(today, PASSPORT_VALIDITY)?,
                sex: request.sex,
                citizenship: request.citizenship,
                passport_number,
            });
            scope.put(&citizen)?;
            Ok(citizen)
        })
    }

    /// Issue a driving licence. Requires an identity card.
    pub fn issue_driving_licence(
        &self,
        citizen_id: RecordId,
        request: DrivingLicenceRequest,
        today: NaiveDate,
    ) -> Result<Citizen, EupravaError> {
        request.holder.validate()?;
        self.store.write(|scope| {
            let mut citizen = require_card_holder(&*scope, citizen_id)?;
            if citizen.driving_licence.is_some() {
                return Err(EupravaError::AlreadyFiled(format!(
                    "citizen {} already holds a driving licence",
                    citizen_id
                )));
            }
            citizen.driving_licence = Some(DrivingLicence {
                document: request.holder.into_document(today, DRIVING_LICENCE_VALIDITY)?,
                category: request.category,
            });
            scope.put(&citizen)?;
            Ok(citizen)
        })
    }

    /// Issue a vehicle registration. Requires an identity card.
    pub fn issue_vehicle_registration(
        &self,
        citizen_id: RecordId,
        request: VehicleRegistrationRequest,
        today: NaiveDate,
    ) -> Result<Citizen, EupravaError> {
        require_text("markaVozila", &request.make)?;
        require_text("modelVozila", &request.model)?;
        self.store.write(|scope| {
            let mut citizen = require_card_holder(&*scope, citizen_id)?;
            if citizen.vehicle_registration.is_some() {
                return Err(EupravaError::AlreadyFiled(format!(
                    "citizen {} already holds a vehicle registration",
                    citizen_id
                )));
            }
            citizen.vehicle_registration = Some(VehicleRegistration {
                make: request.make,
                model: request.model,
                issued: today,
                expires: add_months(today, VEHICLE_REGISTRATION_VALIDITY)?,
            });
            scope.put(&citizen)?;
            Ok(citizen)
        })
    }

    /// All registered citizens.
    pub fn citizens(&self) -> Result<Vec<Citizen>, EupravaError> {
        self.store.list()
    }

    /// The JMBG of a citizen. `NotFound` until an identity card is issued.
    pub fn jmbg_of(&self, citizen_id: RecordId) -> Result<String, EupravaError> {
        let citizen: Citizen = self.store.require(citizen_id)?;
        citizen
            .jmbg()
            .map(str::to_string)
            .ok_or_else(|| EupravaError::not_found("JMBG of citizen", citizen_id))
    }

    /// Find a citizen by JMBG.
    pub fn find_by_jmbg(&self, jmbg: &str) -> Result<Option<Citizen>, EupravaError> {
        self.store.read(|scope| citizen_by_jmbg(scope, jmbg))
    }

    /// Check a traveller's document claim against the registry.
    ///
    /// The outer `Result` carries store failures, the inner one the verdict.
    pub fn validate(
        &self,
        claim: &DocumentClaim,
        today: NaiveDate,
    ) -> Result<Result<(), DocumentRejection>, EupravaError> {
        let record = self.find_by_jmbg(&claim.jmbg)?;
        Ok(validate_claim(claim, record.as_ref(), today))
    }

    /// Open surveillance orders for flagged travellers.
    ///
    /// Suspects are de-duplicated by record id. A JMBG that already has an
    /// order, or appears twice in the batch, gets no second order. Suspects
    /// with no matching citizen are counted and skipped.
    pub fn open_surveillance_orders(
        &self,
        suspects: &[SuspiciousPerson],
        now: DateTime<Utc>,
    ) -> Result<SurveillanceSummary, EupravaError> {
        let unique = RecordIdSet::dedup_by_id(suspects, |suspect| suspect.id);

        self.store.write(|scope| {
            let mut summary = SurveillanceSummary::default();
            for suspect in unique {
                let jmbg = &suspect.crossing.traveller_jmbg;
                if scope.lookup(SURVEILLANCE_BY_JMBG, jmbg)?.is_some() {
                    summary.already_covered += 1;
                    continue;
                }
                let Some(citizen) = citizen_by_jmbg(&*scope, jmbg)? else {
                    summary.unknown += 1;
                    continue;
                };

                let mut order = SurveillanceOrder {
                    id: RecordId::UNASSIGNED,
                    citizen,
                    note: suspect.note.clone(),
                    opened_at: now,
                };
                let id = scope.insert(&mut order)?;
                scope.claim(SURVEILLANCE_BY_JMBG, jmbg, id)?;
                summary.created.push(order);
            }
            Ok(summary)
        })
    }

    /// All surveillance orders.
    pub fn surveillance_orders(&self) -> Result<Vec<SurveillanceOrder>, EupravaError> {
        self.store.list()
    }
}

fn citizen_by_jmbg(scope: &impl RecordReader, jmbg: &str) -> Result<Option<Citizen>, EupravaError> {
    match scope.lookup(CITIZEN_BY_JMBG, jmbg)? {
        Some(id) => scope.get(id),
        None => Ok(None),
    }
}

fn require_card_holder(
    scope: &WriteScope<'_>,
    citizen_id: RecordId,
) -> Result<Citizen, EupravaError> {
    let citizen: Citizen = scope.require(citizen_id)?;
    if citizen.identity_card.is_none() {
        return Err(EupravaError::Conflict(format!(
            "citizen {} has no identity card",
            citizen_id
        )));
    }
    Ok(citizen)
}

// =============================================================================
// TESTS
// =============================================================================

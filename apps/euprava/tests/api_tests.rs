//! Single-service API tests.
//!
//! Each test drives one office router in-process. Peers point at a closed
//! port, so any route that needs another office sees it as unavailable.

#![allow(clippy::unwrap_used, clippy::panic)]

use axum::http::StatusCode;
use axum_test::TestServer;
use chrono::Utc;
use ed25519_dalek::SigningKey;
use euprava::api::{AppState, HealthResponse, create_router};
use euprava::config::{PeerConfig, Service, ServiceConfig};
use euprava::token::TokenSigner;
use euprava_core::{
    BreakerState, Case, Channel, Citizen, Claims, Hearing, Message, RecordStore, Role, Verdict,
};
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

// =============================================================================
// HARNESS
// =============================================================================

const UNREACHABLE: &str = "127.0.0.1:9";

fn signer() -> TokenSigner {
    TokenSigner::from_key(SigningKey::from_bytes(&[7u8; 32]))
}

fn token(role: Role, sub: u64) -> String {
    signer()
        .issue(&Claims {
            sub,
            role,
            exp: Utc::now().timestamp() + 3600,
        })
        .unwrap()
}

fn config(auth: bool) -> ServiceConfig {
    let mut config = ServiceConfig {
        peers: PeerConfig {
            border: UNREACHABLE.into(),
            registry: UNREACHABLE.into(),
            prosecution: UNREACHABLE.into(),
            court: UNREACHABLE.into(),
        },
        rate_limit: 0,
        request_deadline_ms: 2_000,
        ..ServiceConfig::default()
    };
    if auth {
        config.auth.verifying_key = Some(signer().verifying_key_base64());
    }
    config
}

fn server_with(service: Service, config: ServiceConfig) -> TestServer {
    let store = Arc::new(RecordStore::in_memory().unwrap());
    let state = AppState::new(service, Arc::new(config), store).unwrap();
    TestServer::new(create_router(state)).unwrap()
}

fn server(service: Service) -> TestServer {
    server_with(service, config(true))
}

fn holder() -> Value {
    json!({
        "ime": "Marko",
        "prezime": "Markovic",
        "datumRodjenja": "1990-01-01",
        "mestoRodjenja": "Novi Sad"
    })
}

/// Register a citizen and issue both travel documents.
async fn documented_citizen(registry: &TestServer) -> Citizen {
    let police = token(Role::Police, 1);
    let citizen: Citizen = registry
        .post("/kreirajKorisnika")
        .json(&json!({"ime": "Marko", "prezime": "Markovic", "korisnickoIme": "marko"}))
        .await
        .json();
    registry
        .put(&format!("/kreirajLicnuKartu/{}", citizen.id))
        .authorization_bearer(&police)
        .json(&json!({"dokument": holder(), "pol": "Muski"}))
        .await
        .assert_status(StatusCode::CREATED);
    let response = registry
        .put(&format!("/kreirajPasos/{}", citizen.id))
        .authorization_bearer(&police)
        .json(&json!({"dokument": holder(), "pol": "Muski", "drzavljanstvo": "Srbija"}))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json()
}

fn claim_of(citizen: &Citizen) -> Value {
    let card = citizen.identity_card.as_ref().unwrap();
    let passport = citizen.passport.as_ref().unwrap();
    json!({
        "jmbg": card.jmbg,
        "ime": "Marko",
        "prezime": "Markovic",
        "brojLicneKarte": card.card_number,
        "brojPasosa": passport.passport_number,
        "drzavljanstvo": "Srbija"
    })
}

// =============================================================================
// HEALTH AND AUTHENTICATION
// =============================================================================

#[tokio::test]
async fn health_is_public_and_reports_breakers() {
    let server = server(Service::Court);

    let response = server.get("/health").await;
    response.assert_status_ok();
    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
    assert_eq!(health.service, "court");
    assert_eq!(health.breakers.len(), 4);
    assert!(
        health
            .breakers
            .values()
            .all(|snapshot| snapshot.state == BreakerState::Closed)
    );
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let server = server(Service::Prosecution);
    server
        .get("/dobaviSporazume")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn forged_token_is_unauthorized() {
    let server = server(Service::Prosecution);
    let forged = TokenSigner::from_key(SigningKey::from_bytes(&[9u8; 32]))
        .issue(&Claims {
            sub: 1,
            role: Role::Prosecutor,
            exp: Utc::now().timestamp() + 3600,
        })
        .unwrap();
    server
        .get("/dobaviSporazume")
        .authorization_bearer(&forged)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_token_is_unauthorized() {
    let server = server(Service::Prosecution);
    let expired = signer()
        .issue(&Claims {
            sub: 1,
            role: Role::Prosecutor,
            exp: Utc::now().timestamp() - 1,
        })
        .unwrap();
    server
        .get("/dobaviSporazume")
        .authorization_bearer(&expired)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_role_is_forbidden() {
    let server = server(Service::Prosecution);
    server
        .get("/dobaviSporazume")
        .authorization_bearer(token(Role::Citizen, 3))
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn routes_of_other_offices_are_not_served() {
    let server = server(Service::Court);
    server
        .get("/prelaz/all")
        .authorization_bearer(token(Role::BorderOfficer, 1))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn identity_is_required_when_auth_is_disabled() {
    let server = server_with(Service::Court, config(false));

    server.get("/predmeti").await.assert_status_ok();
    // Opening a case needs a judge id and there is no caller identity.
    server
        .post("/predmeti/zahtjevi")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

// =============================================================================
// REGISTRY
// =============================================================================

#[tokio::test]
async fn registered_citizen_documents_validate() {
    let registry = server(Service::Registry);
    let citizen = documented_citizen(&registry).await;
    let officer = token(Role::BorderOfficer, 2);

    registry
        .post("/validirajDokumente")
        .authorization_bearer(&officer)
        .json(&claim_of(&citizen))
        .await
        .assert_status_ok();

    let mut wrong_name = claim_of(&citizen);
    wrong_name["prezime"] = json!("Petrovic");
    let response = registry
        .post("/validirajDokumente")
        .authorization_bearer(&officer)
        .json(&wrong_name)
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert_eq!(body["rejection"]["reason"], "mismatch");
    assert_eq!(body["rejection"]["field"], "last_name");
}

#[tokio::test]
async fn unknown_jmbg_is_rejected_with_reason() {
    let registry = server(Service::Registry);
    let response = registry
        .post("/validirajDokumente")
        .authorization_bearer(token(Role::BorderOfficer, 2))
        .json(&json!({
            "jmbg": "0101990710006",
            "ime": "Nikola",
            "prezime": "Nikolic",
            "brojLicneKarte": "000000001",
            "brojPasosa": "000000001",
            "drzavljanstvo": "Srbija"
        }))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert_eq!(body["rejection"]["reason"], "subject_not_found");
}

#[tokio::test]
async fn jmbg_lookup_of_unknown_citizen_is_not_found() {
    let registry = server(Service::Registry);
    registry
        .get("/dobaviJmbgKorisnika/42")
        .authorization_bearer(token(Role::Prosecutor, 5))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

/// A registry router over an on-disk record database.
fn registry_at(path: &Path) -> TestServer {
    let store = Arc::new(RecordStore::open(path).unwrap());
    let state = AppState::new(Service::Registry, Arc::new(config(true)), store).unwrap();
    TestServer::new(create_router(state)).unwrap()
}

#[tokio::test]
async fn registry_records_survive_a_restart() {
    let temp = tempdir().unwrap();
    let db_path = temp.path().join("registry.redb");

    let citizen = {
        let registry = registry_at(&db_path);
        documented_citizen(&registry).await
    };

    let registry = registry_at(&db_path);
    let citizens: Vec<Citizen> = registry
        .get("/dobaviKorisnike")
        .authorization_bearer(token(Role::Police, 1))
        .await
        .json();
    assert_eq!(citizens, vec![citizen.clone()]);

    // Id counters and unique indexes were persisted too.
    registry
        .post("/kreirajKorisnika")
        .json(&json!({"ime": "Marko", "prezime": "Markovic", "korisnickoIme": "marko"}))
        .await
        .assert_status(StatusCode::FORBIDDEN);
    let second: Citizen = registry
        .post("/kreirajKorisnika")
        .json(&json!({"ime": "Ana", "prezime": "Anic", "korisnickoIme": "ana"}))
        .await
        .json();
    assert_eq!(second.id.value(), citizen.id.value() + 1);
}

#[tokio::test]
async fn surveillance_sweep_fails_fast_without_border() {
    let registry = server(Service::Registry);
    registry
        .post("/kreirajNalogZaPracenje")
        .authorization_bearer(token(Role::Police, 1))
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

// =============================================================================
// BORDER
// =============================================================================

#[tokio::test]
async fn crossing_is_not_recorded_without_registry() {
    let border = server(Service::Border);
    let officer = token(Role::BorderOfficer, 2);

    border
        .post("/prelaz/new")
        .authorization_bearer(&officer)
        .json(&json!({
            "imePutnika": "Marko",
            "prezimePutnika": "Markovic",
            "JMBGPutnika": "0101990710006",
            "brojLicneKartePutnika": "123456789",
            "brojPasosaPutnika": "987654321",
            "drzavljanstvoPutnika": "Srbija"
        }))
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);

    let crossings: Vec<Value> = border
        .get("/prelaz/all")
        .authorization_bearer(&officer)
        .await
        .json();
    assert!(crossings.is_empty());
}

#[tokio::test]
async fn incomplete_crossing_is_bad_request() {
    let border = server(Service::Border);
    border
        .post("/prelaz/new")
        .authorization_bearer(token(Role::BorderOfficer, 2))
        .json(&json!({
            "imePutnika": "Marko",
            "prezimePutnika": "",
            "JMBGPutnika": "0101990710006",
            "brojLicneKartePutnika": "123456789",
            "brojPasosaPutnika": "987654321",
            "drzavljanstvoPutnika": "Srbija"
        }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn flagging_unknown_crossing_is_not_found() {
    let border = server(Service::Border);
    border
        .put("/sumnjivo-lice/new/77")
        .authorization_bearer(token(Role::Police, 1))
        .json(&json!({"opis": "nervous"}))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

// =============================================================================
// PROSECUTION
// =============================================================================

#[tokio::test]
async fn filing_without_border_is_unavailable() {
    let prosecution = server(Service::Prosecution);
    prosecution
        .post("/kreirajZahtevZaSudskiPostupak/1")
        .authorization_bearer(token(Role::Prosecutor, 5))
        .json(&json!({"opis": "smuggling"}))
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);

    let requests: Vec<Value> = prosecution
        .get("/dobaviZahteveZaSudskiPostupak")
        .authorization_bearer(token(Role::Prosecutor, 5))
        .await
        .json();
    assert!(requests.is_empty());
}

#[tokio::test]
async fn plea_terms_are_required() {
    let prosecution = server(Service::Prosecution);
    prosecution
        .post("/kreirajZahtevZaSklapanjeSporazuma/1")
        .authorization_bearer(token(Role::Prosecutor, 5))
        .json(&json!({"opis": "smuggling"}))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn citizen_cannot_read_another_citizens_deals() {
    let prosecution = server(Service::Prosecution);
    prosecution
        .get("/gradjanin/sporazumi/8")
        .authorization_bearer(token(Role::Citizen, 3))
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn accepting_unknown_plea_deal_is_not_found() {
    let prosecution = server(Service::Prosecution);
    prosecution
        .put("/prihvatiZahtev/12")
        .authorization_bearer(token(Role::Prosecutor, 5))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn channel_messages_carry_the_callers_role() {
    let prosecution = server(Service::Prosecution);
    let prosecutor = token(Role::Prosecutor, 5);
    let investigator = token(Role::Investigator, 6);

    let response = prosecution
        .post("/kanali")
        .authorization_bearer(&prosecutor)
        .json(&json!({"ime": "Slucaj 17", "opis": "border smuggling"}))
        .await;
    response.assert_status(StatusCode::CREATED);
    let channel: Channel = response.json();

    prosecution
        .post(&format!("/kanali/{}/poruke", channel.id))
        .authorization_bearer(&investigator)
        .json(&json!({"sadrzaj": "witness found", "posiljalac": "Sudija"}))
        .await
        .assert_status(StatusCode::CREATED);

    let messages: Vec<Message> = prosecution
        .get(&format!("/kanali/{}/poruke", channel.id))
        .authorization_bearer(&prosecutor)
        .await
        .json();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].sender, Role::Investigator);

    prosecution
        .post("/kanali/999/poruke")
        .authorization_bearer(&investigator)
        .json(&json!({"sadrzaj": "lost"}))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    prosecution
        .get("/kanali")
        .authorization_bearer(token(Role::Judge, 7))
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

// =============================================================================
// COURT
// =============================================================================

fn judicial_request(id: u64) -> Value {
    json!({
        "id": id,
        "opis": "smuggling",
        "datum": "2026-01-10T09:00:00Z",
        "idTuzioca": 5,
        "krivicnaPrijava": {
            "id": 3,
            "datum": "2026-01-09T09:00:00Z",
            "opis": "undeclared goods",
            "prelaz": {
                "id": 2,
                "datum": "2026-01-08T09:00:00Z",
                "imePutnika": "Marko",
                "prezimePutnika": "Markovic",
                "JMBGPutnika": "0101990710006",
                "brojLicneKartePutnika": "123456789",
                "brojPasosaPutnika": "987654321",
                "drzavljanstvoPutnika": "Srbija",
                "markaVozila": "",
                "modelVozila": "",
                "svrhaPutovanja": "",
                "odobren": true
            }
        }
    })
}

#[tokio::test]
async fn case_hearing_and_verdict() {
    let court = server(Service::Court);
    let judge = token(Role::Judge, 7);

    let response = court
        .post("/predmeti")
        .authorization_bearer(&judge)
        .json(&json!({"opis": "State v. Markovic", "zahtev": judicial_request(4)}))
        .await;
    response.assert_status(StatusCode::CREATED);
    let case: Case = response.json();
    assert_eq!(case.judge_id, 7);

    // A request gets one case.
    court
        .post("/predmeti")
        .authorization_bearer(&judge)
        .json(&json!({"opis": "again", "zahtev": judicial_request(4)}))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let response = court
        .post(&format!("/termini/{}", case.id))
        .authorization_bearer(&judge)
        .json(&json!({
            "adresa": "Sutjeska 3",
            "datum": "2026-03-01T10:00:00Z",
            "prostorija": "12"
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let hearing: Hearing = response.json();

    let response = court
        .post(&format!("/presude/{}", hearing.id))
        .authorization_bearer(&judge)
        .json(&json!({"opis": "guilty"}))
        .await;
    response.assert_status(StatusCode::CREATED);
    let verdict: Verdict = response.json();

    let fetched: Verdict = court
        .get(&format!("/presude/{}", verdict.id))
        .authorization_bearer(&judge)
        .await
        .json();
    assert_eq!(fetched, verdict);

    court
        .get("/predmeti/99")
        .authorization_bearer(&judge)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn opening_cases_from_requests_needs_prosecution() {
    let court = server(Service::Court);
    court
        .post("/predmeti/zahtjevi")
        .authorization_bearer(token(Role::Judge, 7))
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

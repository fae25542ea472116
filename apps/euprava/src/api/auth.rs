//! # Authentication Module
//!
//! Bearer-token authentication and per-route access policy.
//!
//! ## Configuration
//!
//! - `auth.verifying_key` / `EUPRAVA_VERIFYING_KEY`: base64 ed25519 public
//!   key. If unset, authentication is disabled: every route is reachable and
//!   no caller identity is available.
//!
//! ## Usage
//!
//! ```text
//! Authorization: Bearer <token>
//! ```
//!
//! A missing, malformed, forged or expired token on a non-public route
//! answers 401. A valid token whose role no rule admits answers 403.

use super::error::ApiError;
use super::middleware::Deadline;
use crate::client::CallContext;
use crate::config::Service;
use crate::token::TokenVerifier;
use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{Request, header, request::Parts},
    middleware::Next,
    response::Response,
};
use euprava_core::{AccessPolicy, Claims, Decision, Role};
use std::convert::Infallible;
use std::sync::Arc;

// =============================================================================
// IDENTITY
// =============================================================================

/// Verified claims of the caller, inserted by [`auth_middleware`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity(pub Claims);

/// Who is calling, plus what an outbound call on their behalf needs.
#[derive(Debug, Clone)]
pub struct Caller {
    pub identity: Option<Claims>,
    pub ctx: CallContext,
}

impl Caller {
    /// The caller's verified claims, or 401.
    pub fn claims(&self) -> Result<&Claims, ApiError> {
        self.identity
            .as_ref()
            .ok_or_else(|| ApiError::unauthorized("a verified identity is required"))
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = parts.extensions.get::<Identity>().map(|id| id.0.clone());
        let deadline = parts.extensions.get::<Deadline>().map(|d| d.0);
        let bearer = bearer_token(parts).map(str::to_string);
        Ok(Self {
            identity,
            ctx: CallContext::new(deadline, bearer),
        })
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

// =============================================================================
// MIDDLEWARE
// =============================================================================

/// Verifier and policy of one service.
#[derive(Debug, Clone)]
pub struct AuthState {
    pub verifier: Option<TokenVerifier>,
    pub policy: Arc<AccessPolicy>,
}

/// Authenticate the caller and apply the access policy.
pub async fn auth_middleware(
    State(auth): State<AuthState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(verifier) = &auth.verifier else {
        return Ok(next.run(request).await);
    };

    let (mut parts, body) = request.into_parts();
    let method = parts.method.as_str().to_string();
    let path = parts.uri.path().to_string();

    let claims = match bearer_token(&parts) {
        None => None,
        Some(token) => match verifier.verify(token, chrono::Utc::now().timestamp()) {
            Ok(claims) => Some(claims),
            Err(_) if auth.policy.is_public(&method, &path) => None,
            Err(e) => {
                tracing::warn!(
                    event = "auth_failure",
                    reason = e.reason(),
                    method = %method,
                    path = %path,
                    "Authentication failed"
                );
                return Err(ApiError::unauthorized(e.to_string()));
            }
        },
    };

    match auth.policy.decide(claims.as_ref().map(|c| c.role), &method, &path) {
        Decision::Allow => {
            if let Some(claims) = claims {
                parts.extensions.insert(Identity(claims));
            }
            Ok(next.run(Request::from_parts(parts, body)).await)
        }
        Decision::Unauthenticated => {
            tracing::warn!(
                event = "auth_failure",
                reason = "missing_token",
                method = %method,
                path = %path,
                "Authentication failed"
            );
            Err(ApiError::unauthorized("Unauthorized"))
        }
        Decision::Forbidden => {
            tracing::warn!(
                event = "access_denied",
                role = %claims.as_ref().map(|c| c.role.as_str()).unwrap_or_default(),
                method = %method,
                path = %path,
                "Access denied by policy"
            );
            Err(ApiError::forbidden("role may not call this route"))
        }
    }
}

// =============================================================================
// DEFAULT POLICIES
// =============================================================================

/// Route table of a service.
#[must_use]
pub fn default_policy(service: Service) -> AccessPolicy {
    use Role::{BorderOfficer, Citizen, Investigator, Judge, Police, Prosecutor};

    let policy = AccessPolicy::new().public("GET", "/health");
    match service {
        Service::Border => policy
            .allow_roles(&[BorderOfficer, Police], "POST", "/prelaz/new")
            .allow_roles(&[BorderOfficer, Police], "GET", "/prelaz/all")
            .allow_roles(&[BorderOfficer, Police], "PUT", "/sumnjivo-lice/new/{id}")
            .allow_roles(&[BorderOfficer, Police], "GET", "/sumnjivo-lice/all")
            .allow_roles(&[BorderOfficer, Police], "PUT", "/krivicna-prijava/new/{id}")
            .allow_roles(&[BorderOfficer, Police, Prosecutor], "GET", "/krivicna-prijava/all")
            .allow_roles(&[BorderOfficer, Police, Prosecutor], "GET", "/krivicna-prijava/{id}"),
        Service::Registry => policy
            .public("POST", "/kreirajKorisnika")
            .allow_roles(&[Police], "GET", "/dobaviKorisnike")
            .allow_roles(&[Police], "PUT", "/kreirajLicnuKartu/{id}")
            .allow_roles(&[Police], "PUT", "/kreirajPasos/{id}")
            .allow_roles(&[Police], "PUT", "/kreirajVozackuDozvolu/{id}")
            .allow_roles(&[Police], "PUT", "/kreirajSaobracajnuDozvolu/{id}")
            .allow_roles(&[Citizen, Police, Prosecutor], "GET", "/dobaviJmbgKorisnika/{id}")
            .allow_roles(&[BorderOfficer, Police], "POST", "/validirajDokumente")
            .allow_roles(&[Police], "POST", "/kreirajNalogZaPracenje")
            .allow_roles(&[Police], "GET", "/dobaviNalogeZaPracenje"),
        Service::Prosecution => policy
            .allow_roles(&[Prosecutor], "POST", "/kreirajZahtevZaSudskiPostupak/{id}")
            .allow_roles(&[Prosecutor], "POST", "/kreirajZahtevZaSklapanjeSporazuma/{id}")
            .allow_roles(&[Prosecutor, Citizen], "PUT", "/prihvatiZahtev/{id}")
            .allow_roles(&[Prosecutor, Citizen], "PUT", "/odbijZahtev/{id}")
            .allow_roles(&[Prosecutor, Judge], "GET", "/dobaviZahteveZaSudskiPostupak")
            .allow_roles(&[Prosecutor], "GET", "/dobaviZahteveZaSklapanjeSporazuma")
            .allow_roles(&[Prosecutor], "GET", "/dobaviSporazume")
            .allow_roles(&[Prosecutor], "GET", "/krivicnePrijave")
            .allow_roles(&[Prosecutor, Citizen], "GET", "/gradjanin/zahteviZaSporazum/{id}")
            .allow_roles(&[Prosecutor, Citizen], "GET", "/gradjanin/sporazumi/{id}")
            .allow_roles(&[Prosecutor, Investigator], "POST", "/kanali")
            .allow_roles(&[Prosecutor, Investigator], "GET", "/kanali")
            .allow_roles(&[Prosecutor, Investigator], "POST", "/kanali/{id}/poruke")
            .allow_roles(&[Prosecutor, Investigator], "GET", "/kanali/{id}/poruke"),
        Service::Court => policy
            .allow_roles(&[Judge], "GET", "/predmeti")
            .allow_roles(&[Judge], "POST", "/predmeti")
            .allow_roles(&[Judge], "GET", "/predmeti/{id}")
            .allow_roles(&[Judge], "POST", "/predmeti/zahtjevi")
            .allow_roles(&[Judge], "GET", "/termini")
            .allow_roles(&[Judge], "GET", "/termini/{id}")
            .allow_roles(&[Judge], "POST", "/termini/{id}")
            .allow_roles(&[Judge], "GET", "/presude")
            .allow_roles(&[Judge], "GET", "/presude/{id}")
            .allow_roles(&[Judge], "POST", "/presude/{id}"),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn health_is_public_everywhere() {
        for service in [
            Service::Border,
            Service::Registry,
            Service::Prosecution,
            Service::Court,
        ] {
            assert!(default_policy(service).is_public("GET", "/health"));
        }
    }

    #[test]
    fn prosecution_routes() {
        let policy = default_policy(Service::Prosecution);
        assert_eq!(
            policy.decide(Some(Role::Prosecutor), "POST", "/kreirajZahtevZaSudskiPostupak/4"),
            Decision::Allow
        );
        assert_eq!(
            policy.decide(Some(Role::Citizen), "POST", "/kreirajZahtevZaSudskiPostupak/4"),
            Decision::Forbidden
        );
        assert_eq!(
            policy.decide(None, "GET", "/dobaviSporazume"),
            Decision::Unauthenticated
        );
        assert_eq!(
            policy.decide(Some(Role::Judge), "GET", "/dobaviZahteveZaSudskiPostupak"),
            Decision::Allow
        );
    }

    #[test]
    fn border_feeds_are_open_to_peers() {
        let policy = default_policy(Service::Border);
        assert_eq!(
            policy.decide(Some(Role::Prosecutor), "GET", "/krivicna-prijava/7"),
            Decision::Allow
        );
        assert_eq!(
            policy.decide(Some(Role::Prosecutor), "PUT", "/krivicna-prijava/new/7"),
            Decision::Forbidden
        );
    }
}

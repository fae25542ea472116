//! # eUprava HTTP API Module
//!
//! One axum router per government office. A process serves exactly one
//! office and reaches the others through [`Upstream`].
//!
//! ## Endpoints
//!
//! Every service answers `GET /health`. The rest depends on the service:
//!
//! - border: `/prelaz/*`, `/sumnjivo-lice/*`, `/krivicna-prijava/*`
//! - registry: citizens, documents, `/validirajDokumente`, surveillance orders
//! - prosecution: judicial and plea-deal requests, settlements, `/kanali/*`
//! - court: `/predmeti/*`, `/termini/*`, `/presude/*`
//!
//! ## Middleware stack (outer to inner)
//!
//! 1. Tracing
//! 2. CORS
//! 3. Body limit (2 MiB)
//! 4. Rate limiting (if enabled)
//! 5. Request deadline
//! 6. Authentication and access policy (if a verifying key is configured)

pub mod auth;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod types;

pub use error::{ApiError, ErrorBody};
pub use types::{FiledResponse, HealthResponse, MessageResponse};

use crate::client::Upstream;
use crate::config::{Service, ServiceConfig};
use crate::token::TokenVerifier;
use crate::workflow::{CaseEscalationCoordinator, DocumentValidationGateway};
use auth::AuthState;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post, put},
};
use euprava_core::{
    BorderPost, Channels, Court, EupravaError, PleaDeals, ProsecutionLedger, RecordStore, Registry,
};
use handlers::{border, court, health, prosecution, registry};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared state of a service process.
#[derive(Clone)]
pub struct AppState {
    pub service: Service,
    pub config: Arc<ServiceConfig>,
    pub upstream: Upstream,
    pub border: BorderPost,
    pub registry: Registry,
    pub ledger: ProsecutionLedger,
    pub deals: PleaDeals,
    pub channels: Channels,
    pub court: Court,
    pub gateway: DocumentValidationGateway,
    pub coordinator: CaseEscalationCoordinator,
    auth: AuthState,
}

impl AppState {
    /// Wire the domain services over `store` and the peer clients from `config`.
    pub fn new(
        service: Service,
        config: Arc<ServiceConfig>,
        store: Arc<RecordStore>,
    ) -> Result<Self, EupravaError> {
        let upstream = Upstream::from_config(&config)?;
        let verifier = config
            .auth
            .verifying_key
            .as_deref()
            .map(TokenVerifier::from_base64)
            .transpose()?;

        let ledger = ProsecutionLedger::new(Arc::clone(&store));
        let deals = PleaDeals::new(Arc::clone(&store));
        let coordinator = CaseEscalationCoordinator::new(
            ledger.clone(),
            deals.clone(),
            upstream.border.clone(),
            upstream.registry.clone(),
        );

        Ok(Self {
            service,
            gateway: DocumentValidationGateway::new(upstream.registry.clone()),
            coordinator,
            border: BorderPost::new(Arc::clone(&store)),
            registry: Registry::new(Arc::clone(&store)),
            channels: Channels::new(Arc::clone(&store)),
            court: Court::new(store),
            ledger,
            deals,
            upstream,
            auth: AuthState {
                verifier,
                policy: Arc::new(auth::default_policy(service)),
            },
            config,
        })
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build the CORS layer from `cors_origins`.
///
/// - `*`: allows all origins
/// - unset: localhost only
/// - otherwise: a comma-separated list of allowed origins
fn build_cors_layer(origins: Option<&str>) -> CorsLayer {
    match origins {
        Some("*") => {
            tracing::warn!(
                "CORS: Allowing ALL origins (cors_origins = \"*\"). Do not use in production!"
            );
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!("CORS: No valid origins configured, defaulting to localhost only");
                build_localhost_cors()
            } else {
                with_methods(CorsLayer::new().allow_origin(allowed_origins))
            }
        }
        None => build_localhost_cors(),
    }
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|origin| origin.parse().ok())
    .collect();

    with_methods(CorsLayer::new().allow_origin(origins))
}

fn with_methods(cors: CorsLayer) -> CorsLayer {
    cors.allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

fn border_routes() -> Router<AppState> {
    Router::new()
        .route("/prelaz/new", post(border::record_crossing))
        .route("/prelaz/all", get(border::list_crossings))
        .route("/sumnjivo-lice/new/{id}", put(border::flag_suspicious))
        .route("/sumnjivo-lice/all", get(border::list_suspicious))
        .route("/krivicna-prijava/new/{id}", put(border::file_criminal_report))
        .route("/krivicna-prijava/all", get(border::list_criminal_reports))
        .route("/krivicna-prijava/{id}", get(border::get_criminal_report))
}

fn registry_routes() -> Router<AppState> {
    Router::new()
        .route("/kreirajKorisnika", post(registry::register_citizen))
        .route("/dobaviKorisnike", get(registry::list_citizens))
        .route("/kreirajLicnuKartu/{id}", put(registry::issue_identity_card))
        .route("/kreirajPasos/{id}", put(registry::issue_passport))
        .route("/kreirajVozackuDozvolu/{id}", put(registry::issue_driving_licence))
        .route(
            "/kreirajSaobracajnuDozvolu/{id}",
            put(registry::issue_vehicle_registration),
        )
        .route("/dobaviJmbgKorisnika/{id}", get(registry::citizen_jmbg))
        .route("/validirajDokumente", post(registry::validate_documents))
        .route(
            "/kreirajNalogZaPracenje",
            post(registry::open_surveillance_orders),
        )
        .route(
            "/dobaviNalogeZaPracenje",
            get(registry::list_surveillance_orders),
        )
}

fn prosecution_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/kreirajZahtevZaSudskiPostupak/{id}",
            post(prosecution::file_judicial_request),
        )
        .route(
            "/kreirajZahtevZaSklapanjeSporazuma/{id}",
            post(prosecution::file_plea_deal_request),
        )
        .route("/prihvatiZahtev/{id}", put(prosecution::accept_plea_deal))
        .route("/odbijZahtev/{id}", put(prosecution::reject_plea_deal))
        .route("/krivicnePrijave", get(prosecution::list_unescalated))
        .route(
            "/dobaviZahteveZaSudskiPostupak",
            get(prosecution::list_judicial_requests),
        )
        .route(
            "/dobaviZahteveZaSklapanjeSporazuma",
            get(prosecution::list_plea_deal_requests),
        )
        .route("/dobaviSporazume", get(prosecution::list_settlements))
        .route(
            "/gradjanin/zahteviZaSporazum/{id}",
            get(prosecution::citizen_plea_requests),
        )
        .route(
            "/gradjanin/sporazumi/{id}",
            get(prosecution::citizen_settlements),
        )
        .route(
            "/kanali",
            post(prosecution::create_channel).get(prosecution::list_channels),
        )
        .route(
            "/kanali/{id}/poruke",
            post(prosecution::post_message).get(prosecution::list_messages),
        )
}

fn court_routes() -> Router<AppState> {
    Router::new()
        .route("/predmeti", get(court::list_cases).post(court::open_case))
        .route("/predmeti/zahtjevi", post(court::open_cases_from_requests))
        .route("/predmeti/{id}", get(court::get_case))
        .route("/termini", get(court::list_hearings))
        .route(
            "/termini/{id}",
            get(court::get_hearing).post(court::schedule_hearing),
        )
        .route("/presude", get(court::list_verdicts))
        .route(
            "/presude/{id}",
            get(court::get_verdict).post(court::record_verdict),
        )
}

/// Create the router of the service named in `state`.
pub fn create_router(state: AppState) -> Router {
    let config = Arc::clone(&state.config);

    let routes = match state.service {
        Service::Border => border_routes(),
        Service::Registry => registry_routes(),
        Service::Prosecution => prosecution_routes(),
        Service::Court => court_routes(),
    };
    let mut router = Router::new()
        .route("/health", get(health::health_handler))
        .merge(routes);

    if state.auth.verifier.is_some() {
        tracing::info!("Token authentication enabled");
        // Unknown paths still answer 404 rather than 401.
        router = router.route_layer(axum_middleware::from_fn_with_state(
            state.auth.clone(),
            auth::auth_middleware,
        ));
    } else {
        tracing::warn!(
            "Token authentication DISABLED - every route is reachable and no caller identity \
             is available. Set EUPRAVA_VERIFYING_KEY to enable it."
        );
    }

    router = router.layer(axum_middleware::from_fn_with_state(
        config.request_deadline(),
        middleware::deadline_middleware,
    ));

    if config.rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", config.rate_limit);
        router = router.layer(axum_middleware::from_fn_with_state(
            middleware::create_rate_limiter(config.rate_limit),
            middleware::rate_limit_middleware,
        ));
    } else {
        tracing::info!("Rate limiting disabled");
    }

    router
        .layer(axum::extract::DefaultBodyLimit::max(2 * 1024 * 1024))
        .layer(build_cors_layer(config.cors_origins.as_deref()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Serve `state` on an already bound listener until `shutdown` resolves.
pub async fn serve(
    listener: tokio::net::TcpListener,
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), EupravaError> {
    let service = state.service;
    let router = create_router(state);
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("eUprava {} service listening on {}", service, addr);
    }
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| EupravaError::Config(format!("server error: {}", e)))
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn run_server(addr: &str, state: AppState) -> Result<(), EupravaError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| EupravaError::Config(format!("bind {} failed: {}", addr, e)))?;
    serve(listener, state, shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn app(cors_origins: Option<&str>) -> Router {
        let config = ServiceConfig {
            cors_origins: cors_origins.map(str::to_string),
            ..ServiceConfig::default()
        };
        let store = Arc::new(RecordStore::in_memory().unwrap());
        create_router(AppState::new(Service::Registry, Arc::new(config), store).unwrap())
    }

    fn preflight(origin: &str) -> Request<Body> {
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/kreirajPasos/1")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "PUT")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn localhost_preflight_allows_put() {
        let response = app(None)
            .oneshot(preflight("http://localhost:3000"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let methods = response.headers()[header::ACCESS_CONTROL_ALLOW_METHODS]
            .to_str()
            .unwrap();
        assert!(methods.contains("PUT"));
    }

    #[tokio::test]
    async fn unlisted_origin_gets_no_cors_headers() {
        let response = app(Some("https://euprava.gov.rs"))
            .oneshot(preflight("https://elsewhere.example"))
            .await
            .unwrap();
        assert!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .is_none()
        );
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let response = app(None)
            .oneshot(Request::get("/nepostoji").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

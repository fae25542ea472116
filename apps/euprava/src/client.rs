//! # Resilient Service Client
//!
//! Outbound HTTP calls to peer services, each guarded by a circuit breaker.
//!
//! - 5xx responses, transport errors and timeouts count as breaker failures.
//!   A 4xx is a healthy peer refusing the request and counts as a success.
//! - While the breaker is open, calls fail with [`ClientError::Unavailable`]
//!   without touching the network.
//! - The caller's deadline becomes the request timeout.
//!
//! Breaker transitions are logged here; the breaker itself only reports them.

use crate::config::{Service, ServiceConfig};
use euprava_core::breaker::{Permit, Transition};
use euprava_core::{BreakerSnapshot, CircuitBreaker, EupravaError, Outcome};
use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

// =============================================================================
// ERRORS
// =============================================================================

/// Errors from an outbound call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Breaker open; no request was sent.
    Unavailable {
        service: Service,
        retry_after: Duration,
    },
    /// The deadline elapsed before the peer answered.
    Timeout { service: Service },
    /// Connection refused, reset, DNS failure.
    Transport { service: Service, message: String },
    /// The peer answered with a non-2xx status.
    Status {
        service: Service,
        status: u16,
        body: String,
    },
    /// The response body is not what the endpoint promises.
    Parse { service: Service, message: String },
}

impl ClientError {
    #[must_use]
    pub const fn service(&self) -> Service {
        match self {
            Self::Unavailable { service, .. }
            | Self::Timeout { service }
            | Self::Transport { service, .. }
            | Self::Status { service, .. }
            | Self::Parse { service, .. } => *service,
        }
    }

    /// Status code of a `Status` error.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable {
                service,
                retry_after,
            } => write!(
                f,
                "{} service unavailable: circuit open, retry in {}ms",
                service,
                retry_after.as_millis()
            ),
            Self::Timeout { service } => write!(f, "{} service did not answer in time", service),
            Self::Transport { service, message } => {
                write!(f, "cannot reach {} service: {}", service, message)
            }
            Self::Status {
                service,
                status,
                body,
            } => write!(f, "{} service answered {}: {}", service, status, body),
            Self::Parse { service, message } => {
                write!(f, "unexpected response from {} service: {}", service, message)
            }
        }
    }
}

impl std::error::Error for ClientError {}

impl From<ClientError> for EupravaError {
    fn from(e: ClientError) -> Self {
        match &e {
            ClientError::Unavailable { .. }
            | ClientError::Timeout { .. }
            | ClientError::Transport { .. } => Self::Unavailable(e.to_string()),
            ClientError::Status { status, .. } if *status >= 500 => {
                Self::Unavailable(e.to_string())
            }
            ClientError::Status {
                status: 400 | 422,
                ..
            } => Self::InvalidRequest(e.to_string()),
            ClientError::Status { .. } => Self::UpstreamRejected(e.to_string()),
            ClientError::Parse { .. } => Self::Serialization(e.to_string()),
        }
    }
}

// =============================================================================
// CALL CONTEXT
// =============================================================================

/// Deadline and credentials of the inbound request an outbound call serves.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    deadline: Option<tokio::time::Instant>,
    bearer: Option<String>,
}

impl CallContext {
    #[must_use]
    pub fn new(deadline: Option<tokio::time::Instant>, bearer: Option<String>) -> Self {
        Self { deadline, bearer }
    }

    /// Time left before the deadline. `None` when there is no deadline.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(tokio::time::Instant::now()))
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.remaining().is_some_and(|left| left.is_zero())
    }
}

/// Successful response of a peer.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub body: Vec<u8>,
}

// =============================================================================
// RESILIENT CLIENT
// =============================================================================

/// HTTP client for one peer service.
#[derive(Debug, Clone)]
pub struct ResilientClient {
    http: reqwest::Client,
    base_url: String,
    service: Service,
    breaker: Arc<CircuitBreaker>,
}

impl ResilientClient {
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        base_url: String,
        service: Service,
        breaker: CircuitBreaker,
    ) -> Self {
        Self {
            http,
            base_url,
            service,
            breaker: Arc::new(breaker),
        }
    }

    #[must_use]
    pub const fn service(&self) -> Service {
        self.service
    }

    #[must_use]
    pub fn snapshot(&self) -> BreakerSnapshot {
        self.breaker.snapshot(Instant::now())
    }

    /// Send one request through the breaker.
    ///
    /// Returns the reply for a 2xx status, `ClientError::Status` otherwise.
    pub async fn call(
        &self,
        ctx: &CallContext,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<Reply, ClientError> {
        if ctx.is_expired() {
            return Err(ClientError::Timeout {
                service: self.service,
            });
        }

        let permit = match self.breaker.try_acquire(Instant::now()) {
            Ok((permit, transition)) => {
                self.log_transition(transition);
                permit
            }
            Err(rejected) => {
                tracing::warn!(
                    event = "breaker_open",
                    service = %self.service,
                    retry_after_ms = rejected.retry_after.as_millis() as u64,
                    "Call rejected: circuit open"
                );
                return Err(ClientError::Unavailable {
                    service: self.service,
                    retry_after: rejected.retry_after,
                });
            }
        };
        // Dropped unreported (caller cancelled) counts as a failure.
        let mut guard = PermitGuard {
            client: self,
            permit: Some(permit),
        };

        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.request(method, &url);
        if let Some(timeout) = ctx.remaining() {
            request = request.timeout(timeout);
        }
        if let Some(bearer) = &ctx.bearer {
            request = request.bearer_auth(bearer);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let result = match request.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                response
                    .bytes()
                    .await
                    .map(|bytes| (status, bytes.to_vec()))
                    .map_err(|e| self.transport_error(&e))
            }
            Err(e) => Err(self.transport_error(&e)),
        };

        let outcome = match &result {
            Ok((status, _)) => Outcome::from_status(*status),
            Err(_) => Outcome::Failure,
        };
        guard.finish(outcome);

        let (status, body) = result?;
        if (200..300).contains(&status) {
            Ok(Reply { status, body })
        } else {
            Err(ClientError::Status {
                service: self.service,
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            })
        }
    }

    /// GET `path` and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        path: &str,
    ) -> Result<T, ClientError> {
        let reply = self.call(ctx, Method::GET, path, None).await?;
        self.decode(&reply)
    }

    /// POST a JSON body to `path` and decode the JSON reply.
    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let body = serde_json::to_value(body).map_err(|e| ClientError::Parse {
            service: self.service,
            message: e.to_string(),
        })?;
        let reply = self.call(ctx, Method::POST, path, Some(&body)).await?;
        self.decode(&reply)
    }

    fn decode<T: DeserializeOwned>(&self, reply: &Reply) -> Result<T, ClientError> {
        serde_json::from_slice(&reply.body).map_err(|e| ClientError::Parse {
            service: self.service,
            message: e.to_string(),
        })
    }

    fn transport_error(&self, e: &reqwest::Error) -> ClientError {
        if e.is_timeout() {
            ClientError::Timeout {
                service: self.service,
            }
        } else {
            ClientError::Transport {
                service: self.service,
                message: e.to_string(),
            }
        }
    }

    fn record(&self, permit: Permit, outcome: Outcome) {
        let transition = self.breaker.record(permit, outcome, Instant::now());
        self.log_transition(transition);
    }

    fn log_transition(&self, transition: Option<Transition>) {
        if let Some(Transition { from, to }) = transition {
            tracing::warn!(
                event = "breaker_transition",
                service = %self.service,
                from = %from,
                to = %to,
                "Circuit breaker changed state"
            );
        }
    }
}

/// Reports the outcome of an admitted call exactly once.
struct PermitGuard<'a> {
    client: &'a ResilientClient,
    permit: Option<Permit>,
}

impl PermitGuard<'_> {
    fn finish(&mut self, outcome: Outcome) {
        if let Some(permit) = self.permit.take() {
            self.client.record(permit, outcome);
        }
    }
}

impl Drop for PermitGuard<'_> {
    fn drop(&mut self) {
        self.finish(Outcome::Failure);
    }
}

// =============================================================================
// UPSTREAM PEERS
// =============================================================================

/// One resilient client per peer service, each with its own breaker.
#[derive(Debug, Clone)]
pub struct Upstream {
    pub border: ResilientClient,
    pub registry: ResilientClient,
    pub prosecution: ResilientClient,
    pub court: ResilientClient,
}

impl Upstream {
    /// Build clients for every peer named in `config`.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, EupravaError> {
        let http = reqwest::Client::builder()
            .no_proxy()
            .build()
            .map_err(|e| EupravaError::Config(format!("cannot build HTTP client: {}", e)))?;
        let client = |service: Service| {
            ResilientClient::new(
                http.clone(),
                config.peers.base_url(service),
                service,
                CircuitBreaker::new(config.breaker.to_config()),
            )
        };
        Ok(Self {
            border: client(Service::Border),
            registry: client(Service::Registry),
            prosecution: client(Service::Prosecution),
            court: client(Service::Court),
        })
    }

    /// Breaker snapshots keyed by peer name.
    #[must_use]
    pub fn snapshots(&self) -> Vec<(Service, BreakerSnapshot)> {
        [&self.border, &self.registry, &self.prosecution, &self.court]
            .into_iter()
            .map(|client| (client.service(), client.snapshot()))
            .collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use euprava_core::{BreakerConfig, BreakerState};

    fn unreachable_client(threshold: u32) -> ResilientClient {
        // Port 9 (discard) on localhost is closed on test machines.
        ResilientClient::new(
            reqwest::Client::builder().no_proxy().build().unwrap(),
            "http://127.0.0.1:9".into(),
            Service::Border,
            CircuitBreaker::new(BreakerConfig::default().failure_threshold(threshold)),
        )
    }

    #[tokio::test]
    async fn transport_failures_open_breaker() {
        let client = unreachable_client(2);
        let ctx = CallContext::default();

        for _ in 0..2 {
            let err = client.call(&ctx, Method::GET, "/health", None).await.unwrap_err();
            assert!(matches!(err, ClientError::Transport { .. } | ClientError::Timeout { .. }));
        }
        assert_eq!(client.snapshot().state, BreakerState::Open);

        let err = client.call(&ctx, Method::GET, "/health", None).await.unwrap_err();
        assert!(matches!(err, ClientError::Unavailable { service: Service::Border, .. }));
        assert_eq!(client.snapshot().rejected_calls, 1);
    }

    #[tokio::test]
    async fn expired_deadline_skips_breaker() {
        let client = unreachable_client(1);
        let ctx = CallContext::new(Some(tokio::time::Instant::now()), None);
        let err = client.call(&ctx, Method::GET, "/health", None).await.unwrap_err();
        assert_eq!(err, ClientError::Timeout { service: Service::Border });
        assert_eq!(client.snapshot().state, BreakerState::Closed);
    }

    #[test]
    fn error_mapping() {
        let unavailable = ClientError::Unavailable {
            service: Service::Registry,
            retry_after: Duration::from_secs(3),
        };
        assert!(matches!(
            EupravaError::from(unavailable),
            EupravaError::Unavailable(_)
        ));
        let server = ClientError::Status {
            service: Service::Registry,
            status: 502,
            body: String::new(),
        };
        assert!(matches!(EupravaError::from(server), EupravaError::Unavailable(_)));
        let refused = ClientError::Status {
            service: Service::Registry,
            status: 400,
            body: "bad".into(),
        };
        assert_eq!(refused.status(), Some(400));
        assert!(matches!(EupravaError::from(refused), EupravaError::InvalidRequest(_)));
    }

    #[test]
    fn peer_refusals_are_not_validation_errors() {
        for status in [401, 403, 409] {
            let refused = ClientError::Status {
                service: Service::Border,
                status,
                body: String::new(),
            };
            assert!(
                matches!(EupravaError::from(refused), EupravaError::UpstreamRejected(_)),
                "status {}",
                status
            );
        }
        let unprocessable = ClientError::Status {
            service: Service::Border,
            status: 422,
            body: String::new(),
        };
        assert!(matches!(
            EupravaError::from(unprocessable),
            EupravaError::InvalidRequest(_)
        ));
    }
}

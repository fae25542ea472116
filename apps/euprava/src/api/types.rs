//! # API Types
//!
//! Response envelopes shared by the service handlers. Records themselves are
//! serialized as defined in `euprava-core`.

use euprava_core::BreakerSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Response for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    /// Breaker state of every peer client, keyed by peer name.
    pub breakers: BTreeMap<String, BreakerSnapshot>,
}

/// Plain acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Acknowledgement of a filed request, with the stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiledResponse<T> {
    pub message: String,
    #[serde(rename = "zahtev")]
    pub request: T,
}

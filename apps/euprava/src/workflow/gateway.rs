//! # Document Validation Gateway
//!
//! The border service's view of the registry's document check. The registry
//! holds the authoritative records and runs the rules; the gateway sends the
//! traveller's claim and turns the answer back into a verdict:
//!
//! - 200: documents valid
//! - 403 with a `rejection` body: the specific reason the claim failed
//! - 403 without one: the registry refused to run the check
//!   (`UpstreamRejected`)
//! - anything else: the check could not be made (`Unavailable` if the
//!   registry is down or its breaker is open)

use crate::client::{CallContext, ClientError, ResilientClient};
use euprava_core::{DocumentClaim, DocumentRejection, EupravaError};
use serde::Deserialize;

#[derive(Deserialize)]
struct RejectionBody {
    rejection: DocumentRejection,
}

/// Checks a traveller's claim against the registry over HTTP.
#[derive(Debug, Clone)]
pub struct DocumentValidationGateway {
    registry: ResilientClient,
}

impl DocumentValidationGateway {
    #[must_use]
    pub fn new(registry: ResilientClient) -> Self {
        Self { registry }
    }

    /// The outer `Result` carries failures to ask, the inner one the verdict.
    pub async fn validate(
        &self,
        ctx: &CallContext,
        claim: &DocumentClaim,
    ) -> Result<Result<(), DocumentRejection>, EupravaError> {
        match self
            .registry
            .post_json::<_, serde_json::Value>(ctx, "/validirajDokumente", claim)
            .await
        {
            Ok(_) => Ok(Ok(())),
            Err(ClientError::Status {
                status: 403, body, ..
            }) => match serde_json::from_str::<RejectionBody>(&body) {
                Ok(parsed) => Ok(Err(parsed.rejection)),
                Err(_) => Err(EupravaError::UpstreamRejected(format!(
                    "registry refused the document check: {}",
                    body
                ))),
            },
            Err(e) => Err(e.into()),
        }
    }
}

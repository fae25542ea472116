//! # euprava-core
//!
//! The record model and invariants of the eUprava criminal-case escalation
//! workflow - THE LOGIC.
//!
//! A border crossing is recorded, optionally flagged, and escalated into a
//! criminal report. The prosecution escalates each report to exactly one of
//! two tracks (a judicial request or a plea-deal request); a plea deal is
//! then either settled or rejected back onto the judicial track. The court
//! opens cases from judicial requests.
//!
//! ## Architectural Constraints
//!
//! The CORE:
//! - Has NO async, NO network dependencies (pure Rust)
//! - Runs every check-then-write sequence inside one redb write transaction
//! - Takes time and randomness from the caller
//! - Does not log; transitions and outcomes are returned as values

// Implements `storage::Record` for a struct with an `id: RecordId` field.
macro_rules! impl_record {
    ($ty:ty, $collection:expr, $kind:expr) => {
        impl $crate::storage::Record for $ty {
            const COLLECTION: &'static str = $collection;
            const KIND: &'static str = $kind;

            fn id(&self) -> $crate::RecordId {
                self.id
            }

            fn set_id(&mut self, id: $crate::RecordId) {
                self.id = id;
            }
        }
    };
}

pub(crate) use impl_record;

// =============================================================================
// MODULES
// =============================================================================

pub mod border;
pub mod breaker;
pub mod channel;
pub mod court;
pub mod escalation;
pub mod identity;
pub mod plea;
pub mod registry;
pub mod storage;
pub mod types;
pub mod validation;

#[cfg(test)]
mod test_support;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{ClaimField, DocumentKind, DocumentRejection, EupravaError, RecordId, RecordIdSet};

// =============================================================================
// RE-EXPORTS: Services
// =============================================================================

pub use border::{BorderPost, Crossing, CriminalReport, SuspiciousPerson};
pub use breaker::{BreakerConfig, BreakerSnapshot, BreakerState, CircuitBreaker, Outcome};
pub use channel::{Channel, Channels, Message};
pub use court::{Case, Court, Hearing, Verdict};
pub use escalation::{Escalation, JudicialRequest, PleaDealRequest, ProsecutionLedger, Track};
pub use identity::{AccessPolicy, Claims, Decision, Role, Subject};
pub use plea::{PleaDeals, PleaStatus, Settlement};
pub use registry::{Citizen, Registry, SurveillanceOrder};
pub use storage::RecordStore;
pub use validation::{DocumentClaim, validate_claim};

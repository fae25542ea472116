//! # Core Type Definitions
//!
//! Identifiers and the error taxonomy shared by every eUprava service:
//! - Record identifiers (`RecordId`, `RecordIdSet`)
//! - Document validation outcomes (`DocumentKind`, `ClaimField`, `DocumentRejection`)
//! - Error types (`EupravaError`)
//!
//! ## Error Taxonomy
//!
//! Every fallible operation in this crate returns `Result<T, EupravaError>`.
//! The variants are grouped by how a caller is expected to react:
//! - Rejections of the request itself (`InvalidRequest`, `DocumentRejected`)
//! - Invariant violations (`AlreadyFiled`, `Conflict`, `AlreadySettled`)
//! - Missing referents (`NotFound`, `ChannelNotFound`)
//! - Transient conditions (`Unavailable`, `Cancelled`)
//! - Infrastructure failures (`Storage`, `Serialization`, `Config`)

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

// =============================================================================
// RECORD IDENTIFIERS
// =============================================================================

/// Server-assigned identifier of a stored record.
///
/// Ids are allocated per collection from a monotonic counter and are never
/// reused, so `0` never names a stored record and doubles as "not yet assigned".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl RecordId {
    /// Placeholder for records that have not been persisted yet.
    pub const UNASSIGNED: Self = Self(0);

    /// Get the raw id value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Key used for this id in string-keyed unique indexes.
    #[must_use]
    pub fn index_key(self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RecordId {
    type Err = EupravaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| EupravaError::InvalidRequest(format!("invalid record id '{}'", s)))
    }
}

/// Ordered set of record ids.
///
/// Used to de-duplicate and filter batches fetched from another service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordIdSet(BTreeSet<RecordId>);

impl RecordIdSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an id. Returns `false` if it was already present.
    pub fn insert(&mut self, id: RecordId) -> bool {
        self.0.insert(id)
    }

    #[must_use]
    pub fn contains(&self, id: RecordId) -> bool {
        self.0.contains(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keep the first occurrence of every id, preserving order.
    pub fn dedup_by_id<T>(
        items: impl IntoIterator<Item = T>,
        id: impl Fn(&T) -> RecordId,
    ) -> Vec<T> {
        let mut seen = Self::new();
        items.into_iter().filter(|item| seen.insert(id(item))).collect()
    }
}

impl FromIterator<RecordId> for RecordIdSet {
    fn from_iter<I: IntoIterator<Item = RecordId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// =============================================================================
// DOCUMENT REJECTIONS
// =============================================================================

/// Identity documents checked at a border crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    IdentityCard,
    Passport,
}

impl DocumentKind {
    /// Human-readable document name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::IdentityCard => "identity card",
            Self::Passport => "passport",
        }
    }
}

/// A claimed field that must match the registry record exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimField {
    FirstName,
    LastName,
    Jmbg,
    CardNumber,
    PassportNumber,
    Citizenship,
}

impl ClaimField {
    /// Human-readable field name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::FirstName => "first name",
            Self::LastName => "last name",
            Self::Jmbg => "national id",
            Self::CardNumber => "identity card number",
            Self::PassportNumber => "passport number",
            Self::Citizenship => "citizenship",
        }
    }
}

/// Why a traveller's document claim was refused.
///
/// Each variant is a distinct reason so the border service can report a
/// specific message instead of a generic refusal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DocumentRejection {
    /// No registry record carries the claimed national id.
    SubjectNotFound,
    /// The registry holds no such document for the subject.
    MissingDocument { document: DocumentKind },
    /// The document's expiry date lies before the validation date.
    Expired { document: DocumentKind },
    /// A claimed field differs from the registry record.
    Mismatch {
        document: DocumentKind,
        field: ClaimField,
    },
}

impl fmt::Display for DocumentRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SubjectNotFound => write!(f, "no registry record for the claimed national id"),
            Self::MissingDocument { document } => {
                write!(f, "no {} on record", document.name())
            }
            Self::Expired { document } => write!(f, "{} has expired", document.name()),
            Self::Mismatch { document, field } => {
                write!(f, "{} {} does not match", document.name(), field.name())
            }
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the eUprava services.
///
/// All functions that can fail should:
/// - Use `Result<T, EupravaError>` for fallible operations
/// - Propagate errors with `?` and never panic
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EupravaError {
    /// Malformed or incomplete request data.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A referenced record does not exist.
    #[error("{collection} {id} not found")]
    NotFound {
        collection: &'static str,
        id: String,
    },

    /// The same kind of request was already filed for this record.
    #[error("{0}")]
    AlreadyFiled(String),

    /// A competing request already exists for this record.
    #[error("{0}")]
    Conflict(String),

    /// A settlement already exists for this plea-deal request.
    #[error("Plea-deal request {0} is already settled")]
    AlreadySettled(RecordId),

    /// Messages were addressed to an unknown channel.
    #[error("Channel {0} not found")]
    ChannelNotFound(RecordId),

    /// The traveller's documents failed validation.
    #[error("Document validation failed: {0}")]
    DocumentRejected(DocumentRejection),

    /// A dependent service cannot be reached or its breaker is open.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// A dependent service answered but refused the call (401, 403, 409).
    #[error("Upstream refused the call: {0}")]
    UpstreamRejected(String),

    /// The request deadline elapsed before the work could complete.
    #[error("Request deadline exceeded")]
    Cancelled,

    /// Record store failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Encoding or decoding of a stored record failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl EupravaError {
    /// Build a `NotFound` error for a record id.
    #[must_use]
    pub fn not_found(collection: &'static str, id: impl fmt::Display) -> Self {
        Self::NotFound {
            collection,
            id: id.to_string(),
        }
    }

    /// True for the invariant-violation kinds (duplicate escalation or settlement).
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::AlreadyFiled(_) | Self::Conflict(_) | Self::AlreadySettled(_)
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================

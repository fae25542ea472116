//! # Cross-Service Workflow
//!
//! The async halves of the escalation workflow: everything that has to ask
//! another service before the local record store can decide.
//!
//! - [`feeds`]: typed reads of peer endpoints
//! - [`gateway`]: document validation against the registry
//! - [`coordinator`]: filing judicial and plea-deal requests

pub mod coordinator;
pub mod feeds;
pub mod gateway;

pub use coordinator::CaseEscalationCoordinator;
pub use gateway::DocumentValidationGateway;

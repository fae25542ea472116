//! # HTTP Handlers
//!
//! One module per service. Handlers extract the request, call into
//! `euprava-core` or the workflow layer, and map errors through [`ApiError`].
//!
//! [`ApiError`]: super::error::ApiError

pub mod border;
pub mod court;
pub mod health;
pub mod prosecution;
pub mod registry;

use super::error::ApiError;

/// Handler result.
pub type ApiResult<T> = Result<T, ApiError>;

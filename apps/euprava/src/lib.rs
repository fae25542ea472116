//! # eUprava Services
//!
//! The network layer over `euprava-core`: one axum service per office,
//! the resilient client the offices use to reach each other and the
//! token scheme that identifies callers.
//!
//! ```text
//! border (8001) <---- registry (8002)      surveillance feed
//!        |  ^
//!        |  +-------- prosecution (8003)   criminal reports
//!        v                 ^
//!  registry /validirajDokumente            document checks
//!                          |
//!                     court (8004)         judicial requests
//! ```

pub mod api;
pub mod cli;
pub mod client;
pub mod config;
pub mod token;
pub mod workflow;

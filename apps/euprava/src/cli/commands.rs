//! # CLI Command Implementations

use crate::api::{self, AppState};
use crate::config::{Service, ServiceConfig};
use crate::token::TokenSigner;
use euprava_core::{Claims, EupravaError, RecordStore, Role};
use std::path::{Path, PathBuf};
use std::sync::Arc;

// =============================================================================
// SERVE COMMAND
// =============================================================================

/// Start the service for one office.
pub async fn cmd_serve(
    config_path: Option<&Path>,
    service: Service,
    host: &str,
    port: Option<u16>,
    database: Option<PathBuf>,
) -> Result<(), EupravaError> {
    let mut config = ServiceConfig::load(config_path, |key| std::env::var(key).ok())?;
    if database.is_some() {
        config.database = database;
    }
    let db_path = config.database_for(service);
    let port = port.unwrap_or_else(|| service.default_port());

    println!("eUprava {} service starting...", service);
    println!();
    println!("Configuration:");
    println!("  Host:      {}", host);
    println!("  Port:      {}", port);
    println!("  Database:  {}", db_path.display());
    println!("  Deadline:  {} ms", config.request_deadline_ms);
    println!(
        "  Auth:      {}",
        if config.auth.verifying_key.is_some() {
            "enabled"
        } else {
            "DISABLED"
        }
    );
    println!();
    println!("Peers:");
    for peer in [
        Service::Border,
        Service::Registry,
        Service::Prosecution,
        Service::Court,
    ] {
        if peer != service {
            println!("  {:<12} {}", peer.name(), config.peers.base_url(peer));
        }
    }
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let store = Arc::new(RecordStore::open(&db_path)?);
    let state = AppState::new(service, Arc::new(config), store)?;
    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, state).await
}

// =============================================================================
// KEY COMMANDS
// =============================================================================

/// Print a fresh signing key and the verifying key that goes with it.
pub fn cmd_keygen() {
    let signer = TokenSigner::generate();
    println!("# Keep the signing key secret. Give every service the verifying key.");
    println!("EUPRAVA_SIGNING_KEY={}", signer.signing_key_base64());
    println!("EUPRAVA_VERIFYING_KEY={}", signer.verifying_key_base64());
}

/// Print a signed bearer token for `sub` acting as `role`.
pub fn cmd_issue_token(
    config_path: Option<&Path>,
    sub: u64,
    role: Role,
    signing_key: Option<String>,
    ttl_secs: Option<u64>,
) -> Result<(), EupravaError> {
    let signing_key = signing_key
        .or_else(|| std::env::var("EUPRAVA_SIGNING_KEY").ok())
        .ok_or_else(|| {
            EupravaError::Config(
                "no signing key: pass --signing-key or set EUPRAVA_SIGNING_KEY".into(),
            )
        })?;
    let signer = TokenSigner::from_base64(&signing_key)?;

    let ttl = match ttl_secs {
        Some(ttl) => ttl,
        None => ServiceConfig::load(config_path, |key| std::env::var(key).ok())?
            .auth
            .token_ttl_secs,
    };
    let claims = Claims {
        sub,
        role,
        exp: expiry(chrono::Utc::now().timestamp(), ttl),
    };
    println!("{}", signer.issue(&claims)?);
    Ok(())
}

fn expiry(now_unix: i64, ttl_secs: u64) -> i64 {
    now_unix.saturating_add(i64::try_from(ttl_secs).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_saturates() {
        assert_eq!(expiry(1_000, 60), 1_060);
        assert_eq!(expiry(1_000, u64::MAX), i64::MAX);
    }

    #[test]
    fn issue_token_requires_a_valid_key() {
        let err = cmd_issue_token(None, 1, Role::Judge, Some("not base64!".into()), Some(60));
        assert!(matches!(err, Err(EupravaError::Config(_))));
    }
}

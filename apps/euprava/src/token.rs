//! # Bearer Tokens
//!
//! Signed identity tokens carried in `Authorization: Bearer <token>`.
//!
//! ```text
//! base64url(claims_json) "." base64url(ed25519_signature(claims_json))
//! ```
//!
//! Keys travel as standard base64 of the raw 32-byte ed25519 key.

use base64::{
    Engine as _,
    engine::general_purpose::{STANDARD as BASE64, URL_SAFE_NO_PAD as BASE64_URL},
};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use euprava_core::{Claims, EupravaError};
use std::fmt;

// =============================================================================
// ERRORS
// =============================================================================

/// Why a presented token was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    /// Not two base64url segments, or the claims are not valid JSON.
    Malformed,
    BadSignature,
    Expired,
}

impl TokenError {
    /// Short reason used in log events.
    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self {
            Self::Malformed => "malformed_token",
            Self::BadSignature => "bad_signature",
            Self::Expired => "expired_token",
        }
    }
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "token is malformed"),
            Self::BadSignature => write!(f, "token signature does not verify"),
            Self::Expired => write!(f, "token has expired"),
        }
    }
}

impl std::error::Error for TokenError {}

fn decode_key(b64: &str, what: &str) -> Result<[u8; 32], EupravaError> {
    let bytes = BASE64
        .decode(b64.trim())
        .map_err(|e| EupravaError::Config(format!("invalid base64 in {}: {}", what, e)))?;
    bytes.try_into().map_err(|v: Vec<u8>| {
        EupravaError::Config(format!("{} must be 32 bytes, got {}", what, v.len()))
    })
}

// =============================================================================
// SIGNER
// =============================================================================

/// Issues tokens. Only the CLI and tests hold a signing key.
pub struct TokenSigner {
    key: SigningKey,
}

impl TokenSigner {
    /// Generate a fresh key pair.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            key: SigningKey::generate(&mut rand::rngs::OsRng),
        }
    }

    #[must_use]
    pub fn from_key(key: SigningKey) -> Self {
        Self { key }
    }

    pub fn from_base64(b64: &str) -> Result<Self, EupravaError> {
        let bytes = decode_key(b64, "signing key")?;
        Ok(Self {
            key: SigningKey::from_bytes(&bytes),
        })
    }

    #[must_use]
    pub fn signing_key_base64(&self) -> String {
        BASE64.encode(self.key.to_bytes())
    }

    #[must_use]
    pub fn verifying_key_base64(&self) -> String {
        BASE64.encode(self.key.verifying_key().to_bytes())
    }

    #[must_use]
    pub fn verifier(&self) -> TokenVerifier {
        TokenVerifier {
            key: self.key.verifying_key(),
        }
    }

    /// Sign `claims` into a bearer token.
    pub fn issue(&self, claims: &Claims) -> Result<String, EupravaError> {
        let payload =
            serde_json::to_vec(claims).map_err(|e| EupravaError::Serialization(e.to_string()))?;
        let signature = self.key.sign(&payload);
        Ok(format!(
            "{}.{}",
            BASE64_URL.encode(&payload),
            BASE64_URL.encode(signature.to_bytes())
        ))
    }
}

impl fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSigner").finish_non_exhaustive()
    }
}

// =============================================================================
// VERIFIER
// =============================================================================

/// Checks tokens against the configured public key.
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    key: VerifyingKey,
}

impl TokenVerifier {
    pub fn from_base64(b64: &str) -> Result<Self, EupravaError> {
        let bytes = decode_key(b64, "verifying key")?;
        let key = VerifyingKey::from_bytes(&bytes)
            .map_err(|e| EupravaError::Config(format!("invalid verifying key: {}", e)))?;
        Ok(Self { key })
    }

    /// Verify a token and return its claims if still live at `now_unix`.
    pub fn verify(&self, token: &str, now_unix: i64) -> Result<Claims, TokenError> {
        let (payload_b64, signature_b64) = token
            .trim()
            .split_once('.')
            .ok_or(TokenError::Malformed)?;
        let payload = BASE64_URL
            .decode(payload_b64)
            .map_err(|_| TokenError::Malformed)?;
        let signature_bytes: [u8; 64] = BASE64_URL
            .decode(signature_b64)
            .map_err(|_| TokenError::Malformed)?
            .try_into()
            .map_err(|_| TokenError::Malformed)?;
        let signature = Signature::from_bytes(&signature_bytes);

        self.key
            .verify_strict(&payload, &signature)
            .map_err(|_| TokenError::BadSignature)?;

        let claims: Claims = serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;
        if !claims.is_live(now_unix) {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use euprava_core::Role;

    fn signer() -> TokenSigner {
        TokenSigner::from_key(SigningKey::from_bytes(&[7u8; 32]))
    }

    fn claims(exp: i64) -> Claims {
        Claims {
            sub: 12,
            role: Role::Prosecutor,
            exp,
        }
    }

    #[test]
    fn issue_and_verify() {
        let signer = signer();
        let token = signer.issue(&claims(2_000)).unwrap();
        let verified = signer.verifier().verify(&token, 1_000).unwrap();
        assert_eq!(verified, claims(2_000));
    }

    #[test]
    fn expired_token() {
        let signer = signer();
        let token = signer.issue(&claims(1_000)).unwrap();
        assert_eq!(
            signer.verifier().verify(&token, 1_000),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn tampered_claims() {
        let signer = signer();
        let token = signer.issue(&claims(2_000)).unwrap();
        let (_, signature) = token.split_once('.').unwrap();
        let forged_claims = Claims {
            role: Role::Judge,
            ..claims(2_000)
        };
        let forged = format!(
            "{}.{}",
            BASE64_URL.encode(serde_json::to_vec(&forged_claims).unwrap()),
            signature
        );
        assert_eq!(
            signer.verifier().verify(&forged, 1_000),
            Err(TokenError::BadSignature)
        );
    }

    #[test]
    fn foreign_key_rejected() {
        let token = TokenSigner::generate().issue(&claims(2_000)).unwrap();
        assert_eq!(
            signer().verifier().verify(&token, 1_000),
            Err(TokenError::BadSignature)
        );
    }

    #[test]
    fn malformed_tokens() {
        let verifier = signer().verifier();
        for token in ["", "abc", "a.b", "!!!.???"] {
            assert_eq!(verifier.verify(token, 0), Err(TokenError::Malformed));
        }
    }

    #[test]
    fn keys_round_trip_through_base64() {
        let signer = TokenSigner::generate();
        let restored = TokenSigner::from_base64(&signer.signing_key_base64()).unwrap();
        let verifier = TokenVerifier::from_base64(&signer.verifying_key_base64()).unwrap();
        let token = restored.issue(&claims(2_000)).unwrap();
        assert!(verifier.verify(&token, 0).is_ok());
        assert!(matches!(
            TokenVerifier::from_base64("c2hvcnQ="),
            Err(EupravaError::Config(_))
        ));
    }
}

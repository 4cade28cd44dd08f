//! Signed password-reset tokens.
//!
//! ```text
//! token = base64url(claims_json) "." base64url(hmac_sha256(secret, base64url(claims_json)))
//! claims = {"email": ..., "exp": <unix seconds>, "jti": <uuid>}
//! ```

use actuate_types::ErrorCode;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Token failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Not `claims.mac`, or undecodable.
    #[error("malformed token")]
    Malformed,

    /// Signature does not match.
    #[error("invalid token signature")]
    BadSignature,

    /// Past its expiry.
    #[error("token has expired")]
    Expired,

    /// The signing key was rejected.
    #[error("invalid signing key")]
    Key,
}

impl ErrorCode for TokenError {
    fn code(&self) -> &'static str {
        match self {
            Self::Malformed => "TOKEN_MALFORMED",
            Self::BadSignature => "TOKEN_BAD_SIGNATURE",
            Self::Expired => "TOKEN_EXPIRED",
            Self::Key => "TOKEN_KEY",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

/// Payload of a reset token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetClaims {
    /// Account the token resets.
    pub email: String,
    /// Expiry, unix seconds.
    pub exp: i64,
    /// Unique token id.
    pub jti: String,
}

/// Issues and verifies reset tokens with one secret.
#[derive(Clone)]
pub struct ResetTokenIssuer {
    secret: Vec<u8>,
    ttl: Duration,
}

impl ResetTokenIssuer {
    /// Creates an issuer; tokens live for `ttl_minutes`.
    #[must_use]
    pub fn new(secret: impl Into<Vec<u8>>, ttl_minutes: i64) -> Self {
        Self {
            secret: secret.into(),
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    fn mac(&self) -> Result<HmacSha256, TokenError> {
        HmacSha256::new_from_slice(&self.secret).map_err(|_| TokenError::Key)
    }

    /// Signs a fresh token for `email`.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Key`] when the secret is unusable.
    pub fn issue(&self, email: &str) -> Result<(String, ResetClaims), TokenError> {
        let claims = ResetClaims {
            email: email.to_string(),
            exp: (Utc::now() + self.ttl).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        let token = self.sign(&claims)?;
        Ok((token, claims))
    }

    /// Signs arbitrary claims.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Key`] when the secret is unusable.
    pub fn sign(&self, claims: &ResetClaims) -> Result<String, TokenError> {
        let json = serde_json::to_vec(claims).map_err(|_| TokenError::Malformed)?;
        let payload = URL_SAFE_NO_PAD.encode(json);
        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        Ok(format!("{payload}.{signature}"))
    }

    /// Checks signature and expiry.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError`] naming the first check that failed.
    pub fn verify(&self, token: &str) -> Result<ResetClaims, TokenError> {
        let (payload, signature) = token.trim().split_once('.').ok_or(TokenError::Malformed)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::Malformed)?;

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| TokenError::Malformed)?;
        let claims: ResetClaims = serde_json::from_slice(&json).map_err(|_| TokenError::Malformed)?;
        if claims.exp <= Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

impl fmt::Debug for ResetTokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResetTokenIssuer")
            .field("ttl_minutes", &self.ttl.num_minutes())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_then_verify() {
        let issuer = ResetTokenIssuer::new("s3cret", 30);
        let (token, claims) = issuer.issue("a@b.c").expect("issue");
        assert_eq!(issuer.verify(&token).expect("verify"), claims);
        assert!(claims.exp > Utc::now().timestamp());
    }

    #[test]
    fn other_secret_is_rejected() {
        let (token, _) = ResetTokenIssuer::new("one", 30).issue("a@b.c").expect("issue");
        assert_eq!(
            ResetTokenIssuer::new("two", 30).verify(&token),
            Err(TokenError::BadSignature)
        );
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let issuer = ResetTokenIssuer::new("s3cret", 30);
        let (token, _) = issuer.issue("a@b.c").expect("issue");
        let (_, signature) = token.split_once('.').expect("dot");
        let forged = URL_SAFE_NO_PAD.encode(br#"{"email":"evil@x.y","exp":9999999999,"jti":"x"}"#);
        assert_eq!(
            issuer.verify(&format!("{forged}.{signature}")),
            Err(TokenError::BadSignature)
        );
    }

    #[test]
    fn expired_and_malformed() {
        let issuer = ResetTokenIssuer::new("s3cret", 30);
        let stale = issuer
            .sign(&ResetClaims {
                email: "a@b.c".into(),
                exp: Utc::now().timestamp() - 1,
                jti: "old".into(),
            })
            .expect("sign");
        assert_eq!(issuer.verify(&stale), Err(TokenError::Expired));
        assert_eq!(issuer.verify("no-dot"), Err(TokenError::Malformed));
        assert_eq!(issuer.verify("a.!!"), Err(TokenError::Malformed));
    }
}

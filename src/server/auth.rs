// src/server/auth.rs
//! Session tokens for the broker
//!
//! Tokens are compact HS256 JWTs carrying the username and an expiry. The
//! signing key is generated per process, so a broker restart invalidates
//! every outstanding session.

use crate::error::{Error, Result};
use crate::token::{SESSION_COOKIE, TokenClaims, decode_claims};
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Fixed JOSE header of every token
const TOKEN_HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

/// Lifetime of a session token
pub const TOKEN_TTL: Duration = Duration::minutes(5);

/// A token is refreshable once its remaining lifetime drops below this
pub const REFRESH_WINDOW: Duration = Duration::seconds(30);

/// Why a presented token was rejected
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TokenError {
    /// Not three dot-separated base64 segments with valid JSON claims
    #[error("malformed session token")]
    Malformed,

    /// Signature does not match this broker's key
    #[error("invalid session token signature")]
    BadSignature,

    /// The token's expiry has passed
    #[error("session token expired")]
    Expired,
}

/// An issued token with its expiry
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl IssuedToken {
    /// `Set-Cookie` header value carrying the token
    pub fn cookie(&self) -> String {
        format!(
            "{}={}; Expires={}; Path=/; HttpOnly",
            SESSION_COOKIE,
            self.token,
            self.expires_at.format("%a, %d %b %Y %H:%M:%S GMT")
        )
    }
}

/// Signs and verifies session tokens
#[derive(Clone)]
pub struct SessionKeys {
    mac: HmacSha256,
}

impl SessionKeys {
    /// Generate a random 256-bit signing key
    pub fn generate() -> Result<Self> {
        let mut key = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut key);
        Self::from_secret(&key)
    }

    pub fn from_secret(secret: &[u8]) -> Result<Self> {
        let mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| Error::InitError(format!("invalid session key: {e}")))?;
        Ok(Self { mac })
    }

    /// Issue a token for `username` valid for `ttl`
    pub fn issue(&self, username: &str, ttl: Duration) -> IssuedToken {
        let expires_at = Utc::now() + ttl;
        let claims = TokenClaims {
            username: username.to_string(),
            exp: expires_at.timestamp(),
        };
        // Serializing two plain fields cannot fail.
        let payload = serde_json::to_vec(&claims).unwrap_or_default();
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(TOKEN_HEADER),
            URL_SAFE_NO_PAD.encode(payload)
        );
        let signature = URL_SAFE_NO_PAD.encode(self.sign(signing_input.as_bytes()));

        IssuedToken {
            token: format!("{signing_input}.{signature}"),
            expires_at,
        }
    }

    /// Check signature and expiry, returning the claims
    pub fn verify(&self, token: &str) -> std::result::Result<TokenClaims, TokenError> {
        let (signing_input, signature) = token.rsplit_once('.').ok_or(TokenError::Malformed)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::Malformed)?;

        let mut mac = self.mac.clone();
        mac.update(signing_input.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let claims = decode_claims(token).ok_or(TokenError::Malformed)?;
        if claims.exp <= Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    fn sign(&self, data: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }
}

/// Decode an `Authorization: Basic` header value into username and password
pub fn parse_basic_auth(header: &str) -> Option<(String, String)> {
    let encoded = header.strip_prefix("Basic ").or_else(|| header.strip_prefix("basic "))?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (user, pass) = text.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

/// Find a cookie value in a `Cookie` request header
pub fn cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_verify() {
        let keys = SessionKeys::generate().unwrap();
        let issued = keys.issue("admin", TOKEN_TTL);
        let claims = keys.verify(&issued.token).unwrap();
        assert_eq!(claims.username, "admin");
        assert_eq!(claims.exp, issued.expires_at.timestamp());
    }

    #[test]
    fn test_foreign_key_rejected() {
        let issued = SessionKeys::from_secret(b"one").unwrap().issue("admin", TOKEN_TTL);
        assert_eq!(
            SessionKeys::from_secret(b"two").unwrap().verify(&issued.token),
            Err(TokenError::BadSignature)
        );
    }

    #[test]
    fn test_expired_rejected() {
        let keys = SessionKeys::generate().unwrap();
        let issued = keys.issue("admin", Duration::seconds(-5));
        assert_eq!(keys.verify(&issued.token), Err(TokenError::Expired));
    }

    #[test]
    fn test_garbage_rejected() {
        let keys = SessionKeys::generate().unwrap();
        assert_eq!(keys.verify("nonsense"), Err(TokenError::Malformed));
        assert!(keys.verify("a.b.c").is_err());
    }

    #[test]
    fn test_cookie_format() {
        let issued = SessionKeys::generate().unwrap().issue("admin", TOKEN_TTL);
        let cookie = issued.cookie();
        assert!(cookie.starts_with(&format!("token={}; Expires=", issued.token)));
        assert!(cookie.contains(" GMT"));
    }

    #[test]
    fn test_parse_basic_auth() {
        let header = format!("Basic {}", STANDARD.encode("admin:s3:cret"));
        assert_eq!(
            parse_basic_auth(&header),
            Some(("admin".to_string(), "s3:cret".to_string()))
        );
        assert_eq!(parse_basic_auth("Bearer x"), None);
    }

    #[test]
    fn test_cookie_value() {
        assert_eq!(cookie_value("a=1; token=abc.def; b=2", "token"), Some("abc.def"));
        assert_eq!(cookie_value("a=1", "token"), None);
    }
}

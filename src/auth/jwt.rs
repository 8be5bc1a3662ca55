//! JWT claim sets and compact encoding helpers.
//!
//! Signing itself is delegated to a [`TokenSigner`](super::TokenSigner); this
//! module only shapes the claims and the `header.payload` signing input.

use base64ct::{Base64UrlUnpadded, Encoding};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use ulid::Ulid;

use super::{
    account::UserAccount,
    claims::{ClaimOverlay, AUDIENCE_CLAIM, CSRF_CLAIM},
};

pub const DEFAULT_ISSUER: &str = "tokengate";
pub const DEFAULT_ACCESS_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_REFRESH_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
    pub kid: String,
}

impl JwtHeader {
    #[must_use]
    pub fn eddsa(kid: impl Into<String>) -> Self {
        Self {
            alg: "EdDSA".to_string(),
            typ: "JWT".to_string(),
            kid: kid.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub sub: String,
    pub email: String,
    pub is_staff: bool,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl JwtClaims {
    #[must_use]
    pub fn audience(&self) -> Option<&str> {
        self.extra.get(AUDIENCE_CLAIM).and_then(Value::as_str)
    }

    #[must_use]
    pub fn csrf_token(&self) -> Option<&str> {
        self.extra.get(CSRF_CLAIM).and_then(Value::as_str)
    }
}

/// Issuer and lifetimes applied to every token.
#[derive(Clone, Debug)]
pub struct JwtConfig {
    issuer: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            issuer: DEFAULT_ISSUER.to_string(),
            access_ttl: DEFAULT_ACCESS_TTL,
            refresh_ttl: DEFAULT_REFRESH_TTL,
        }
    }
}

impl JwtConfig {
    #[must_use]
    pub fn with_issuer(mut self, issuer: String) -> Self {
        self.issuer = issuer;
        self
    }

    #[must_use]
    pub fn with_access_ttl(mut self, ttl: Duration) -> Self {
        self.access_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_refresh_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_ttl = ttl;
        self
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    #[must_use]
    pub fn ttl(&self, token_type: TokenType) -> Duration {
        match token_type {
            TokenType::Access => self.access_ttl,
            TokenType::Refresh => self.refresh_ttl,
        }
    }

    /// Compose the full claim set for `account`. Every call gets a new `jti`.
    #[must_use]
    pub fn claims(
        &self,
        account: &UserAccount,
        token_type: TokenType,
        overlay: &ClaimOverlay,
        now_unix_seconds: i64,
    ) -> JwtClaims {
        let ttl = i64::try_from(self.ttl(token_type).as_secs()).unwrap_or(i64::MAX);
        JwtClaims {
            iss: self.issuer.clone(),
            iat: now_unix_seconds,
            exp: now_unix_seconds.saturating_add(ttl),
            jti: Ulid::new().to_string(),
            token_type,
            sub: account.id.to_string(),
            email: account.email.clone(),
            is_staff: account.is_staff,
            extra: overlay.to_map(),
        }
    }
}

/// Base64url (unpadded) JSON segment.
///
/// # Errors
/// Returns an error if `value` cannot be serialized.
pub fn encode_segment<T: Serialize>(value: &T) -> Result<String, JwtError> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

/// `header.payload`, the bytes a signer signs.
///
/// # Errors
/// Returns an error if the header or claims cannot be serialized.
pub fn signing_input(header: &JwtHeader, claims: &JwtClaims) -> Result<String, JwtError> {
    Ok(format!(
        "{}.{}",
        encode_segment(header)?,
        encode_segment(claims)?
    ))
}

/// Read the claims of a compact token without verifying its signature.
///
/// # Errors
/// Returns an error if the token is not three dot-separated segments or the
/// payload is not base64url JSON.
pub fn decode_claims(token: &str) -> Result<JwtClaims, JwtError> {
    let mut parts = token.split('.');
    let _header = parts.next().ok_or(JwtError::TokenFormat)?;
    let payload = parts.next().ok_or(JwtError::TokenFormat)?;
    let _signature = parts.next().ok_or(JwtError::TokenFormat)?;
    if parts.next().is_some() {
        return Err(JwtError::TokenFormat);
    }

    let bytes = Base64UrlUnpadded::decode_vec(payload).map_err(|_| JwtError::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::Audience;
    use anyhow::Result;
    use uuid::Uuid;

    fn account() -> UserAccount {
        UserAccount {
            id: Uuid::new_v4(),
            email: "alice@example.com".to_string(),
            is_active: true,
            is_confirmed: true,
            is_staff: true,
            last_login: None,
        }
    }

    #[test]
    fn config_defaults_and_overrides() {
        let config = JwtConfig::default();
        assert_eq!(config.issuer(), DEFAULT_ISSUER);
        assert_eq!(config.ttl(TokenType::Access), DEFAULT_ACCESS_TTL);
        assert_eq!(config.ttl(TokenType::Refresh), DEFAULT_REFRESH_TTL);

        let config = config
            .with_issuer("https://auth.test".to_string())
            .with_access_ttl(Duration::from_secs(60))
            .with_refresh_ttl(Duration::from_secs(600));
        assert_eq!(config.issuer(), "https://auth.test");
        assert_eq!(config.ttl(TokenType::Access), Duration::from_secs(60));
        assert_eq!(config.ttl(TokenType::Refresh), Duration::from_secs(600));
    }

    #[test]
    fn claims_merge_overlay_and_expiry() {
        let account = account();
        let audience = Audience::parse(Some("shop1"));
        let overlay = ClaimOverlay::refresh("csrf-value", audience.as_ref());
        let claims = JwtConfig::default().claims(&account, TokenType::Refresh, &overlay, 1_000);

        assert_eq!(claims.sub, account.id.to_string());
        assert_eq!(claims.token_type, TokenType::Refresh);
        assert_eq!(claims.exp - claims.iat, 30 * 24 * 60 * 60);
        assert_eq!(claims.audience(), Some("custom:shop1"));
        assert_eq!(claims.csrf_token(), Some("csrf-value"));
    }

    #[test]
    fn claims_get_unique_jti() {
        let account = account();
        let config = JwtConfig::default();
        let overlay = ClaimOverlay::access(None);
        let first = config.claims(&account, TokenType::Access, &overlay, 1_000);
        let second = config.claims(&account, TokenType::Access, &overlay, 1_000);
        assert_ne!(first.jti, second.jti);
    }

    #[test]
    fn decode_claims_reads_payload() -> Result<()> {
        let claims = JwtConfig::default().claims(
            &account(),
            TokenType::Access,
            &ClaimOverlay::access(None),
            1_000,
        );
        let input = signing_input(&JwtHeader::eddsa("tokengate"), &claims)?;
        let token = format!("{input}.c2ln");
        let decoded = decode_claims(&token)?;
        assert_eq!(decoded, claims);
        assert_eq!(decoded.audience(), None);

        let value = serde_json::to_value(&decoded)?;
        assert_eq!(value.get("type"), Some(&Value::from("access")));
        Ok(())
    }

    #[test]
    fn decode_claims_rejects_malformed_tokens() {
        assert!(matches!(decode_claims("a.b"), Err(JwtError::TokenFormat)));
        assert!(matches!(decode_claims("a.b.c.d"), Err(JwtError::TokenFormat)));
        assert!(matches!(decode_claims("a.!!!.c"), Err(JwtError::Base64)));
    }
}

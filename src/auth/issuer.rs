//! Token issuance: CSRF generation, claim overlays and signing.

use anyhow::Context;
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::{
    account::UserAccount,
    claims::{Audience, ClaimOverlay},
    error::InternalError,
    BoxFuture,
};

/// Signs tokens for an account with extra claims merged in.
pub trait TokenSigner: Send + Sync {
    fn create_access_token<'a>(
        &'a self,
        account: &'a UserAccount,
        overlay: &'a ClaimOverlay,
    ) -> BoxFuture<'a, anyhow::Result<String>>;

    fn create_refresh_token<'a>(
        &'a self,
        account: &'a UserAccount,
        overlay: &'a ClaimOverlay,
    ) -> BoxFuture<'a, anyhow::Result<String>>;
}

pub trait CsrfGenerator: Send + Sync {
    /// A fresh, unpredictable token. Never reused.
    ///
    /// # Errors
    /// Returns an error if the entropy source fails.
    fn generate(&self) -> anyhow::Result<String>;
}

/// 32 bytes from the OS CSPRNG, base64url without padding.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsRngCsrfGenerator;

impl CsrfGenerator for OsRngCsrfGenerator {
    fn generate(&self) -> anyhow::Result<String> {
        let mut bytes = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut bytes)
            .context("failed to generate csrf token")?;
        Ok(Base64UrlUnpadded::encode_string(&bytes))
    }
}

/// Tokens issued by one successful attempt.
#[derive(Clone)]
pub struct IssuedSession {
    pub access_token: String,
    pub refresh_token: String,
    pub csrf_token: String,
    pub user: UserAccount,
}

impl fmt::Debug for IssuedSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedSession")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("csrf_token", &"[REDACTED]")
            .field("user", &self.user)
            .finish()
    }
}

#[derive(Clone)]
pub struct TokenIssuer {
    signer: Arc<dyn TokenSigner>,
    csrf: Arc<dyn CsrfGenerator>,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(signer: Arc<dyn TokenSigner>, csrf: Arc<dyn CsrfGenerator>) -> Self {
        Self { signer, csrf }
    }

    /// Issue access, refresh and CSRF tokens for `account`.
    ///
    /// # Errors
    /// Returns an error if CSRF generation or signing fails.
    pub async fn issue(
        &self,
        account: UserAccount,
        audience: Option<&Audience>,
    ) -> Result<IssuedSession, InternalError> {
        let csrf_token = self.csrf.generate().map_err(InternalError::Csrf)?;

        let access_overlay = ClaimOverlay::access(audience);
        let refresh_overlay = ClaimOverlay::refresh(&csrf_token, audience);

        let access_token = self
            .signer
            .create_access_token(&account, &access_overlay)
            .await
            .map_err(InternalError::Signing)?;
        let refresh_token = self
            .signer
            .create_refresh_token(&account, &refresh_overlay)
            .await
            .map_err(InternalError::Signing)?;

        debug!(user_id = %account.id, audience = ?audience.map(Audience::as_str), "tokens issued");

        Ok(IssuedSession {
            access_token,
            refresh_token,
            csrf_token,
            user: account,
        })
    }
}

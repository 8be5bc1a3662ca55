//! [`TokenSigner`] backed by Vault Transit.
//!
//! Claims are composed locally from [`JwtConfig`]; only the `header.payload`
//! bytes go to Vault, which returns an Ed25519 signature. The `kid` header is
//! the transit key name.

use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::Utc;
use secrecy::SecretString;
use std::time::Instant;
use tracing::debug;

use crate::{
    auth::{
        jwt::{signing_input, JwtConfig, JwtHeader, TokenType},
        BoxFuture, ClaimOverlay, TokenSigner, UserAccount,
    },
    cli::globals::GlobalArgs,
    vault::{self, transit::VaultSignature},
};

use super::state::AuthConfig;

#[derive(Debug, Clone)]
pub struct TransitSigner {
    jwt: JwtConfig,
    transit_mount: String,
    key_name: String,
    vault_url: String,
    vault_token: SecretString,
    client: reqwest::Client,
}

impl TransitSigner {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(globals: &GlobalArgs, config: &AuthConfig) -> Result<Self> {
        Ok(Self {
            jwt: config.jwt_config(),
            transit_mount: config.transit_mount().to_string(),
            key_name: config.transit_key().to_string(),
            vault_url: globals.vault_url.clone(),
            vault_token: globals.vault_token.clone(),
            client: vault::client()?,
        })
    }

    async fn sign(
        &self,
        account: &UserAccount,
        token_type: TokenType,
        overlay: &ClaimOverlay,
    ) -> Result<String> {
        let claims = self
            .jwt
            .claims(account, token_type, overlay, Utc::now().timestamp());
        let input = signing_input(&JwtHeader::eddsa(self.key_name.as_str()), &claims)?;

        let started = Instant::now();
        let signature = vault::transit::sign(
            &self.client,
            &self.vault_url,
            &self.vault_token,
            &self.transit_mount,
            &self.key_name,
            input.as_bytes(),
        )
        .await
        .context("Vault transit sign failed")?;

        debug!(
            key_version = signature.key_version,
            latency_ms = started.elapsed().as_millis(),
            token_type = ?token_type,
            "vault transit sign completed"
        );

        Ok(compact(&input, &signature))
    }
}

/// `header.payload.signature` with the signature base64url encoded.
fn compact(input: &str, signature: &VaultSignature) -> String {
    format!(
        "{input}.{}",
        Base64UrlUnpadded::encode_string(&signature.signature)
    )
}

impl TokenSigner for TransitSigner {
    fn create_access_token<'a>(
        &'a self,
        account: &'a UserAccount,
        overlay: &'a ClaimOverlay,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.sign(account, TokenType::Access, overlay))
    }

    fn create_refresh_token<'a>(
        &'a self,
        account: &'a UserAccount,
        overlay: &'a ClaimOverlay,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.sign(account, TokenType::Refresh, overlay))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{jwt::decode_claims, Audience};
    use uuid::Uuid;

    fn account() -> UserAccount {
        UserAccount {
            id: Uuid::new_v4(),
            email: "alice@example.com".to_string(),
            is_active: true,
            is_confirmed: true,
            is_staff: false,
            last_login: None,
        }
    }

    #[test]
    fn compact_appends_base64url_signature() -> Result<()> {
        let jwt = JwtConfig::default();
        let audience = Audience::parse(Some("shop1"));
        let claims = jwt.claims(
            &account(),
            TokenType::Access,
            &ClaimOverlay::access(audience.as_ref()),
            1_700_000_000,
        );
        let input = signing_input(&JwtHeader::eddsa("tokengate-jwt"), &claims)?;

        let token = compact(
            &input,
            &VaultSignature {
                key_version: 1,
                signature: vec![0xfb; 64],
            },
        );

        let signature = token.rsplit('.').next().unwrap_or_default();
        assert!(!signature.contains('+') && !signature.contains('/') && !signature.contains('='));
        assert_eq!(decode_claims(&token)?, claims);
        assert_eq!(decode_claims(&token)?.audience(), Some("custom:shop1"));
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_vault_is_an_error() -> Result<()> {
        let mut globals = GlobalArgs::new("http://127.0.0.1:1/v1/auth/approle/login".to_string());
        globals.set_token(SecretString::from("s.token"));
        let signer = TransitSigner::new(&globals, &AuthConfig::default())?;

        let result = signer
            .create_access_token(&account(), &ClaimOverlay::access(None))
            .await;
        assert!(result.is_err());
        Ok(())
    }
}

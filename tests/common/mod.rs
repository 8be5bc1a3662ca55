//! In-memory collaborators for driving `TokenService` end to end.

#![allow(dead_code)]

use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokengate::auth::{
    jwt::{signing_input, JwtConfig, JwtHeader, TokenType},
    AuthenticatorError, BoxFuture, ClaimOverlay, CredentialValidator, LastLoginRecorder,
    OsRngCsrfGenerator, SessionSideEffects, SiteSettings, SiteSettingsProvider, SsoPolicy,
    ThrottledAuthenticator, ThrottlingContext, TokenIssuer, TokenService, TokenSigner, UserAccount,
};
use uuid::Uuid;

pub const PASSWORD: &str = "correct horse battery staple";

pub fn account(email: &str, is_confirmed: bool, is_active: bool) -> UserAccount {
    UserAccount {
        id: Uuid::new_v4(),
        email: email.to_string(),
        is_active,
        is_confirmed,
        is_staff: false,
        last_login: None,
    }
}

/// Accounts keyed by email with a plaintext password; counts every call.
#[derive(Default)]
pub struct StubAuthenticator {
    accounts: HashMap<String, (String, UserAccount)>,
    throttled: bool,
    calls: AtomicUsize,
}

impl StubAuthenticator {
    pub fn with_account(mut self, account: UserAccount) -> Self {
        self.accounts
            .insert(account.email.clone(), (PASSWORD.to_string(), account));
        self
    }

    pub fn throttled(mut self) -> Self {
        self.throttled = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ThrottledAuthenticator for StubAuthenticator {
    fn authenticate<'a>(
        &'a self,
        _context: &'a ThrottlingContext,
        email: &'a str,
        password: &'a SecretString,
    ) -> BoxFuture<'a, Result<Option<UserAccount>, AuthenticatorError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = if self.throttled {
            Err(AuthenticatorError::Throttled)
        } else {
            Ok(self
                .accounts
                .get(email)
                .filter(|(expected, _)| expected == password.expose_secret())
                .map(|(_, account)| account.clone()))
        };
        Box::pin(async move { result })
    }
}

pub struct StaticSettings(pub SiteSettings);

impl SiteSettingsProvider for StaticSettings {
    fn site_settings(&self) -> BoxFuture<'_, anyhow::Result<SiteSettings>> {
        let settings = self.0;
        Box::pin(async move { Ok(settings) })
    }
}

/// Produces real claim sets with a placeholder signature.
#[derive(Default)]
pub struct UnsignedSigner {
    config: JwtConfig,
}

impl UnsignedSigner {
    fn sign(
        &self,
        account: &UserAccount,
        token_type: TokenType,
        overlay: &ClaimOverlay,
    ) -> anyhow::Result<String> {
        let claims = self
            .config
            .claims(account, token_type, overlay, Utc::now().timestamp());
        let input = signing_input(&JwtHeader::eddsa("test"), &claims)?;
        Ok(format!("{input}.unsigned"))
    }
}

impl TokenSigner for UnsignedSigner {
    fn create_access_token<'a>(
        &'a self,
        account: &'a UserAccount,
        overlay: &'a ClaimOverlay,
    ) -> BoxFuture<'a, anyhow::Result<String>> {
        let token = self.sign(account, TokenType::Access, overlay);
        Box::pin(async move { token })
    }

    fn create_refresh_token<'a>(
        &'a self,
        account: &'a UserAccount,
        overlay: &'a ClaimOverlay,
    ) -> BoxFuture<'a, anyhow::Result<String>> {
        let token = self.sign(account, TokenType::Refresh, overlay);
        Box::pin(async move { token })
    }
}

#[derive(Default)]
pub struct RecordingLastLogin {
    seen: Mutex<Vec<Uuid>>,
}

impl RecordingLastLogin {
    pub fn seen(&self) -> Vec<Uuid> {
        self.seen.lock().map(|seen| seen.clone()).unwrap_or_default()
    }
}

impl LastLoginRecorder for RecordingLastLogin {
    fn update_last_login_if_required(&self, account: &UserAccount) {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(account.id);
        }
    }
}

pub struct Harness {
    pub service: TokenService,
    pub authenticator: Arc<StubAuthenticator>,
    pub last_login: Arc<RecordingLastLogin>,
}

pub fn harness(sso: SsoPolicy, authenticator: StubAuthenticator, settings: SiteSettings) -> Harness {
    let authenticator = Arc::new(authenticator);
    let last_login = Arc::new(RecordingLastLogin::default());
    let service = TokenService::new(
        sso,
        CredentialValidator::new(authenticator.clone()),
        Arc::new(StaticSettings(settings)),
        TokenIssuer::new(Arc::new(UnsignedSigner::default()), Arc::new(OsRngCsrfGenerator)),
        SessionSideEffects::new(last_login.clone()),
    );
    Harness {
        service,
        authenticator,
        last_login,
    }
}

pub const CONFIRMATION_REQUIRED: SiteSettings = SiteSettings {
    allow_login_without_confirmation: false,
    enable_account_confirmation_by_email: true,
};

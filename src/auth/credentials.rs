//! Credential check through the throttled authenticator.
//!
//! Security boundaries: every "no" from the collaborator, whether the email is
//! unknown, the password is wrong or the attempt was throttled, collapses into
//! the same `InvalidCredentials` failure so callers cannot enumerate accounts.

use regex::Regex;
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{
    account::UserAccount,
    error::{AuthFailure, AuthenticatorError, InternalError, Rejection},
    BoxFuture,
};

/// Email and password for a single attempt.
#[derive(Clone, Debug)]
pub struct Credentials {
    email: String,
    password: SecretString,
}

impl Credentials {
    #[must_use]
    pub fn new(email: &str, password: SecretString) -> Self {
        Self {
            email: normalize_email(email),
            password,
        }
    }

    /// Normalized (trimmed, lowercased) email.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn password(&self) -> &SecretString {
        &self.password
    }
}

/// Request metadata handed to the throttling collaborator.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ThrottlingContext {
    pub client_ip: Option<String>,
}

impl ThrottlingContext {
    #[must_use]
    pub fn new(client_ip: Option<String>) -> Self {
        Self { client_ip }
    }
}

pub trait ThrottledAuthenticator: Send + Sync {
    /// Resolve the account for the given credentials, or `None` on no match.
    fn authenticate<'a>(
        &'a self,
        context: &'a ThrottlingContext,
        email: &'a str,
        password: &'a SecretString,
    ) -> BoxFuture<'a, Result<Option<UserAccount>, AuthenticatorError>>;
}

#[derive(Clone)]
pub struct CredentialValidator {
    authenticator: Arc<dyn ThrottledAuthenticator>,
}

impl CredentialValidator {
    #[must_use]
    pub fn new(authenticator: Arc<dyn ThrottledAuthenticator>) -> Self {
        Self { authenticator }
    }

    pub(crate) async fn authenticate(
        &self,
        credentials: &Credentials,
        context: &ThrottlingContext,
    ) -> Result<UserAccount, Rejection> {
        let result = self
            .authenticator
            .authenticate(context, credentials.email(), credentials.password())
            .await;

        match result {
            Ok(Some(account)) => Ok(account),
            Ok(None) => {
                debug!("credential check did not match");
                Err(AuthFailure::invalid_credentials().into())
            }
            Err(AuthenticatorError::Throttled) => {
                warn!(client_ip = ?context.client_ip, "credential check throttled");
                Err(AuthFailure::invalid_credentials().into())
            }
            Err(AuthenticatorError::Backend(err)) => Err(InternalError::Authenticator(err).into()),
        }
    }
}

/// Normalize an email for lookups.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(crate) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::FailureKind;
    use anyhow::anyhow;
    use secrecy::ExposeSecret;

    struct Scripted(fn() -> Result<Option<UserAccount>, AuthenticatorError>);

    impl ThrottledAuthenticator for Scripted {
        fn authenticate<'a>(
            &'a self,
            _context: &'a ThrottlingContext,
            _email: &'a str,
            _password: &'a SecretString,
        ) -> BoxFuture<'a, Result<Option<UserAccount>, AuthenticatorError>> {
            let result = (self.0)();
            Box::pin(async move { result })
        }
    }

    fn credentials() -> Credentials {
        Credentials::new("alice@example.com", SecretString::from("hunter2"))
    }

    fn failure_kind(rejection: Rejection) -> Option<FailureKind> {
        match rejection {
            Rejection::Denied(failure) => Some(failure.kind),
            Rejection::Internal(_) => None,
        }
    }

    #[test]
    fn credentials_normalize_email_and_hide_password() {
        let credentials = Credentials::new(" Alice@Example.COM ", SecretString::from("hunter2"));
        assert_eq!(credentials.email(), "alice@example.com");
        assert_eq!(credentials.password().expose_secret(), "hunter2");
        assert!(!format!("{credentials:?}").contains("hunter2"));
    }

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("a@example.com"));
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-domain@"));
    }

    #[tokio::test]
    async fn no_match_is_invalid_credentials() {
        let validator = CredentialValidator::new(Arc::new(Scripted(|| Ok(None))));
        let result = validator
            .authenticate(&credentials(), &ThrottlingContext::default())
            .await;
        assert_eq!(
            result.err().and_then(failure_kind),
            Some(FailureKind::InvalidCredentials)
        );
    }

    #[tokio::test]
    async fn throttled_is_indistinguishable_from_no_match() {
        let validator =
            CredentialValidator::new(Arc::new(Scripted(|| Err(AuthenticatorError::Throttled))));
        let result = validator
            .authenticate(&credentials(), &ThrottlingContext::default())
            .await;
        match result {
            Err(Rejection::Denied(failure)) => {
                assert_eq!(failure, AuthFailure::invalid_credentials());
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn backend_fault_is_internal() {
        let validator = CredentialValidator::new(Arc::new(Scripted(|| {
            Err(AuthenticatorError::Backend(anyhow!("connection reset")))
        })));
        let result = validator
            .authenticate(&credentials(), &ThrottlingContext::default())
            .await;
        assert!(matches!(
            result,
            Err(Rejection::Internal(InternalError::Authenticator(_)))
        ));
    }
}

//! Failure taxonomy for token issuance.
//!
//! User-correctable denials are [`AuthFailure`] values carried inside
//! [`AuthenticationOutcome`](super::AuthenticationOutcome). Infrastructure
//! faults are [`InternalError`] and travel on the `Err` side instead, so a
//! transport can never confuse the two.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Field every denial is attributed to.
pub const EMAIL_FIELD: &str = "email";

pub(crate) const MSG_CREDENTIALS_DISABLED: &str =
    "Password authentication is disabled. Please use SSO to login.";
pub(crate) const MSG_INVALID_CREDENTIALS: &str = "Please, enter valid credentials";
pub(crate) const MSG_ACCOUNT_NOT_CONFIRMED: &str = "Account needs to be confirmed via email.";
pub(crate) const MSG_INACTIVE: &str = "Account inactive.";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    /// Password login is switched off for this deployment (SSO only).
    CredentialsDisabled,
    /// No account matched, or the throttling collaborator refused the attempt.
    InvalidCredentials,
    AccountNotConfirmed,
    Inactive,
}

impl FailureKind {
    /// Stable wire code.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::CredentialsDisabled => "CREDENTIALS_DISABLED",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::AccountNotConfirmed => "ACCOUNT_NOT_CONFIRMED",
            Self::Inactive => "INACTIVE",
        }
    }

    fn default_message(self) -> &'static str {
        match self {
            Self::CredentialsDisabled => MSG_CREDENTIALS_DISABLED,
            Self::InvalidCredentials => MSG_INVALID_CREDENTIALS,
            Self::AccountNotConfirmed => MSG_ACCOUNT_NOT_CONFIRMED,
            Self::Inactive => MSG_INACTIVE,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A user-facing denial, always attributed to the `email` field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AuthFailure {
    pub kind: FailureKind,
    pub field: &'static str,
    pub message: &'static str,
}

impl AuthFailure {
    #[must_use]
    pub fn new(kind: FailureKind) -> Self {
        Self {
            kind,
            field: EMAIL_FIELD,
            message: kind.default_message(),
        }
    }

    #[must_use]
    pub fn credentials_disabled() -> Self {
        Self::new(FailureKind::CredentialsDisabled)
    }

    #[must_use]
    pub fn invalid_credentials() -> Self {
        Self::new(FailureKind::InvalidCredentials)
    }

    #[must_use]
    pub fn account_not_confirmed() -> Self {
        Self::new(FailureKind::AccountNotConfirmed)
    }

    #[must_use]
    pub fn inactive() -> Self {
        Self::new(FailureKind::Inactive)
    }
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.field, self.message, self.kind)
    }
}

/// Server-side fault while processing an attempt. Not attributed to a field.
#[derive(Debug, Error)]
pub enum InternalError {
    #[error("credential backend failed")]
    Authenticator(#[source] anyhow::Error),
    #[error("site settings unavailable")]
    SiteSettings(#[source] anyhow::Error),
    #[error("csrf token generation failed")]
    Csrf(#[source] anyhow::Error),
    #[error("token signing failed")]
    Signing(#[source] anyhow::Error),
}

/// Error returned by a [`ThrottledAuthenticator`](super::ThrottledAuthenticator).
#[derive(Debug, Error)]
pub enum AuthenticatorError {
    /// The attempt was refused by rate limiting or lockout.
    #[error("authentication attempt throttled")]
    Throttled,
    #[error("credential backend failed")]
    Backend(#[source] anyhow::Error),
}

/// Anything that stops an attempt: a denial or an internal fault.
#[derive(Debug)]
pub(crate) enum Rejection {
    Denied(AuthFailure),
    Internal(InternalError),
}

impl From<AuthFailure> for Rejection {
    fn from(failure: AuthFailure) -> Self {
        Self::Denied(failure)
    }
}

impl From<InternalError> for Rejection {
    fn from(err: InternalError) -> Self {
        Self::Internal(err)
    }
}

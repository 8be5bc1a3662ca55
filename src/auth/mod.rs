//! Password token issuance.
//!
//! This module owns the decision flow behind `create_token` and the traits it
//! uses to reach its collaborators (credential store, throttling, site
//! settings, signing, CSRF generation, last-login bookkeeping).
//!
//! ## Gate order
//!
//! 1. [`SsoPolicy`]: SSO-only deployments reject password logins before any
//!    lookup, so no throttling budget is spent and no timing is leaked.
//! 2. [`CredentialValidator`]: unknown email, wrong password and throttled
//!    attempts all produce the same `InvalidCredentials` failure.
//! 3. [`check_state`]: confirmation (when required by [`SiteSettings`]) before
//!    activity.
//! 4. [`TokenIssuer`]: CSRF token, claim overlays, signed tokens.
//! 5. [`SessionSideEffects`]: request context and last login.
//!
//! Denials are returned as [`AuthenticationOutcome::Failure`]; collaborator
//! faults are [`InternalError`]s on the `Err` side.

use std::future::Future;
use std::pin::Pin;

mod account;
mod claims;
mod credentials;
mod error;
mod issuer;
pub mod jwt;
mod policy;
mod rate_limit;
mod service;
mod session;
pub mod storage;

pub use account::{check_state, SiteSettings, SiteSettingsProvider, UserAccount};
pub use claims::{Audience, ClaimOverlay, AUDIENCE_PREFIX, CSRF_CLAIM};
pub use credentials::{CredentialValidator, Credentials, ThrottledAuthenticator, ThrottlingContext};
pub use error::{AuthFailure, AuthenticatorError, FailureKind, InternalError, EMAIL_FIELD};
pub use issuer::{CsrfGenerator, IssuedSession, OsRngCsrfGenerator, TokenIssuer, TokenSigner};
pub use policy::{SsoPolicy, SSO_ONLY_ENV};
pub use rate_limit::{
    NoopRateLimiter, PasswordVerifier, RateLimitAction, RateLimitDecision, RateLimitedAuthenticator,
    RateLimiter,
};
pub use service::{AuthenticationOutcome, TokenService};
pub use session::{
    LastLoginPolicy, LastLoginRecorder, RequestContext, SessionSideEffects,
    DEFAULT_LAST_LOGIN_THRESHOLD,
};

/// Boxed future returned by collaborator traits so they stay object safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

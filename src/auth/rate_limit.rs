//! Throttling seam for the credential check.
//!
//! The limiter's counters and windows live behind [`RateLimiter`]; the
//! decision flow only sees the pass/fail result through
//! [`RateLimitedAuthenticator`].

use secrecy::SecretString;
use std::sync::Arc;

use super::{
    account::UserAccount,
    credentials::{ThrottledAuthenticator, ThrottlingContext},
    error::AuthenticatorError,
    BoxFuture,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitAction {
    Login,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited,
}

pub trait RateLimiter: Send + Sync {
    fn check_ip(&self, ip: Option<&str>, action: RateLimitAction) -> RateLimitDecision;
    fn check_email(&self, email: &str, action: RateLimitAction) -> RateLimitDecision;
}

#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check_ip(&self, _ip: Option<&str>, _action: RateLimitAction) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }

    fn check_email(&self, _email: &str, _action: RateLimitAction) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }
}

/// Looks up an account by email and password. No throttling of its own.
pub trait PasswordVerifier: Send + Sync {
    fn verify<'a>(
        &'a self,
        email: &'a str,
        password: &'a SecretString,
    ) -> BoxFuture<'a, anyhow::Result<Option<UserAccount>>>;
}

/// Consults the limiter (per IP, then per email) before verifying.
pub struct RateLimitedAuthenticator<V> {
    verifier: V,
    limiter: Arc<dyn RateLimiter>,
}

impl<V: PasswordVerifier> RateLimitedAuthenticator<V> {
    pub fn new(verifier: V, limiter: Arc<dyn RateLimiter>) -> Self {
        Self { verifier, limiter }
    }
}

impl<V: PasswordVerifier> ThrottledAuthenticator for RateLimitedAuthenticator<V> {
    fn authenticate<'a>(
        &'a self,
        context: &'a ThrottlingContext,
        email: &'a str,
        password: &'a SecretString,
    ) -> BoxFuture<'a, Result<Option<UserAccount>, AuthenticatorError>> {
        Box::pin(async move {
            if self
                .limiter
                .check_ip(context.client_ip.as_deref(), RateLimitAction::Login)
                == RateLimitDecision::Limited
            {
                return Err(AuthenticatorError::Throttled);
            }
            if self.limiter.check_email(email, RateLimitAction::Login) == RateLimitDecision::Limited
            {
                return Err(AuthenticatorError::Throttled);
            }

            self.verifier
                .verify(email, password)
                .await
                .map_err(AuthenticatorError::Backend)
        })
    }
}

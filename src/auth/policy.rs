//! Deployment-mode gate for password logins.
//!
//! The SSO-only flag is resolved on every attempt. With
//! [`SsoPolicy::Environment`] the variable is re-read each call, so operators
//! can flip it without restarting the process.

use std::env;

use super::error::AuthFailure;

/// Default variable holding the SSO-only switch.
pub const SSO_ONLY_ENV: &str = "SSO_ONLY_ENABLED";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SsoPolicy {
    /// Read the named environment variable on every attempt.
    Environment(String),
    /// Fixed value, for embedding and tests.
    Fixed(bool),
}

impl Default for SsoPolicy {
    fn default() -> Self {
        Self::Environment(SSO_ONLY_ENV.to_string())
    }
}

impl SsoPolicy {
    #[must_use]
    pub fn is_sso_only_enabled(&self) -> bool {
        match self {
            Self::Environment(var) => env::var(var).is_ok_and(|value| flag_enabled(&value)),
            Self::Fixed(enabled) => *enabled,
        }
    }

    /// Reject password logins when the deployment is SSO only.
    ///
    /// # Errors
    /// Returns `CredentialsDisabled` when SSO-only mode is on.
    pub fn check_sso_policy(&self) -> Result<(), AuthFailure> {
        if self.is_sso_only_enabled() {
            return Err(AuthFailure::credentials_disabled());
        }
        Ok(())
    }
}

fn flag_enabled(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::FailureKind;

    const TEST_VAR: &str = "TOKENGATE_TEST_SSO_ONLY";

    #[test]
    fn flag_accepts_truthy_values_case_insensitive() {
        for value in ["true", "TRUE", "True", "1", "yes", "YES"] {
            assert!(flag_enabled(value), "{value} should enable SSO-only mode");
        }
        for value in ["", "0", "false", "no", "on", "enabled"] {
            assert!(!flag_enabled(value), "{value} should not enable SSO-only mode");
        }
    }

    #[test]
    fn environment_policy_rereads_variable_each_call() {
        let policy = SsoPolicy::Environment(TEST_VAR.to_string());

        temp_env::with_var(TEST_VAR, None::<&str>, || {
            assert!(!policy.is_sso_only_enabled());
        });
        temp_env::with_var(TEST_VAR, Some("Yes"), || {
            assert!(policy.is_sso_only_enabled());
        });
        temp_env::with_var(TEST_VAR, Some("0"), || {
            assert!(!policy.is_sso_only_enabled());
        });
    }

    #[test]
    fn check_sso_policy_rejects_when_enabled() {
        let failure = SsoPolicy::Fixed(true).check_sso_policy().err();
        assert_eq!(
            failure.as_ref().map(|f| f.kind),
            Some(FailureKind::CredentialsDisabled)
        );
        assert_eq!(failure.map(|f| f.field), Some("email"));
        assert!(SsoPolicy::Fixed(false).check_sso_policy().is_ok());
    }

    #[test]
    fn default_policy_reads_sso_only_enabled() {
        assert_eq!(
            SsoPolicy::default(),
            SsoPolicy::Environment(SSO_ONLY_ENV.to_string())
        );
    }
}

//! Account state policy: confirmation first, then activity.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{error::AuthFailure, BoxFuture};

/// Account resolved by the credential check. Owned by the external store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UserAccount {
    pub id: Uuid,
    pub email: String,
    pub is_active: bool,
    pub is_confirmed: bool,
    pub is_staff: bool,
    pub last_login: Option<DateTime<Utc>>,
}

/// Site-wide login settings, read once per attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SiteSettings {
    pub allow_login_without_confirmation: bool,
    pub enable_account_confirmation_by_email: bool,
}

impl SiteSettings {
    /// Whether an unconfirmed account must be turned away.
    #[must_use]
    pub fn requires_confirmation(&self) -> bool {
        !self.allow_login_without_confirmation && self.enable_account_confirmation_by_email
    }
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            allow_login_without_confirmation: true,
            enable_account_confirmation_by_email: false,
        }
    }
}

pub trait SiteSettingsProvider: Send + Sync {
    /// Current settings. Implementations must not cache across attempts.
    fn site_settings(&self) -> BoxFuture<'_, anyhow::Result<SiteSettings>>;
}

/// Apply confirmation and activity policy to a resolved account.
///
/// # Errors
/// Returns `AccountNotConfirmed` when the site requires confirmation and the
/// account has none (even if it is also inactive), otherwise `Inactive` for a
/// disabled account.
pub fn check_state(account: &UserAccount, settings: &SiteSettings) -> Result<(), AuthFailure> {
    if !account.is_confirmed && settings.requires_confirmation() {
        return Err(AuthFailure::account_not_confirmed());
    }

    if !account.is_active {
        return Err(AuthFailure::inactive());
    }

    Ok(())
}

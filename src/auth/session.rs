//! Session bookkeeping after a successful issuance.
//!
//! Flow Overview: the refresh token and the authenticated user are attached to
//! the per-request [`RequestContext`] so the transport (cookie) and anything
//! else handling the same request see them; then the last-login recorder is
//! asked to update the account if its policy says it is due.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;

use super::account::UserAccount;

pub const DEFAULT_LAST_LOGIN_THRESHOLD: Duration = Duration::from_secs(60);

/// Per-request state shared with the transport.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    refresh_token: Option<String>,
    user: Option<UserAccount>,
}

impl RequestContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    #[must_use]
    pub fn user(&self) -> Option<&UserAccount> {
        self.user.as_ref()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

pub trait LastLoginRecorder: Send + Sync {
    /// Update the account's last login when due. Must not block the caller on
    /// the write.
    fn update_last_login_if_required(&self, account: &UserAccount);
}

/// Debounce for last-login writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LastLoginPolicy {
    threshold: Duration,
}

impl Default for LastLoginPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_LAST_LOGIN_THRESHOLD)
    }
}

impl LastLoginPolicy {
    #[must_use]
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }

    #[must_use]
    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// A write is due when there is no previous login or it is older than the
    /// threshold.
    #[must_use]
    pub fn is_update_required(&self, last_login: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        let Some(last_login) = last_login else {
            return true;
        };
        let threshold = ChronoDuration::from_std(self.threshold).unwrap_or(ChronoDuration::MAX);
        now.signed_duration_since(last_login) >= threshold
    }
}

#[derive(Clone)]
pub struct SessionSideEffects {
    recorder: Arc<dyn LastLoginRecorder>,
}

impl SessionSideEffects {
    #[must_use]
    pub fn new(recorder: Arc<dyn LastLoginRecorder>) -> Self {
        Self { recorder }
    }

    pub fn apply(&self, context: &mut RequestContext, account: &UserAccount, refresh_token: &str) {
        context.refresh_token = Some(refresh_token.to_string());
        context.user = Some(account.clone());
        self.recorder.update_last_login_if_required(account);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct RecordingRecorder {
        seen: Mutex<Vec<Uuid>>,
    }

    impl LastLoginRecorder for RecordingRecorder {
        fn update_last_login_if_required(&self, account: &UserAccount) {
            if let Ok(mut seen) = self.seen.lock() {
                seen.push(account.id);
            }
        }
    }

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
    fn apply_attaches_identity_and_records_login() {
        let recorder = Arc::new(RecordingRecorder::default());
        let side_effects = SessionSideEffects::new(recorder.clone());
        let account = account();
        let mut context = RequestContext::new();
        assert!(!context.is_authenticated());

        side_effects.apply(&mut context, &account, "refresh-token");

        assert_eq!(context.refresh_token(), Some("refresh-token"));
        assert_eq!(context.user().map(|user| user.id), Some(account.id));
        let seen = recorder.seen.lock().map(|seen| seen.clone()).unwrap_or_default();
        assert_eq!(seen, vec![account.id]);
    }

    #[test]
    fn last_login_policy_debounces_recent_logins() {
        let policy = LastLoginPolicy::default();
        let now = Utc::now();

        assert!(policy.is_update_required(None, now));
        assert!(!policy.is_update_required(Some(now - ChronoDuration::seconds(10)), now));
        assert!(policy.is_update_required(Some(now - ChronoDuration::seconds(60)), now));
        assert!(policy.is_update_required(Some(now - ChronoDuration::hours(3)), now));
    }

    #[test]
    fn zero_threshold_always_updates() {
        let policy = LastLoginPolicy::new(Duration::ZERO);
        let now = Utc::now();
        assert!(policy.is_update_required(Some(now), now));
    }
}

//! Postgres-backed collaborators: password check, site settings, last login.
//!
//! Password hashes are compared by `pgcrypto` (`crypt()`), so the plaintext
//! only crosses the wire to the database as a bind parameter and no hashing
//! happens in process.
//!
//! Every lookup hashes exactly once: when the email is unknown (or the account
//! has no password) the candidate is hashed against [`DUMMY_PASSWORD_HASH`],
//! so response time does not reveal whether an email is registered.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::{debug, error, Instrument};
use uuid::Uuid;

use super::{
    account::{SiteSettings, SiteSettingsProvider, UserAccount},
    credentials::valid_email,
    rate_limit::PasswordVerifier,
    session::{LastLoginPolicy, LastLoginRecorder},
    BoxFuture,
};

/// Bcrypt hash of no account's password. Its cost (10) must match the cost
/// used for stored hashes.
pub const DUMMY_PASSWORD_HASH: &str =
    "$2a$10$N9qo8uLOickgx2ZMRZoMyeIjZAgcfl7p92ldGxad68LJZdL17lhWy";

// Always one row, and `crypt` sits in the select list so no filter can skip it.
const VERIFY_PASSWORD_QUERY: &str = r"
    SELECT u.id, u.email, u.is_active, u.is_confirmed, u.is_staff, u.last_login,
           COALESCE(u.password_hash = crypt($2, COALESCE(u.password_hash, $3)), FALSE)
               AS password_matches
    FROM (SELECT 1) AS attempt
    LEFT JOIN users u ON u.email = $1
";

const SITE_SETTINGS_QUERY: &str = r"
    SELECT allow_login_without_confirmation, enable_account_confirmation_by_email
    FROM site_settings
    WHERE id = 1
";

const TOUCH_LAST_LOGIN_QUERY: &str = "UPDATE users SET last_login = now() WHERE id = $1";

#[derive(Clone, Debug)]
pub struct PgAuthStore {
    pool: PgPool,
    last_login: LastLoginPolicy,
}

impl PgAuthStore {
    #[must_use]
    pub fn new(pool: PgPool, last_login: LastLoginPolicy) -> Self {
        Self { pool, last_login }
    }

    async fn lookup_account(&self, email: &str, password: &SecretString) -> Result<Option<UserAccount>> {
        // Malformed addresses cannot match a stored account.
        if !valid_email(email) {
            return Ok(None);
        }

        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = VERIFY_PASSWORD_QUERY
        );
        let row = sqlx::query(VERIFY_PASSWORD_QUERY)
            .bind(email)
            .bind(password.expose_secret())
            .bind(DUMMY_PASSWORD_HASH)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .context("failed to verify credentials")?;

        let matches: bool = row
            .try_get("password_matches")
            .context("invalid password_matches")?;
        if !matches {
            return Ok(None);
        }

        account_from_row(&row).map(Some)
    }

    async fn load_site_settings(&self) -> Result<SiteSettings> {
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = SITE_SETTINGS_QUERY
        );
        let row = sqlx::query(SITE_SETTINGS_QUERY)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to load site settings")?;

        let Some(row) = row else {
            debug!("no site_settings row, using defaults");
            return Ok(SiteSettings::default());
        };

        Ok(SiteSettings {
            allow_login_without_confirmation: row
                .try_get("allow_login_without_confirmation")
                .context("invalid allow_login_without_confirmation")?,
            enable_account_confirmation_by_email: row
                .try_get("enable_account_confirmation_by_email")
                .context("invalid enable_account_confirmation_by_email")?,
        })
    }
}

fn account_from_row(row: &PgRow) -> Result<UserAccount> {
    Ok(UserAccount {
        id: row.try_get::<Uuid, _>("id").context("invalid user id")?,
        email: row.try_get("email").context("invalid user email")?,
        is_active: row.try_get("is_active").context("invalid is_active")?,
        is_confirmed: row.try_get("is_confirmed").context("invalid is_confirmed")?,
        is_staff: row.try_get("is_staff").context("invalid is_staff")?,
        last_login: row
            .try_get::<Option<DateTime<Utc>>, _>("last_login")
            .context("invalid last_login")?,
    })
}

async fn touch_last_login(pool: &PgPool, user_id: Uuid) -> Result<()> {
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = TOUCH_LAST_LOGIN_QUERY
    );
    sqlx::query(TOUCH_LAST_LOGIN_QUERY)
        .bind(user_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update last login")?;
    Ok(())
}

impl PasswordVerifier for PgAuthStore {
    fn verify<'a>(
        &'a self,
        email: &'a str,
        password: &'a SecretString,
    ) -> BoxFuture<'a, Result<Option<UserAccount>>> {
        Box::pin(self.lookup_account(email, password))
    }
}

impl SiteSettingsProvider for PgAuthStore {
    fn site_settings(&self) -> BoxFuture<'_, Result<SiteSettings>> {
        Box::pin(self.load_site_settings())
    }
}

impl LastLoginRecorder for PgAuthStore {
    fn update_last_login_if_required(&self, account: &UserAccount) {
        if !self
            .last_login
            .is_update_required(account.last_login, Utc::now())
        {
            return;
        }

        let pool = self.pool.clone();
        let user_id = account.id;
        tokio::spawn(
            async move {
                if let Err(err) = touch_last_login(&pool, user_id).await {
                    error!("Failed to update last login: {err:#}");
                }
            }
            .in_current_span(),
        );
    }
}

//! `create_token`: the single-pass decision flow.

use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::{
    account::{check_state, SiteSettingsProvider},
    claims::Audience,
    credentials::{CredentialValidator, Credentials, ThrottlingContext},
    error::{AuthFailure, InternalError, Rejection},
    issuer::{IssuedSession, TokenIssuer},
    policy::SsoPolicy,
    session::{RequestContext, SessionSideEffects},
};

#[derive(Debug)]
pub enum AuthenticationOutcome {
    Success(IssuedSession),
    Failure(AuthFailure),
}

impl AuthenticationOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    #[must_use]
    pub fn failure(&self) -> Option<&AuthFailure> {
        match self {
            Self::Failure(failure) => Some(failure),
            Self::Success(_) => None,
        }
    }
}

#[derive(Clone)]
pub struct TokenService {
    sso: SsoPolicy,
    validator: CredentialValidator,
    settings: Arc<dyn SiteSettingsProvider>,
    issuer: TokenIssuer,
    side_effects: SessionSideEffects,
}

impl TokenService {
    #[must_use]
    pub fn new(
        sso: SsoPolicy,
        validator: CredentialValidator,
        settings: Arc<dyn SiteSettingsProvider>,
        issuer: TokenIssuer,
        side_effects: SessionSideEffects,
    ) -> Self {
        Self {
            sso,
            validator,
            settings,
            issuer,
            side_effects,
        }
    }

    /// Authenticate `credentials` and issue a session.
    ///
    /// Gates run in a fixed order (SSO-only, credentials, confirmation,
    /// activity); the first denial ends the attempt and nothing after it runs.
    ///
    /// # Errors
    /// Returns an [`InternalError`] when a collaborator fails for reasons the
    /// caller cannot correct (backend, settings, CSRF generation, signing).
    #[instrument(skip_all, fields(email = %credentials.email(), client_ip = ?throttling.client_ip))]
    pub async fn create_token(
        &self,
        context: &mut RequestContext,
        credentials: &Credentials,
        audience: Option<&Audience>,
        throttling: &ThrottlingContext,
    ) -> Result<AuthenticationOutcome, InternalError> {
        match self.run(context, credentials, audience, throttling).await {
            Ok(session) => {
                info!(user_id = %session.user.id, "token created");
                Ok(AuthenticationOutcome::Success(session))
            }
            Err(Rejection::Denied(failure)) => {
                info!(kind = %failure.kind, "token request denied");
                Ok(AuthenticationOutcome::Failure(failure))
            }
            Err(Rejection::Internal(err)) => {
                warn!(error = %err, "token request failed");
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        context: &mut RequestContext,
        credentials: &Credentials,
        audience: Option<&Audience>,
        throttling: &ThrottlingContext,
    ) -> Result<IssuedSession, Rejection> {
        self.sso.check_sso_policy()?;

        let account = self.validator.authenticate(credentials, throttling).await?;

        let settings = self
            .settings
            .site_settings()
            .await
            .map_err(InternalError::SiteSettings)?;
        check_state(&account, &settings)?;

        let session = self.issuer.issue(account, audience).await?;

        self.side_effects
            .apply(context, &session.user, &session.refresh_token);

        Ok(session)
    }
}

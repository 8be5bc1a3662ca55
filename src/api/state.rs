//! Token endpoint configuration and shared handler state.

use std::time::Duration;

use crate::auth::{
    jwt::{JwtConfig, DEFAULT_ACCESS_TTL, DEFAULT_ISSUER, DEFAULT_REFRESH_TTL},
    LastLoginPolicy, TokenService, DEFAULT_LAST_LOGIN_THRESHOLD,
};

pub const DEFAULT_TRANSIT_MOUNT: &str = "transit/tokengate";
pub const DEFAULT_TRANSIT_KEY: &str = "tokengate-jwt";

#[derive(Clone, Debug)]
pub struct AuthConfig {
    issuer: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
    transit_mount: String,
    transit_key: String,
    cookie_secure: bool,
    last_login_threshold: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: DEFAULT_ISSUER.to_string(),
            access_ttl: DEFAULT_ACCESS_TTL,
            refresh_ttl: DEFAULT_REFRESH_TTL,
            transit_mount: DEFAULT_TRANSIT_MOUNT.to_string(),
            transit_key: DEFAULT_TRANSIT_KEY.to_string(),
            cookie_secure: true,
            last_login_threshold: DEFAULT_LAST_LOGIN_THRESHOLD,
        }
    }
}

impl AuthConfig {
    #[must_use]
    pub fn with_issuer(mut self, issuer: String) -> Self {
        self.issuer = issuer;
        self
    }

    #[must_use]
    pub fn with_access_ttl(mut self, ttl: Duration) -> Self {
        self.access_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_refresh_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_transit_mount(mut self, mount: String) -> Self {
        self.transit_mount = mount;
        self
    }

    #[must_use]
    pub fn with_transit_key(mut self, key: String) -> Self {
        self.transit_key = key;
        self
    }

    #[must_use]
    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn with_last_login_threshold(mut self, threshold: Duration) -> Self {
        self.last_login_threshold = threshold;
        self
    }

    #[must_use]
    pub fn transit_mount(&self) -> &str {
        &self.transit_mount
    }

    #[must_use]
    pub fn transit_key(&self) -> &str {
        &self.transit_key
    }

    #[must_use]
    pub fn jwt_config(&self) -> JwtConfig {
        JwtConfig::default()
            .with_issuer(self.issuer.clone())
            .with_access_ttl(self.access_ttl)
            .with_refresh_ttl(self.refresh_ttl)
    }

    #[must_use]
    pub fn last_login_policy(&self) -> LastLoginPolicy {
        LastLoginPolicy::new(self.last_login_threshold)
    }

    pub(crate) fn cookie_secure(&self) -> bool {
        self.cookie_secure
    }

    /// The refresh cookie lives as long as the refresh token.
    pub(crate) fn refresh_cookie_max_age(&self) -> u64 {
        self.refresh_ttl.as_secs()
    }
}

/// Everything the token handler needs, shared behind an `Arc`.
pub struct AuthState {
    service: TokenService,
    config: AuthConfig,
}

impl AuthState {
    #[must_use]
    pub fn new(service: TokenService, config: AuthConfig) -> Self {
        Self { service, config }
    }

    #[must_use]
    pub fn service(&self) -> &TokenService {
        &self.service
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }
}

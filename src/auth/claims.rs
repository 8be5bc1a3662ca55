//! Claim overlays merged into signed tokens.
//!
//! Overlays are built fresh for every attempt from an optional audience and
//! never mutated afterwards.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Prefix applied to caller-supplied audiences.
pub const AUDIENCE_PREFIX: &str = "custom:";
pub const AUDIENCE_CLAIM: &str = "aud";
/// Refresh-token claim carrying the paired CSRF token.
pub const CSRF_CLAIM: &str = "csrfToken";

/// Caller-supplied audience tag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Audience(String);

impl Audience {
    /// Empty or missing audiences are treated as absent.
    #[must_use]
    pub fn parse(value: Option<&str>) -> Option<Self> {
        value
            .filter(|audience| !audience.is_empty())
            .map(|audience| Self(audience.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value stored in the `aud` claim.
    #[must_use]
    pub fn claim_value(&self) -> String {
        format!("{AUDIENCE_PREFIX}{}", self.0)
    }
}

/// Additional claims for one token.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ClaimOverlay(BTreeMap<String, Value>);

impl ClaimOverlay {
    /// Overlay for an access token: only the audience, if any.
    #[must_use]
    pub fn access(audience: Option<&Audience>) -> Self {
        Self(audience_entry(audience).into_iter().collect())
    }

    /// Overlay for a refresh token: the CSRF binding plus the audience, if any.
    #[must_use]
    pub fn refresh(csrf_token: &str, audience: Option<&Audience>) -> Self {
        Self(
            std::iter::once((CSRF_CLAIM.to_string(), Value::from(csrf_token)))
                .chain(audience_entry(audience))
                .collect(),
        )
    }

    #[must_use]
    pub fn get(&self, claim: &str) -> Option<&Value> {
        self.0.get(claim)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub(crate) fn to_map(&self) -> BTreeMap<String, Value> {
        self.0.clone()
    }
}

fn audience_entry(audience: Option<&Audience>) -> Option<(String, Value)> {
    audience.map(|audience| (AUDIENCE_CLAIM.to_string(), Value::from(audience.claim_value())))
}

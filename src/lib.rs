//! # Tokengate (password token issuance)
//!
//! `tokengate` authenticates a user by email and password and issues a
//! short-lived access token, a long-lived refresh token and a CSRF token bound
//! to the refresh token.
//!
//! ## Flow
//!
//! Every attempt runs a single pass through a fixed sequence of gates:
//!
//! 1. **SSO-only override:** when password login is disabled for the
//!    deployment, the attempt is rejected before any credential lookup.
//! 2. **Credentials:** a throttled authenticator resolves the account. Unknown
//!    emails and wrong passwords are reported identically.
//! 3. **Account state:** confirmation (when the site requires it) is checked
//!    before activity.
//! 4. **Issuance:** claims are composed (optional `custom:` audience, CSRF
//!    binding) and signed through Vault Transit.
//! 5. **Session side effects:** the request context receives the identity and
//!    refresh token, and the last-login timestamp is updated when due.
//!
//! The decision flow lives in [`auth`] and only talks to its collaborators
//! through traits; [`api`] wires the Postgres store, the Vault signer and the
//! HTTP transport around it.

pub mod api;
pub mod auth;
pub mod cli;
pub mod vault;

pub static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

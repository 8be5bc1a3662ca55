//! Vault HTTP calls used by tokengate: AppRole login (optionally through a
//! wrapped secret id), token renewal and Transit signing.

pub mod renew;
pub mod transit;

use crate::APP_USER_AGENT;
use anyhow::{anyhow, bail, Context, Result};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::{debug, info_span, instrument, Instrument};
use url::Url;

/// Lease assumed when a login response omits `lease_duration`.
const DEFAULT_LEASE_SECONDS: u64 = 1800;

/// Token obtained from an AppRole login.
#[derive(Debug)]
pub struct AppRoleToken {
    pub client_token: SecretString,
    pub lease_duration: u64,
}

pub(crate) fn vault_error_message(json_response: &Value) -> &str {
    json_response
        .pointer("/errors/0")
        .and_then(Value::as_str)
        .unwrap_or("")
}

pub(crate) fn client() -> Result<Client> {
    Ok(Client::builder().user_agent(APP_USER_AGENT).build()?)
}

/// Rebase `path` onto the scheme, host and port of `url`.
///
/// # Errors
/// Returns an error if `url` cannot be parsed, has no host, or is not http(s).
pub fn endpoint_url(url: &str, path: &str) -> Result<String> {
    let base = Url::parse(url).with_context(|| format!("invalid Vault URL: {url}"))?;

    if !matches!(base.scheme(), "http" | "https") {
        bail!("Error parsing URL: unsupported scheme {}", base.scheme());
    }

    let host = base
        .host_str()
        .ok_or_else(|| anyhow!("Error parsing URL: no host specified"))?;
    let port = base
        .port_or_known_default()
        .ok_or_else(|| anyhow!("Error parsing URL: no port for {}", base.scheme()))?;

    Ok(format!("{}://{host}:{port}{path}", base.scheme()))
}

/// POST `body` and return the JSON reply, or Vault's first error on a
/// non-success status.
async fn post_json(
    client: &Client,
    url: &str,
    token: Option<&str>,
    body: &Value,
    operation: &'static str,
) -> Result<Value> {
    let mut request = client.post(url).json(body);
    if let Some(token) = token {
        request = request.header("X-Vault-Token", token);
    }

    let span = info_span!("vault.request", http.method = "POST", vault.operation = operation, url = %url);
    let response = request.send().instrument(span).await?;
    let status = response.status();

    // Error bodies are not always JSON.
    let json_response: Value = response.json().await.unwrap_or(Value::Null);

    if !status.is_success() {
        bail!("{url} - {status}, {}", vault_error_message(&json_response));
    }

    Ok(json_response)
}

/// Exchange a response-wrapped token for the secret id it wraps.
/// Create one with:
/// vault write -wrap-ttl=300s -f auth/approle/role/tokengate/secret-id
///
/// # Errors
/// Returns an error if Vault rejects the token or the reply has no `secret_id`.
#[instrument(skip(wrapped_token))]
pub async fn unwrap(url: &str, wrapped_token: &str) -> Result<String> {
    let unwrap_url = endpoint_url(url, "/v1/sys/wrapping/unwrap")?;
    let reply = post_json(&client()?, &unwrap_url, Some(wrapped_token), &json!({}), "unwrap").await?;

    reply
        .pointer("/data/secret_id")
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| anyhow!("Error parsing JSON response: no secret_id found"))
}

/// Log in with `AppRole`. `url` is the full login endpoint.
///
/// # Errors
/// Returns an error if Vault rejects the credentials or the reply has no
/// `client_token`.
#[instrument(skip(secret_id))]
pub async fn approle_login(url: &str, secret_id: &str, role_id: &str) -> Result<AppRoleToken> {
    let body = json!({ "role_id": role_id, "secret_id": secret_id });
    let reply = post_json(&client()?, url, None, &body, "approle_login").await?;

    let client_token = reply
        .pointer("/auth/client_token")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("Error parsing JSON response: no client_token found"))?;
    let lease_duration = reply
        .pointer("/auth/lease_duration")
        .and_then(Value::as_u64)
        .unwrap_or(DEFAULT_LEASE_SECONDS);

    debug!(lease_duration, "approle login succeeded");

    Ok(AppRoleToken {
        client_token: SecretString::from(client_token.to_string()),
        lease_duration,
    })
}

/// Renew the client token and return the new lease in seconds.
///
/// # Errors
/// Returns an error if the renewal is refused or the reply has no lease.
#[instrument(skip(token))]
pub async fn renew_token(url: &str, token: &SecretString, increment: Option<u64>) -> Result<u64> {
    let renew_url = endpoint_url(url, "/v1/auth/token/renew-self")?;
    let body = json!({ "increment": increment.unwrap_or(0) });
    let reply = post_json(
        &client()?,
        &renew_url,
        Some(token.expose_secret()),
        &body,
        "renew_self",
    )
    .await?;

    reply
        .pointer("/auth/lease_duration")
        .and_then(Value::as_u64)
        .ok_or_else(|| anyhow!("Error parsing JSON response: no lease_duration found"))
}

/// Transit calls share the request plumbing.
pub(crate) async fn post_with_token(
    client: &Client,
    url: &str,
    token: &SecretString,
    body: &Value,
    operation: &'static str,
) -> Result<Value> {
    post_json(client, url, Some(token.expose_secret()), body, operation).await
}

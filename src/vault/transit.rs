//! Vault Transit signing. The private key never leaves Vault.

use anyhow::{anyhow, Context, Result};
use base64ct::{Base64, Encoding};
use reqwest::Client;
use secrecy::SecretString;
use serde_json::{json, Value};
use tracing::{error, instrument};

use crate::vault;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultSignature {
    pub key_version: u32,
    pub signature: Vec<u8>,
}

fn get_required_str<'a>(json_response: &'a Value, path: &[&str]) -> Option<&'a str> {
    let mut current = json_response;
    for key in path {
        current = current.get(*key)?;
    }
    current.as_str()
}

/// Parse `vault:v<N>:<base64>` into the key version and raw signature bytes.
fn parse_signature(signature: &str) -> Result<VaultSignature> {
    let mut parts = signature.split(':');
    let prefix = parts
        .next()
        .ok_or_else(|| anyhow!("invalid vault signature"))?;
    let version_part = parts
        .next()
        .ok_or_else(|| anyhow!("invalid vault signature"))?;
    let sig_b64 = parts
        .next()
        .ok_or_else(|| anyhow!("invalid vault signature"))?;
    if parts.next().is_some() {
        return Err(anyhow!("invalid vault signature"));
    }
    if prefix != "vault" {
        return Err(anyhow!("invalid vault signature prefix"));
    }
    let key_version = version_part
        .strip_prefix('v')
        .ok_or_else(|| anyhow!("invalid vault signature version"))?
        .parse::<u32>()
        .map_err(|_| anyhow!("invalid key version"))?;
    let signature = Base64::decode_vec(sig_b64)
        .map_err(|e| anyhow!("{e}"))
        .context("failed to decode vault signature")?;

    Ok(VaultSignature {
        key_version,
        signature,
    })
}

fn transit_path(mount: &str, suffix: &str) -> String {
    let mount = mount.trim_matches('/');
    format!("/v1/{mount}/{suffix}")
}

/// Sign `input` with the named transit key (latest version).
///
/// # Errors
/// Returns an error if the Vault request fails or the signature is missing/invalid.
#[instrument(skip(client, vault_token, input))]
pub async fn sign(
    client: &Client,
    vault_url: &str,
    vault_token: &SecretString,
    transit_mount: &str,
    key_name: &str,
    input: &[u8],
) -> Result<VaultSignature> {
    let sign_url = vault::endpoint_url(
        vault_url,
        &transit_path(transit_mount, &format!("sign/{key_name}")),
    )?;

    let payload = json!({
        "input": Base64::encode_string(input),
    });

    let json_response = vault::post_with_token(client, &sign_url, vault_token, &payload, "transit_sign")
        .await
        .inspect_err(|err| error!("Failed to sign via transit: {err:#}"))?;

    let signature = get_required_str(&json_response, &["data", "signature"]).ok_or_else(|| {
        error!("Missing signature in transit response");
        anyhow!("missing signature in transit response")
    })?;

    parse_signature(signature)
}

use crate::{
    api::{self, AuthConfig},
    cli::globals::GlobalArgs,
    vault,
};
use anyhow::{anyhow, Result};
use std::time::Duration;
use tracing::info;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub vault_url: String,
    pub vault_role_id: String,
    pub vault_secret_id: Option<String>,
    pub vault_wrapped_token: Option<String>,
    pub transit_mount: String,
    pub transit_key: String,
    pub issuer: String,
    pub access_token_ttl: u64,
    pub refresh_token_ttl: u64,
    pub cookie_secure: bool,
    pub last_login_threshold: u64,
}

impl Args {
    fn auth_config(&self) -> AuthConfig {
        AuthConfig::default()
            .with_issuer(self.issuer.clone())
            .with_access_ttl(Duration::from_secs(self.access_token_ttl))
            .with_refresh_ttl(Duration::from_secs(self.refresh_token_ttl))
            .with_transit_mount(self.transit_mount.clone())
            .with_transit_key(self.transit_key.clone())
            .with_cookie_secure(self.cookie_secure)
            .with_last_login_threshold(Duration::from_secs(self.last_login_threshold))
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if Vault login fails or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let mut globals = GlobalArgs::new(args.vault_url.clone());

    // If vault wrapped token try to unwrap, otherwise use secret-id.
    let secret_id = if let Some(wrapped) = &args.vault_wrapped_token {
        vault::unwrap(&globals.vault_url, wrapped).await?
    } else {
        args.vault_secret_id
            .clone()
            .ok_or_else(|| anyhow!("Vault secret-id is required"))?
    };

    let login = vault::approle_login(&globals.vault_url, &secret_id, &args.vault_role_id).await?;

    globals.set_token(login.client_token);

    let config = args.auth_config();

    api::new(args.port, args.dsn, &globals, config).await
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("dsn", redact_dsn(&args.dsn)),
        ("vault_url", args.vault_url.clone()),
        ("vault_role_id", args.vault_role_id.clone()),
        (
            "vault_secret_id_set",
            args.vault_secret_id.is_some().to_string(),
        ),
        (
            "vault_wrapped_token_set",
            args.vault_wrapped_token.is_some().to_string(),
        ),
        (
            "transit_key",
            format!("{}/keys/{}", args.transit_mount, args.transit_key),
        ),
        ("issuer", args.issuer.clone()),
        ("access_token_ttl", format!("{}s", args.access_token_ttl)),
        ("refresh_token_ttl", format!("{}s", args.refresh_token_ttl)),
        ("cookie_secure", args.cookie_secure.to_string()),
    ];
    info!("{}", startup_message(&entries));
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn startup_message(entries: &[(&str, String)]) -> String {
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "{} {} - {}\n\nStartup configuration:",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    message
}

fn short_commit(hash: &str) -> String {
    let trimmed = hash.trim();
    if trimmed.len() > 7 {
        trimmed[..7].to_string()
    } else {
        trimmed.to_string()
    }
}

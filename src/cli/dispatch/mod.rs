use crate::cli::actions::{server::Args, Action};
use anyhow::{Context, Result};

fn required(matches: &clap::ArgMatches, name: &str) -> Result<String> {
    matches
        .get_one::<String>(name)
        .cloned()
        .with_context(|| format!("missing required argument: --{name}"))
}

/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    Ok(Action::Server(Args {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        dsn: required(matches, "dsn")?,
        vault_url: required(matches, "vault-url")?,
        vault_role_id: required(matches, "vault-role-id")?,
        vault_secret_id: matches.get_one::<String>("vault-secret-id").cloned(),
        vault_wrapped_token: matches.get_one::<String>("vault-wrapped-token").cloned(),
        transit_mount: required(matches, "vault-transit-mount")?,
        transit_key: required(matches, "vault-transit-key")?,
        issuer: required(matches, "issuer")?,
        access_token_ttl: matches
            .get_one::<u64>("access-token-ttl")
            .copied()
            .context("missing required argument: --access-token-ttl")?,
        refresh_token_ttl: matches
            .get_one::<u64>("refresh-token-ttl")
            .copied()
            .context("missing required argument: --refresh-token-ttl")?,
        cookie_secure: matches
            .get_one::<bool>("cookie-secure")
            .copied()
            .unwrap_or(true),
        last_login_threshold: matches
            .get_one::<u64>("last-login-threshold")
            .copied()
            .unwrap_or(60),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;

    #[test]
    fn handler_builds_server_args() -> Result<()> {
        temp_env::with_vars(
            [
                ("TOKENGATE_VAULT_SECRET_ID", None::<&str>),
                ("TOKENGATE_VAULT_WRAPPED_TOKEN", None),
                ("TOKENGATE_PORT", None),
                ("TOKENGATE_ISSUER", None),
            ],
            || {
                let matches = commands::new().get_matches_from([
                    "tokengate",
                    "--dsn",
                    "postgres://localhost/tokengate",
                    "--vault-url",
                    "https://vault.tld:8200/v1/auth/approle/login",
                    "--vault-role-id",
                    "role",
                    "--vault-wrapped-token",
                    "s.wrapped",
                    "--refresh-token-ttl",
                    "86400",
                ]);

                let Action::Server(args) = handler(&matches)?;
                assert_eq!(args.port, 8080);
                assert_eq!(args.vault_role_id, "role");
                assert_eq!(args.vault_secret_id, None);
                assert_eq!(args.vault_wrapped_token.as_deref(), Some("s.wrapped"));
                assert_eq!(args.issuer, "tokengate");
                assert_eq!(args.refresh_token_ttl, 86_400);
                Ok(())
            },
        )
    }
}

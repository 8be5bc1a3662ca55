use crate::{cli::globals::GlobalArgs, vault};
use anyhow::Result;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::{
    sync::mpsc,
    time::{sleep, Duration},
};
use tracing::{debug, error, info, instrument, warn};

const MAX_ATTEMPTS: u32 = 3;
const MIN_RENEW_DELAY: Duration = Duration::from_secs(1);

/// Next renewal delay: 70-90% of the lease, never below one second.
fn jittered(lease_duration: u64, rng: &mut StdRng) -> Duration {
    let factor = rng.gen_range(70..90);
    Duration::from_secs(lease_duration.saturating_mul(factor) / 100).max(MIN_RENEW_DELAY)
}

/// Keep the Vault client token alive in the background.
///
/// After three consecutive failed renewals a message is sent on `tx` so the
/// server can shut down instead of signing with an expired token.
///
/// # Errors
/// Never fails today; the signature leaves room for setup errors.
#[instrument(skip(globals, tx))]
pub async fn try_renew(globals: &GlobalArgs, tx: mpsc::UnboundedSender<()>) -> Result<()> {
    tokio::spawn({
        let mut rng = StdRng::from_entropy();
        let mut jittered_lease_duration = Duration::default();

        let url = globals.vault_url.clone();
        let token = globals.vault_token.clone();

        async move {
            loop {
                for attempt in 1..=MAX_ATTEMPTS {
                    let backoff_time = 2u64.pow(attempt - 1);

                    if attempt > 1 {
                        warn!("Backing off for {} seconds", backoff_time);
                        sleep(Duration::from_secs(backoff_time)).await;
                    }

                    match vault::renew_token(&url, &token, None).await {
                        Ok(lease_duration) => {
                            jittered_lease_duration = jittered(lease_duration, &mut rng);
                            info!(
                                lease_duration,
                                next_renew_seconds = jittered_lease_duration.as_secs(),
                                "Vault token renewed"
                            );

                            break;
                        }

                        Err(e) => {
                            error!("Failed to renew token: {}", e);

                            if attempt == MAX_ATTEMPTS {
                                error!("Failed to renew token after {MAX_ATTEMPTS} attempts: {}", e);
                                let _ = tx.send(());
                                return;
                            }
                        }
                    }
                }

                debug!(
                    "Will renew token in {} seconds",
                    jittered_lease_duration.as_secs()
                );

                sleep(jittered_lease_duration).await;
            }
        }
    });

    Ok(())
}

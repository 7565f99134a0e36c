//! The registry refresh loop and its shared snapshot handle.
//!
//! The registry is single-writer/many-readers: the refresh task replaces
//! the published snapshot atomically, and readers hold an `Arc` to either
//! the pre- or post-update registry, never a torn state.

use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};

use tokio::sync::watch;

use crate::error::MdsError;
use crate::registry::MetadataRegistry;
use crate::{FidoMds, FIDO_MDS_URL};

/// The shared handle the refresh loop publishes registries through.
///
/// Readers call [`RegistryHandle::snapshot`] and keep using the returned
/// registry for the duration of a ceremony; a concurrent refresh does not
/// affect them.
#[derive(Debug, Default)]
pub struct RegistryHandle {
    current: RwLock<Arc<MetadataRegistry>>,
}

impl RegistryHandle {
    /// A handle holding an empty registry, to be populated by the refresh
    /// loop.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The current registry snapshot.
    pub fn snapshot(&self) -> Arc<MetadataRegistry> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            // A poisoned lock can only result from a writer panicking
            // between two plain pointer assignments. The snapshot it left
            // behind is still whole.
            Err(poison) => poison.into_inner().clone(),
        }
    }

    /// Atomically replace the published registry.
    pub fn replace(&self, registry: MetadataRegistry) {
        let registry = Arc::new(registry);
        match self.current.write() {
            Ok(mut guard) => *guard = registry,
            Err(poison) => *poison.into_inner() = registry,
        }
    }
}

/// Configuration of the refresh loop.
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Where the blob is served from. Defaults to the FIDO Alliance MDS.
    pub url: String,
    /// How long to sleep between successful fetches. The service publishes
    /// a `nextUpdate` of roughly a month; an hour is a sensible default for
    /// development setups.
    pub interval: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        RefreshConfig {
            url: FIDO_MDS_URL.to_string(),
            interval: Duration::from_secs(3600),
        }
    }
}

/// The delay before retry `failures` (1-based), doubling from one second
/// and capped at the refresh interval.
fn backoff_delay(failures: u32, cap: Duration) -> Duration {
    let exp = failures.saturating_sub(1).min(31);
    let delay = Duration::from_secs(1u64 << exp);
    delay.min(cap)
}

async fn fetch_registry(url: &str) -> Result<(MetadataRegistry, String), MdsError> {
    let body = reqwest::get(url).await?.error_for_status()?.text().await?;
    let mds = FidoMds::parse(&body, SystemTime::now())?;

    match mds.outcome.registry() {
        Some(registry) => {
            let rejected = mds.outcome.errors().len();
            if rejected > 0 {
                warn!(rejected, "metadata blob decoded partially");
            }
            Ok((registry.clone(), mds.next_update))
        }
        None => {
            // Treat like a failed fetch so the previous registry stays
            // live.
            error!("metadata blob decoded no entries");
            Err(MdsError::AllEntriesRejected)
        }
    }
}

/// Run the refresh loop until `shutdown` observes `true`.
///
/// One HTTPS GET and parse per iteration. On success the new registry is
/// installed and the task sleeps for the configured interval; on failure
/// the previous registry remains live and the fetch is retried with
/// exponential backoff capped at the interval. Cancellation is cooperative:
/// the shutdown signal is honoured before each fetch and during sleeps.
pub async fn refresh_loop(
    handle: Arc<RegistryHandle>,
    config: RefreshConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut failures: u32 = 0;

    loop {
        if *shutdown.borrow() {
            break;
        }

        let sleep_for = match fetch_registry(&config.url).await {
            Ok((registry, next_update)) => {
                info!(entries = registry.len(), %next_update, "metadata registry refreshed");
                handle.replace(registry);
                failures = 0;
                config.interval
            }
            Err(err) => {
                failures += 1;
                let delay = backoff_delay(failures, config.interval);
                warn!(%err, failures, ?delay, "metadata refresh failed, backing off");
                delay
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(sleep_for) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    debug!("metadata refresh loop stopped");
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

    use super::*;

    #[test]
    fn backoff_doubles_and_caps_at_interval() {
        let cap = Duration::from_secs(3600);
        assert_eq!(backoff_delay(1, cap), Duration::from_secs(1));
        assert_eq!(backoff_delay(2, cap), Duration::from_secs(2));
        assert_eq!(backoff_delay(5, cap), Duration::from_secs(16));
        assert_eq!(backoff_delay(13, cap), cap);
        // No overflow on absurd failure counts.
        assert_eq!(backoff_delay(u32::MAX, cap), cap);
    }

    #[test]
    fn snapshot_is_replaced_atomically() {
        let handle = RegistryHandle::new();
        let before = handle.snapshot();
        assert!(before.is_empty());

        handle.replace(MetadataRegistry::default());
        let after = handle.snapshot();

        // The pre-update snapshot is unaffected by the swap.
        assert!(before.is_empty());
        assert!(after.is_empty());
        assert!(!Arc::ptr_eq(&before, &after));
    }

    #[tokio::test]
    async fn refresh_loop_honours_shutdown() {
        let handle = RegistryHandle::new();
        let (tx, rx) = watch::channel(true);
        // Already shut down: the loop must exit without fetching.
        refresh_loop(
            handle,
            RefreshConfig {
                url: "http://127.0.0.1:1/unreachable".to_string(),
                interval: Duration::from_secs(1),
            },
            rx,
        )
        .await;
        drop(tx);
    }
}

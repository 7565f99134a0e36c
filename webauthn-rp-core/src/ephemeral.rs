//! In-memory, process-local implementations of the webauthn collaborators.
//! Suitable for tests, demos and single-process deployments - anything
//! larger should persist these through its own session store.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use url::Url;

use rand::prelude::*;

use crate::constants::CHALLENGE_SIZE_BYTES;
use crate::core::WebauthnConfig;
use crate::error::{WebauthnError, WebauthnResult};
use crate::internals::parse_client_data;

/// A configuration that holds the relying party parameters as plain values.
#[derive(Debug)]
pub struct WebauthnEphemeralConfig {
    rp_name: String,
    rp_id: String,
    rp_origin: Url,
}

impl WebauthnEphemeralConfig {
    /// Create a new configuration for the given relying party parameters.
    pub fn new(rp_name: &str, rp_origin: Url, rp_id: &str) -> Self {
        WebauthnEphemeralConfig {
            rp_name: rp_name.to_string(),
            rp_id: rp_id.to_string(),
            rp_origin,
        }
    }
}

impl WebauthnConfig for WebauthnEphemeralConfig {
    fn get_relying_party_name(&self) -> &str {
        &self.rp_name
    }

    fn get_relying_party_id(&self) -> &str {
        &self.rp_id
    }

    fn get_origin(&self) -> &Url {
        &self.rp_origin
    }
}

/// The pending-ceremony store: maps issued challenges to the option state
/// they were issued with, until the ceremony completes or the entry
/// expires.
///
/// `insert` allocates a fresh cryptographically random challenge and hands
/// it to the caller's builder; `take` consumes the entry exactly once.
pub struct EphemeralPendingStore<O> {
    ttl: Duration,
    pending: Mutex<BTreeMap<Vec<u8>, (Instant, O)>>,
}

impl<O: Clone> EphemeralPendingStore<O> {
    /// A store whose entries expire `ttl` after insertion.
    pub fn new(ttl: Duration) -> Self {
        EphemeralPendingStore {
            ttl,
            pending: Mutex::new(BTreeMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<Vec<u8>, (Instant, O)>> {
        match self.pending.lock() {
            Ok(guard) => guard,
            Err(poison) => poison.into_inner(),
        }
    }

    /// Allocate a fresh random challenge, store the options the builder
    /// produces for it, and return them.
    pub fn insert(&self, build: impl FnOnce(Vec<u8>) -> O) -> O {
        let mut rng = rand::thread_rng();
        let challenge = rng.gen::<[u8; CHALLENGE_SIZE_BYTES]>().to_vec();

        let options = build(challenge.clone());

        let mut pending = self.lock();
        // Expired entries are reaped opportunistically on writes.
        let ttl = self.ttl;
        pending.retain(|_, (issued, _)| issued.elapsed() <= ttl);
        pending.insert(challenge, (Instant::now(), options.clone()));

        options
    }

    /// Remove and return the options stored under a challenge.
    pub fn take(&self, challenge: &[u8]) -> WebauthnResult<O> {
        let (issued, options) = self
            .lock()
            .remove(challenge)
            .ok_or(WebauthnError::UnknownChallenge)?;

        if issued.elapsed() > self.ttl {
            return Err(WebauthnError::ChallengeExpired);
        }

        Ok(options)
    }

    /// The number of live (possibly expired, not yet reaped) entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Extract the challenge a client response was produced against, so the
/// matching pending entry can be looked up before verification starts.
pub fn client_data_challenge(client_data_json: &[u8]) -> WebauthnResult<Vec<u8>> {
    parse_client_data(client_data_json).map(|ccd| ccd.challenge.into())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

    use super::*;

    #[test]
    fn insert_take_round_trip() {
        let store: EphemeralPendingStore<String> =
            EphemeralPendingStore::new(Duration::from_secs(300));

        let mut seen_challenge = Vec::new();
        let options = store.insert(|challenge| {
            assert_eq!(challenge.len(), CHALLENGE_SIZE_BYTES);
            seen_challenge = challenge;
            "options".to_string()
        });
        assert_eq!(options, "options");
        assert_eq!(store.len(), 1);

        let taken = store.take(&seen_challenge).expect("entry vanished");
        assert_eq!(taken, "options");

        // Consumed exactly once.
        assert!(matches!(
            store.take(&seen_challenge),
            Err(WebauthnError::UnknownChallenge)
        ));
    }

    #[test]
    fn unknown_challenge_is_reported() {
        let store: EphemeralPendingStore<u32> = EphemeralPendingStore::new(Duration::from_secs(1));
        assert!(matches!(
            store.take(b"never issued"),
            Err(WebauthnError::UnknownChallenge)
        ));
    }

    #[test]
    fn expired_challenge_is_reported() {
        let store: EphemeralPendingStore<u32> = EphemeralPendingStore::new(Duration::ZERO);
        let mut challenge = Vec::new();
        store.insert(|c| {
            challenge = c;
            7
        });
        assert!(matches!(
            store.take(&challenge),
            Err(WebauthnError::ChallengeExpired)
        ));
    }
}

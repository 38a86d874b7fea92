//! Cached, rate-limited signing key lookup.
//!
//! The locator owns the realm's current signature keys and decides when to
//! go back to the certificate endpoint:
//!
//! - A lookup is served from cache while the last request is younger than
//!   [`PUBLIC_KEY_CACHE_TTL`] and the key is present
//! - Otherwise at most one caller refreshes the key set, and only if the last
//!   request is older than [`MIN_TIME_BETWEEN_REQUESTS`]
//! - A failed refresh is logged and the previous key set keeps serving
//!
//! Unknown key ids therefore cost at most one request per rate-limit window,
//! no matter how many tokens carry them.

use crate::clock::Clock;
use crate::fetcher::RemoteKeyFetcher;
use crate::jwks::SigningKey;
use crate::observability::metrics::{self, KeyLookupOutcome};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

/// How long a fetched key set is trusted, in seconds (one day).
pub const PUBLIC_KEY_CACHE_TTL: i64 = 86_400;

/// Minimum spacing between certificate endpoint requests, in seconds.
pub const MIN_TIME_BETWEEN_REQUESTS: i64 = 10;

/// Sentinel for "no request sent yet".
const NEVER: i64 = i64::MIN;

/// Locates signing keys by key id for a single realm.
///
/// Shared across all verifications of a service; every method takes `&self`.
pub struct PublicKeyLocator {
    fetcher: RemoteKeyFetcher,

    /// Current signature keys, replaced wholesale on each successful fetch.
    keys: RwLock<HashMap<String, Arc<SigningKey>>>,

    /// Time of the last certificate endpoint request (epoch seconds).
    last_request_time: AtomicI64,

    /// Serializes refresh decisions so concurrent misses send one request.
    refresh_lock: Mutex<()>,

    clock: Arc<dyn Clock>,
}

impl PublicKeyLocator {
    pub fn new(fetcher: RemoteKeyFetcher, clock: Arc<dyn Clock>) -> Self {
        Self {
            fetcher,
            keys: RwLock::new(HashMap::new()),
            last_request_time: AtomicI64::new(NEVER),
            refresh_lock: Mutex::new(()),
            clock,
        }
    }

    /// Find the signing key for `kid`.
    ///
    /// Never fails: fetch errors are logged, and an absent key after an
    /// eligible (or rate-limited) refresh yields `None`.
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn get_key(&self, kid: &str) -> Option<Arc<SigningKey>> {
        let now = self.clock.now();
        if let Some(key) = self.lookup_cached_key(now, kid).await {
            tracing::debug!(target: "realm_auth.locator", kid = %kid, "Signing key cache hit");
            metrics::record_key_lookup(KeyLookupOutcome::Hit);
            return Some(key);
        }

        let _guard = self.refresh_lock.lock().await;

        let now = self.clock.now();
        let last_request_time = self.last_request_time.load(Ordering::SeqCst);
        let refreshed = if now > last_request_time.saturating_add(MIN_TIME_BETWEEN_REQUESTS) {
            self.send_request().await;
            self.last_request_time.store(now, Ordering::SeqCst);
            true
        } else {
            tracing::debug!(
                target: "realm_auth.locator",
                last_request_time,
                current_time = now,
                "Won't send request to realm certificate endpoint, last request too recent"
            );
            false
        };

        let key = self.lookup_cached_key(now, kid).await;

        let outcome = match (&key, refreshed) {
            (Some(_), true) => KeyLookupOutcome::Refreshed,
            (Some(_), false) => KeyLookupOutcome::Hit,
            (None, true) => KeyLookupOutcome::Miss,
            (None, false) => KeyLookupOutcome::RateLimited,
        };
        metrics::record_key_lookup(outcome);

        if key.is_none() {
            tracing::debug!(target: "realm_auth.locator", kid = %kid, outcome = outcome.as_str(), "Signing key not found");
        }

        key
    }

    /// Refresh the key set unconditionally.
    ///
    /// Ignores the rate limit. The last request time is taken after the
    /// fetch completes.
    #[instrument(skip(self))]
    pub async fn reset(&self) {
        let _guard = self.refresh_lock.lock().await;

        self.send_request().await;

        let now = self.clock.now();
        self.last_request_time.store(now, Ordering::SeqCst);
        tracing::debug!(target: "realm_auth.locator", last_request_time = now, "Reset key set request time");
    }

    /// Time of the last certificate endpoint request, if any.
    pub fn last_request_time(&self) -> Option<i64> {
        match self.last_request_time.load(Ordering::SeqCst) {
            NEVER => None,
            time => Some(time),
        }
    }

    /// Key ids currently cached, sorted.
    pub async fn cached_key_ids(&self) -> Vec<String> {
        let mut kids: Vec<String> = self.keys.read().await.keys().cloned().collect();
        kids.sort();
        kids
    }

    pub fn certs_url(&self) -> &str {
        self.fetcher.certs_url()
    }

    async fn lookup_cached_key(&self, now: i64, kid: &str) -> Option<Arc<SigningKey>> {
        let last_request_time = self.last_request_time.load(Ordering::SeqCst);
        if last_request_time.saturating_add(PUBLIC_KEY_CACHE_TTL) <= now {
            return None;
        }
        self.keys.read().await.get(kid).cloned()
    }

    /// Fetch the key set and replace the cache. Failures leave it untouched.
    async fn send_request(&self) {
        let start = Instant::now();

        match self.fetcher.fetch().await {
            Ok(new_keys) => {
                metrics::record_jwks_refresh("success", None, start.elapsed());

                let mut kids: Vec<&String> = new_keys.keys().collect();
                kids.sort();
                tracing::info!(
                    target: "realm_auth.locator",
                    key_count = new_keys.len(),
                    kids = ?kids,
                    "Realm public keys successfully retrieved"
                );

                let mut keys = self.keys.write().await;
                keys.clear();
                keys.extend(new_keys);
            }
            Err(crate::errors::KeyFetchError::EmptyBody) => {
                metrics::record_jwks_refresh("empty", None, start.elapsed());
                tracing::debug!(
                    target: "realm_auth.locator",
                    url = %self.fetcher.certs_url(),
                    "Realm public keys not found, keeping current key set"
                );
            }
            Err(e) => {
                metrics::record_jwks_refresh("error", Some(e.error_type()), start.elapsed());
                tracing::error!(
                    target: "realm_auth.locator",
                    error = %e,
                    "Error when sending request to retrieve realm keys"
                );
            }
        }
    }
}

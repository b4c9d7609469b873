//! Session-scoped cache of the user bundle.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::Result;
use tracing::{debug, error, info, warn};

use crate::models::{Booklet, BundlePatch, Child, Profile, TokenAccount, UserBundle};

use super::freshness::{self, now_millis};
use super::persist::Persister;
use super::{BundleSource, KeyValueStore};

/// Storage key of the bundle slot.
pub const BUNDLE_CACHE_KEY: &str = "user_bundle_cache";

/// Where the cache stands, as seen by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Nothing loaded yet, or cleared.
    Empty,
    /// A fetch is in flight.
    Loading,
    /// A bundle is available. It may be stale.
    Ready,
    /// The last fetch failed. A previously loaded bundle is still served.
    Error,
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheStatus::Empty => write!(f, "empty"),
            CacheStatus::Loading => write!(f, "loading"),
            CacheStatus::Ready => write!(f, "ready"),
            CacheStatus::Error => write!(f, "error"),
        }
    }
}

#[derive(Default)]
struct CacheState {
    bundle: Option<UserBundle>,
    /// Number of loads or refreshes currently running.
    in_flight: usize,
    error: Option<String>,
}

struct Inner {
    state: RwLock<CacheState>,
    source: Arc<dyn BundleSource>,
    store: Arc<dyn KeyValueStore>,
    persister: Persister,
}

/// Cache of one signed-in account's bundle.
///
/// Clones share the same bundle, so a handle can be given to every consumer
/// of the session. Reads are synchronous and never fail. Loads and refreshes
/// suspend only on the network and on storage.
///
/// There is no ordering between concurrent operations: whichever finishes
/// last wins. A refresh that started before an `update_cache` and finishes
/// after it overwrites the local edit.
#[derive(Clone)]
pub struct BundleCache {
    inner: Arc<Inner>,
}

/// Marks a load as running until dropped.
struct LoadingGuard<'a> {
    cache: &'a BundleCache,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.cache.write_state();
        state.in_flight = state.in_flight.saturating_sub(1);
    }
}

impl BundleCache {
    /// Create an empty cache. Must be called from within a Tokio runtime,
    /// which runs the background write-through task.
    pub fn new(source: Arc<dyn BundleSource>, store: Arc<dyn KeyValueStore>) -> Self {
        let persister = Persister::spawn(Arc::clone(&store), BUNDLE_CACHE_KEY);
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(CacheState::default()),
                source,
                store,
                persister,
            }),
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, CacheState> {
        self.inner.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.inner.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin_loading(&self) -> LoadingGuard<'_> {
        let mut state = self.write_state();
        state.in_flight += 1;
        state.error = None;
        LoadingGuard { cache: self }
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Adopt the stored bundle if it is still fresh, otherwise fetch a new
    /// one. Failures are recorded in `error()`; a bundle that was already
    /// loaded stays available.
    pub async fn load_initial_data(&self) -> CacheStatus {
        info!("Loading initial cache data");
        {
            let _loading = self.begin_loading();

            match self.load_from_storage().await {
                Some(cached) if !cached.is_expired() => {
                    info!(age = %cached.age_display(), "Using cached bundle");
                    self.adopt_stored(cached);
                }
                cached => {
                    if cached.is_some() {
                        info!("Cached bundle expired, fetching fresh data");
                    } else {
                        info!("No cached bundle, fetching fresh data");
                    }
                    if let Err(e) = self.fetch_fresh().await {
                        self.record_error("load", e);
                    }
                }
            }
        }
        self.status()
    }

    /// Fetch a new bundle regardless of how fresh the current one is.
    pub async fn refresh_data(&self) -> CacheStatus {
        info!("Refreshing bundle");
        {
            let _loading = self.begin_loading();
            if let Err(e) = self.fetch_fresh().await {
                self.record_error("refresh", e);
            }
        }
        self.status()
    }

    async fn fetch_fresh(&self) -> Result<()> {
        let payload = self.inner.source.fetch_bundle().await?;

        let bundle = {
            let mut state = self.write_state();
            let previous = state.bundle.as_ref().map(|b| b.cache_timestamp);
            let bundle = UserBundle::from_payload(
                payload,
                freshness::next_timestamp(previous, now_millis()),
            );
            state.bundle = Some(bundle.clone());
            bundle
        };

        self.inner.persister.save(bundle).await;
        info!("Fresh bundle loaded and cached");
        Ok(())
    }

    fn record_error(&self, operation: &str, err: anyhow::Error) {
        let message = format!("{:#}", err);
        error!(operation, error = %message, "Failed to fetch bundle");
        self.write_state().error = Some(message);
    }

    /// Read the stored bundle. Unreadable or unparsable entries, and entries
    /// stamped at an impossible time, count as absent.
    async fn load_from_storage(&self) -> Option<UserBundle> {
        // Let queued writes land first so a cleared bundle is not read back
        self.inner.persister.flush().await;

        match self.inner.store.get(BUNDLE_CACHE_KEY).await {
            Ok(Some(json)) => match serde_json::from_str::<UserBundle>(&json) {
                Ok(bundle) if freshness::is_plausible(bundle.cache_timestamp, now_millis()) => {
                    Some(bundle)
                }
                Ok(bundle) => {
                    warn!(
                        cache_timestamp = bundle.cache_timestamp,
                        "Ignoring cached bundle with invalid timestamp"
                    );
                    None
                }
                Err(e) => {
                    warn!(error = %e, "Failed to parse cached bundle");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read cached bundle");
                None
            }
        }
    }

    fn adopt_stored(&self, cached: UserBundle) {
        let mut state = self.write_state();
        // Memory only gets ahead of storage when a write-through failed
        let memory_is_newer = matches!(
            &state.bundle,
            Some(current) if current.cache_timestamp > cached.cache_timestamp
        );
        if memory_is_newer {
            debug!("In-memory bundle is newer than stored copy, keeping it");
        } else {
            state.bundle = Some(cached);
        }
    }

    // =========================================================================
    // Local updates
    // =========================================================================

    /// Replace the members set in `patch`, stamp a new timestamp, and write
    /// the result through to storage in the background. Does nothing when
    /// no bundle is loaded.
    pub fn update_cache(&self, patch: BundlePatch) {
        self.modify(|_| Some(patch));
    }

    /// Apply a patch computed from the current bundle. Returns false when
    /// no bundle is loaded or `make_patch` declines.
    fn modify<F>(&self, make_patch: F) -> bool
    where
        F: FnOnce(&UserBundle) -> Option<BundlePatch>,
    {
        let updated = {
            let mut state = self.write_state();
            let Some(bundle) = state.bundle.as_mut() else {
                debug!("No bundle loaded, ignoring cache update");
                return false;
            };
            let Some(patch) = make_patch(&*bundle) else {
                return false;
            };
            let fields = patch.fields();
            bundle.apply(patch);
            bundle.cache_timestamp =
                freshness::next_timestamp(Some(bundle.cache_timestamp), now_millis());
            info!(?fields, "Cache updated");
            bundle.clone()
        };

        self.inner.persister.save_in_background(updated);
        true
    }

    /// Set or clear the proof image of one activity in a child's booklets,
    /// replacing the bundle's booklets through `update_cache`.
    /// Returns false if the child has no activity with that id.
    pub fn set_activity_proof(
        &self,
        child_id: &str,
        activity_id: &str,
        proof_url: Option<String>,
    ) -> bool {
        self.modify(|bundle| {
            let mut matched = false;
            let booklets: Vec<Booklet> = bundle
                .booklets
                .iter()
                .cloned()
                .map(|mut booklet| {
                    if booklet.child_id == child_id
                        && booklet.set_proof_url(activity_id, proof_url.clone())
                    {
                        matched = true;
                    }
                    booklet
                })
                .collect();

            if matched {
                Some(BundlePatch::new().with_booklets(booklets))
            } else {
                debug!(child_id, activity_id, "No activity to attach proof to");
                None
            }
        })
    }

    /// Drop the bundle from memory and storage. Safe to call repeatedly.
    pub fn clear_cache(&self) {
        {
            let mut state = self.write_state();
            state.bundle = None;
            state.error = None;
        }
        self.inner.persister.remove_in_background();
        info!("Cache cleared");
    }

    /// Wait for background writes issued so far to reach storage.
    pub async fn flush(&self) {
        self.inner.persister.flush().await;
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn bundle(&self) -> Option<UserBundle> {
        self.read_state().bundle.clone()
    }

    pub fn user_profile(&self) -> Option<Profile> {
        self.read_state()
            .bundle
            .as_ref()
            .and_then(|b| b.profile.clone())
    }

    pub fn children(&self) -> Vec<Child> {
        self.read_state()
            .bundle
            .as_ref()
            .map(|b| b.children.clone())
            .unwrap_or_default()
    }

    pub fn booklets_for_child(&self, child_id: &str) -> Vec<Booklet> {
        self.read_state()
            .bundle
            .as_ref()
            .map(|b| b.booklets_for_child(child_id))
            .unwrap_or_default()
    }

    pub fn token_account(&self, child_id: &str) -> Option<TokenAccount> {
        self.read_state()
            .bundle
            .as_ref()
            .and_then(|b| b.token_account(child_id))
    }

    pub fn cache_timestamp(&self) -> Option<i64> {
        self.read_state().bundle.as_ref().map(|b| b.cache_timestamp)
    }

    pub fn is_loading(&self) -> bool {
        self.read_state().in_flight > 0
    }

    pub fn error(&self) -> Option<String> {
        self.read_state().error.clone()
    }

    pub fn status(&self) -> CacheStatus {
        let state = self.read_state();
        if state.in_flight > 0 {
            CacheStatus::Loading
        } else if state.error.is_some() {
            CacheStatus::Error
        } else if state.bundle.is_some() {
            CacheStatus::Ready
        } else {
            CacheStatus::Empty
        }
    }

    /// True when nothing is loaded or the loaded bundle is past the window.
    pub fn is_expired(&self) -> bool {
        self.read_state()
            .bundle
            .as_ref()
            .map(|b| b.is_expired())
            .unwrap_or(true)
    }

    pub fn age_display(&self) -> String {
        self.read_state()
            .bundle
            .as_ref()
            .map(|b| b.age_display())
            .unwrap_or_else(|| "never".to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================

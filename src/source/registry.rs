//! Raster registry: validated raster descriptions, cached.
//!
//! The registry provides:
//! - LRU caching of [`RasterInfo`] so metadata is parsed once per raster
//! - Singleflight loading, so concurrent requests for an uncached raster
//!   trigger one metadata load
//!
//! # Example
//!
//! ```ignore
//! use raster_streamer::source::{RasterRegistry, S3ObjectSource, TileStore};
//! use raster_streamer::io::create_s3_client;
//!
//! let client = create_s3_client(None, "us-east-1").await;
//! let store = TileStore::new(S3ObjectSource::new(client, "rasters".to_string(), None));
//! let registry = RasterRegistry::new(store);
//!
//! let info = registry.get_raster("dem").await?;
//! println!("{} levels", info.pyramid.level_count());
//! ```

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lru::LruCache;
use tokio::sync::{Notify, RwLock};
use tracing::{debug, info, warn};

use crate::error::{IoError, RasterError};
use crate::raster::RasterInfo;

use super::MetadataProvider;

/// Default capacity for the raster cache (number of rasters).
pub const DEFAULT_RASTER_CACHE_CAPACITY: usize = 100;

type LoadResult = Result<Arc<RasterInfo>, RasterError>;

/// Registry of raster descriptions.
pub struct RasterRegistry<S: MetadataProvider> {
    source: S,

    /// Cached rasters indexed by raster ID
    cache: RwLock<LruCache<String, Arc<RasterInfo>>>,

    /// In-flight loads for singleflight. Never held across an await.
    in_flight: Mutex<HashMap<String, Arc<InFlightState>>>,
}

/// State for an in-flight metadata load.
struct InFlightState {
    notify: Notify,
    /// Set once the leader finishes or is dropped
    done: AtomicBool,
    /// The leader's result; still `None` once `done` if the leader was dropped
    result: Mutex<Option<LoadResult>>,
}

impl InFlightState {
    fn new() -> Self {
        Self {
            notify: Notify::new(),
            done: AtomicBool::new(false),
            result: Mutex::new(None),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Held by the leader of a load. Dropping it before [`finish`](Self::finish)
/// (the leader's request was cancelled) releases the waiters so one of them
/// can take over.
struct LeaderGuard<'a> {
    in_flight: &'a Mutex<HashMap<String, Arc<InFlightState>>>,
    raster_id: &'a str,
    state: Arc<InFlightState>,
}

impl LeaderGuard<'_> {
    fn finish(&self, result: Option<LoadResult>) {
        if self.state.done.load(AtomicOrdering::Acquire) {
            return;
        }
        *lock(&self.state.result) = result;
        self.state.done.store(true, AtomicOrdering::Release);

        let mut in_flight = lock(self.in_flight);
        if in_flight
            .get(self.raster_id)
            .is_some_and(|s| Arc::ptr_eq(s, &self.state))
        {
            in_flight.remove(self.raster_id);
        }
        drop(in_flight);

        self.state.notify.notify_waiters();
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if !self.state.done.load(AtomicOrdering::Acquire) {
            warn!(raster_id = self.raster_id, "Metadata load abandoned");
            self.finish(None);
        }
    }
}

impl<S: MetadataProvider> RasterRegistry<S> {
    pub fn new(source: S) -> Self {
        Self::with_capacity(source, DEFAULT_RASTER_CACHE_CAPACITY)
    }

    /// Create a registry caching at most `capacity` rasters (at least one).
    pub fn with_capacity(source: S, capacity: usize) -> Self {
        Self {
            source,
            cache: RwLock::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// The underlying source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Get a raster, loading its metadata if not already cached.
    ///
    /// Failed loads are returned to every waiter but never cached. If the
    /// caller leading a load is cancelled, a waiting caller retries the load.
    pub async fn get_raster(&self, raster_id: &str) -> LoadResult {
        loop {
            // Fast path: check cache
            {
                let mut cache = self.cache.write().await;
                if let Some(info) = cache.get(raster_id) {
                    return Ok(info.clone());
                }
            }

            let (state, leader) = {
                let mut in_flight = lock(&self.in_flight);
                match in_flight.get(raster_id) {
                    Some(state) => (state.clone(), false),
                    None => {
                        let state = Arc::new(InFlightState::new());
                        in_flight.insert(raster_id.to_string(), state.clone());
                        (state, true)
                    }
                }
            };

            if leader {
                let guard = LeaderGuard {
                    in_flight: &self.in_flight,
                    raster_id,
                    state,
                };

                let result = self.load(raster_id).await;
                if let Ok(ref info) = result {
                    let mut cache = self.cache.write().await;
                    cache.put(raster_id.to_string(), info.clone());
                }

                guard.finish(Some(result.clone()));
                return result;
            }

            if let Some(result) = Self::wait_for_leader(&state).await {
                return result;
            }
            debug!(raster_id, "Leader dropped, retrying metadata load");
        }
    }

    /// Wait until the leader of `state` is done. `None` when the leader was
    /// dropped without a result.
    async fn wait_for_leader(state: &InFlightState) -> Option<LoadResult> {
        // The notification is registered before `done` is checked so a
        // notify between the two is not lost.
        loop {
            let notified = state.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if state.done.load(AtomicOrdering::Acquire) {
                return lock(&state.result).clone();
            }

            notified.await;
        }
    }

    async fn load(&self, raster_id: &str) -> LoadResult {
        debug!(raster_id, "Loading raster metadata");

        let metadata = self
            .source
            .load_metadata(raster_id)
            .await
            .map_err(|e| match e {
                IoError::NotFound(_) => RasterError::RasterNotFound {
                    raster_id: raster_id.to_string(),
                },
                other => RasterError::MetadataUnavailable {
                    raster_id: raster_id.to_string(),
                    reason: other.to_string(),
                },
            })?;

        let info = RasterInfo::from_metadata(raster_id, metadata)?;
        info!(
            raster_id,
            levels = info.pyramid.level_count(),
            bands = info.band_count(),
            crs = %info.crs,
            "Raster loaded"
        );
        Ok(Arc::new(info))
    }

    /// Remove a raster from the cache, forcing a reload on next access.
    pub async fn invalidate(&self, raster_id: &str) {
        let mut cache = self.cache.write().await;
        cache.pop(raster_id);
    }

    /// Clear all cached rasters.
    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        cache.clear();
    }

    /// Get the number of cached rasters.
    pub async fn cached_count(&self) -> usize {
        let cache = self.cache.read().await;
        cache.len()
    }
}

// =============================================================================
// Tests
// =============================================================================

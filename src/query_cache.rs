/// Query result cache
///
/// Raw backend rows keyed by the canonical query key. Entries live for the
/// lifetime of the cache and a re-fetch overwrites; nothing expires. A miss
/// goes through [`QueryCache::get_or_fetch`], which lets at most one fetch per
/// key run at a time and hands its result to every concurrent caller.

use crate::error::{HeatmapError, Result};
use crate::region::BoundingBox;
use crate::source::HeatmapRequest;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use h3o::Resolution;
use parking_lot::RwLock;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::debug;

/// Raw rows as returned by the backend, before canonicalization or masking.
pub type Rows = Arc<Vec<Value>>;

/// Canonical cache key for one query.
///
/// Rendered as JSON with sorted keys; the bounding box is rounded to a fixed
/// number of decimals so viewport jitter maps to the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(String);

impl QueryKey {
    pub fn new(
        metric: &str,
        bucket: &str,
        at: &str,
        resolution: Resolution,
        bbox: &BoundingBox,
        precision: u32,
    ) -> Self {
        let rendered = json!({
            "metric": metric,
            "bucket": bucket,
            "at": at,
            "resolution": u8::from(resolution),
            "bbox": bbox.to_param_string(precision),
        });
        QueryKey(rendered.to_string())
    }

    pub fn for_request(request: &HeatmapRequest, precision: u32) -> Self {
        Self::new(
            &request.metric,
            &request.bucket,
            &request.at,
            request.resolution,
            &request.bbox,
            precision,
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a row set handed out by [`QueryCache::get_or_fetch`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOrigin {
    /// Stored entry
    Cache,
    /// Joined another caller's fetch
    Shared,
    /// This caller ran the fetch
    Fetch,
}

#[derive(Debug, Clone)]
pub struct CachedRows {
    pub rows: Rows,
    pub origin: RowOrigin,
}

/// Counters exposed for diagnostics and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub shared: u64,
}

type SharedResult = std::result::Result<Rows, Arc<str>>;
type InFlightSender = Arc<watch::Sender<Option<SharedResult>>>;
type InFlightMap = DashMap<QueryKey, InFlightSender>;

/// Removes the in-flight marker if the fetcher is dropped or gives up, so
/// waiters see the channel close and retry instead of hanging.
struct InFlightGuard<'a> {
    key: QueryKey,
    map: &'a InFlightMap,
    tx: InFlightSender,
    finished: bool,
}

impl<'a> InFlightGuard<'a> {
    fn new(key: QueryKey, map: &'a InFlightMap, tx: InFlightSender) -> Self {
        Self {
            key,
            map,
            tx,
            finished: false,
        }
    }

    fn finish(mut self, msg: SharedResult) {
        // send before removing so late subscribers still observe the result
        let _ = self.tx.send(Some(msg));
        self.map.remove(&self.key);
        self.finished = true;
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.map.remove(&self.key);
        }
    }
}

#[derive(Default)]
pub struct QueryCache {
    entries: RwLock<HashMap<QueryKey, Rows>>,
    in_flight: InFlightMap,
    hits: AtomicU64,
    misses: AtomicU64,
    shared: AtomicU64,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &QueryKey) -> Option<Rows> {
        self.entries.read().get(key).cloned()
    }

    /// Store `rows` under `key`, replacing any earlier entry.
    pub fn put(&self, key: QueryKey, rows: Rows) {
        self.entries.write().insert(key, rows);
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.entries.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Number of fetches currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            shared: self.shared.load(Ordering::Relaxed),
        }
    }

    /// Return the cached rows for `key`, or run `fetch` to get them.
    ///
    /// Only one `fetch` runs per key at a time; other callers wait for its
    /// result. A successful fetch is stored. A failure is passed to the
    /// callers waiting at that moment as [`HeatmapError::SharedFetch`] and is
    /// not stored. A fetch that returns [`HeatmapError::Cancelled`] or is
    /// dropped mid-flight releases the waiters, and one of them fetches again.
    pub async fn get_or_fetch<F, Fut>(&self, key: &QueryKey, fetch: F) -> Result<CachedRows>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Value>>>,
    {
        let tx = loop {
            if let Some(rows) = self.get(key) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "query cache hit");
                return Ok(CachedRows {
                    rows,
                    origin: RowOrigin::Cache,
                });
            }

            let mut rx = match self.in_flight.entry(key.clone()) {
                Entry::Occupied(entry) => entry.get().subscribe(),
                Entry::Vacant(entry) => {
                    let (tx, _rx) = watch::channel(None::<SharedResult>);
                    let tx = Arc::new(tx);
                    entry.insert(tx.clone());
                    break tx;
                }
            };

            debug!(key = %key, "joining in-flight query");
            loop {
                let msg = rx.borrow().clone();
                if let Some(msg) = msg {
                    self.shared.fetch_add(1, Ordering::Relaxed);
                    return match msg {
                        Ok(rows) => Ok(CachedRows {
                            rows,
                            origin: RowOrigin::Shared,
                        }),
                        Err(reason) => Err(HeatmapError::SharedFetch(reason.to_string())),
                    };
                }
                if rx.changed().await.is_err() {
                    // fetcher gave up without a result: start over
                    break;
                }
            }
        };

        let guard = InFlightGuard::new(key.clone(), &self.in_flight, tx);
        self.misses.fetch_add(1, Ordering::Relaxed);

        match fetch().await {
            Ok(rows) => {
                let rows: Rows = Arc::new(rows);
                self.put(key.clone(), rows.clone());
                debug!(key = %key, rows = rows.len(), "query cached");
                guard.finish(Ok(rows.clone()));
                Ok(CachedRows {
                    rows,
                    origin: RowOrigin::Fetch,
                })
            }
            // dropping the guard releases waiters without a result
            Err(HeatmapError::Cancelled) => Err(HeatmapError::Cancelled),
            Err(e) => {
                guard.finish(Err(Arc::from(e.to_string())));
                Err(e)
            }
        }
    }
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.len())
            .field("in_flight", &self.in_flight.len())
            .field("stats", &self.stats())
            .finish()
    }
}

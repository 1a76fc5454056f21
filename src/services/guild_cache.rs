//! Per-user guild list cache.
//!
//! Keeps the last reconciled [`GuildSnapshot`] for each user in memory with a
//! fixed TTL, and makes sure the upstream loader runs at most once at a time
//! per user.
//!
//! # How it works
//!
//! 1. A fresh entry is returned without calling the loader
//! 2. If a load is already in flight for the user, the caller joins it
//! 3. Otherwise a new generation is issued and the loader starts as a shared
//!    future that every later caller can join
//! 4. When the load succeeds, the entry is written only if its generation is
//!    still the latest one issued for that user
//!
//! Step 4 means ordering is by start time, not finish time: a load that
//! started before an [`invalidate`](GuildCache::invalidate) can finish last
//! and still never overwrite the newer result.
//!
//! # Thread Safety
//!
//! All state sits behind one `std::sync::Mutex`. It is only held for the
//! check-pending / set-pending / clear-pending transitions and is never held
//! across an `.await`. Lock poisoning is recovered from, since every critical
//! section leaves the map consistent.

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::models::{GuildListError, GuildSnapshot};

/// Outcome of one load, shared by every joined caller.
pub type FetchResult = std::result::Result<Arc<GuildSnapshot>, GuildListError>;

type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

/// A cached snapshot.
struct CacheEntry {
    snapshot: Arc<GuildSnapshot>,
    stored_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() < ttl
    }
}

/// A load that has started but not settled.
struct PendingFetch {
    generation: u64,
    future: SharedFetch,
}

#[derive(Default)]
struct UserSlot {
    entry: Option<CacheEntry>,
    pending: Option<PendingFetch>,
    /// Latest generation issued for this user.
    generation: u64,
}

#[derive(Default)]
struct CacheState {
    users: HashMap<String, UserSlot>,
    /// Cache-wide so generations stay unique across `reset`.
    next_generation: u64,
}

impl CacheState {
    fn issue_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }
}

struct CacheInner {
    ttl: Duration,
    state: Mutex<CacheState>,
}

impl CacheInner {
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records the outcome of the load started with `generation`.
    fn settle(&self, user_id: &str, generation: u64, result: &FetchResult) {
        let mut state = self.lock();
        let Some(slot) = state.users.get_mut(user_id) else {
            tracing::debug!(user_id, generation, "Cache reset while load in flight");
            return;
        };

        if slot
            .pending
            .as_ref()
            .is_some_and(|p| p.generation == generation)
        {
            slot.pending = None;
        }

        match result {
            Ok(snapshot) if slot.generation == generation => {
                slot.entry = Some(CacheEntry {
                    snapshot: Arc::clone(snapshot),
                    stored_at: Instant::now(),
                });
                metrics::counter!("guild_cache_writes_total", "outcome" => "stored").increment(1);
                tracing::debug!(
                    user_id,
                    generation,
                    guild_count = snapshot.guilds.len(),
                    invitable_count = snapshot.invitable.len(),
                    "Cached guild snapshot"
                );
            },
            Ok(_) => {
                metrics::counter!("guild_cache_writes_total", "outcome" => "discarded")
                    .increment(1);
                tracing::debug!(
                    user_id,
                    generation,
                    latest = slot.generation,
                    "Discarded stale guild snapshot"
                );
            },
            Err(e) => {
                tracing::warn!(user_id, generation, error = %e, "Guild load failed");
            },
        }
    }
}

enum Lookup {
    Hit(Arc<GuildSnapshot>),
    Wait(SharedFetch),
}

/// In-process, per-user cache of reconciled guild lists.
///
/// Cloning is cheap and clones share state. Construct one per logical
/// tenant and pass it to whoever needs it.
///
/// # Example
///
/// ```rust,ignore
/// use std::time::Duration;
/// use guildsync::services::GuildCache;
///
/// let cache = GuildCache::new(Duration::from_secs(300));
/// let snapshot = cache
///     .fetch("user-1", || async { reconciler.reconcile("user-1", Some(&token)).await })
///     .await?;
/// ```
#[derive(Clone)]
pub struct GuildCache {
    inner: Arc<CacheInner>,
}

impl GuildCache {
    /// Default time-to-live for cached snapshots.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

    /// Creates an empty cache whose entries live for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                ttl,
                state: Mutex::new(CacheState::default()),
            }),
        }
    }

    /// How long an entry stays fresh after it is stored.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// Returns the user's snapshot if one is cached and not expired.
    ///
    /// Expired entries are treated as a miss but left in place.
    #[must_use]
    pub fn get(&self, user_id: &str) -> Option<Arc<GuildSnapshot>> {
        let ttl = self.ttl();
        let state = self.inner.lock();
        state
            .users
            .get(user_id)
            .and_then(|slot| slot.entry.as_ref())
            .filter(|entry| entry.is_fresh(ttl))
            .map(|entry| Arc::clone(&entry.snapshot))
    }

    /// Returns `true` if a load is in flight for the user.
    #[must_use]
    pub fn is_pending(&self, user_id: &str) -> bool {
        let state = self.inner.lock();
        state
            .users
            .get(user_id)
            .is_some_and(|slot| slot.pending.is_some())
    }

    /// Returns the cached snapshot, joins an in-flight load, or starts
    /// `loader`.
    ///
    /// `loader` is only invoked when neither a fresh entry nor an in-flight
    /// load exists. It is called with the cache lock held, so it must only
    /// build its future and not touch this cache synchronously. The load's
    /// error is handed to every joined caller and is never cached.
    pub async fn fetch<F, Fut>(&self, user_id: &str, loader: F) -> FetchResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<GuildSnapshot, GuildListError>> + Send + 'static,
    {
        let ttl = self.ttl();
        let lookup = {
            let mut state = self.inner.lock();
            let next = state.next_generation + 1;
            let slot = state.users.entry(user_id.to_string()).or_default();

            if let Some(entry) = slot
                .entry
                .as_ref()
                .filter(|entry| entry.is_fresh(ttl))
            {
                metrics::counter!("guild_cache_requests_total", "outcome" => "hit").increment(1);
                Lookup::Hit(Arc::clone(&entry.snapshot))
            } else if let Some(pending) = slot.pending.as_ref() {
                metrics::counter!("guild_cache_requests_total", "outcome" => "join").increment(1);
                tracing::debug!(
                    user_id,
                    generation = pending.generation,
                    "Joining in-flight guild load"
                );
                Lookup::Wait(pending.future.clone())
            } else {
                metrics::counter!("guild_cache_requests_total", "outcome" => "miss").increment(1);
                slot.generation = next;

                let inner = Arc::clone(&self.inner);
                let user = user_id.to_string();
                let load = loader();
                let future = async move {
                    let result = load.await.map(Arc::new);
                    inner.settle(&user, next, &result);
                    result
                }
                .boxed()
                .shared();

                slot.pending = Some(PendingFetch {
                    generation: next,
                    future: future.clone(),
                });
                state.next_generation = next;
                tracing::debug!(user_id, generation = next, "Starting guild load");
                Lookup::Wait(future)
            }
        };

        match lookup {
            Lookup::Hit(snapshot) => Ok(snapshot),
            Lookup::Wait(future) => future.await,
        }
    }

    /// Drops the user's entry and supersedes any in-flight load.
    ///
    /// An in-flight load is not cancelled: callers already waiting on it
    /// still get its result, but it can no longer write to the cache, and the
    /// next [`fetch`](Self::fetch) starts a new load.
    pub fn invalidate(&self, user_id: &str) {
        let mut state = self.inner.lock();
        let generation = state.issue_generation();
        if let Some(slot) = state.users.get_mut(user_id) {
            slot.entry = None;
            slot.pending = None;
            slot.generation = generation;
            tracing::debug!(user_id, generation, "Invalidated guild cache entry");
        }
    }

    /// Drops every user's state.
    pub fn reset(&self) {
        let mut state = self.inner.lock();
        let users = state.users.len();
        state.users.clear();
        tracing::debug!(users, "Guild cache reset");
    }
}

impl Default for GuildCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TTL)
    }
}

impl std::fmt::Debug for GuildCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let users = self.inner.lock().users.len();
        f.debug_struct("GuildCache")
            .field("ttl", &self.inner.ttl)
            .field("users", &users)
            .finish()
    }
}

//! Synthesis cache keyed by clip-set fingerprint.
//!
//! Each fingerprint owns a slot holding a [`tokio::sync::OnceCell`], so
//! concurrent misses for the same snapshot wait on a single synthesis call
//! instead of racing. The slot map itself sits behind a `std::sync::Mutex`
//! that is never held across an `.await`.
//!
//! # Eviction
//!
//! [`CachePolicy`] bounds the cache by entry count (oldest slot evicted
//! first) and/or age (an expired slot is recomputed on next access). The
//! default policy is unbounded with no expiry: entries live for the
//! lifetime of the cache, and stale snapshots are never looked up again
//! because any insert or delete changes the fingerprint.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use clip_bridge_core::models::{Fingerprint, Synthesis};
use tokio::sync::OnceCell;

/// Size and age limits for a [`SynthesisCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CachePolicy {
    /// Maximum number of slots; `0` means unbounded.
    pub max_entries: usize,
    /// Maximum slot age; `None` means entries never expire.
    pub ttl: Option<Duration>,
}

impl CachePolicy {
    pub fn unbounded() -> Self {
        Self::default()
    }
}

struct Slot {
    value: OnceCell<Synthesis>,
    created: Instant,
}

impl Slot {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            value: OnceCell::new(),
            created: Instant::now(),
        })
    }
}

/// Memoizes one [`Synthesis`] per [`Fingerprint`].
pub struct SynthesisCache {
    slots: Mutex<HashMap<Fingerprint, Arc<Slot>>>,
    policy: CachePolicy,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl SynthesisCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            policy,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the cached synthesis for `key`, or run `compute` once and
    /// cache its result.
    ///
    /// Callers arriving while `compute` is in flight for the same key await
    /// that computation rather than starting their own.
    pub async fn get_or_compute<F, Fut>(&self, key: &Fingerprint, compute: F) -> Synthesis
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Synthesis>,
    {
        let slot = self.slot_for(key);

        if let Some(value) = slot.value.get() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(fingerprint = %key, "synthesis cache hit");
            return value.clone();
        }

        let mut computed = false;
        let value = slot
            .value
            .get_or_init(|| {
                computed = true;
                compute()
            })
            .await;

        if computed {
            self.misses.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(fingerprint = %key, "synthesis cache miss");
        } else {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }

        value.clone()
    }

    /// Number of slots currently held (including in-flight ones).
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Fingerprint, Arc<Slot>>> {
        // A panic while holding the guard cannot leave the map half-updated.
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn slot_for(&self, key: &Fingerprint) -> Arc<Slot> {
        let mut slots = self.lock();

        if let Some(slot) = slots.get(key) {
            let expired = self
                .policy
                .ttl
                .is_some_and(|ttl| slot.value.initialized() && slot.created.elapsed() >= ttl);
            if !expired {
                return slot.clone();
            }
            slots.remove(key);
        }

        if self.policy.max_entries > 0 {
            while slots.len() >= self.policy.max_entries {
                let oldest = slots
                    .iter()
                    .min_by_key(|(_, slot)| slot.created)
                    .map(|(k, _)| k.clone());
                match oldest {
                    Some(k) => {
                        slots.remove(&k);
                    }
                    None => break,
                }
            }
        }

        let slot = Slot::new();
        slots.insert(key.clone(), slot.clone());
        slot
    }
}

impl Default for SynthesisCache {
    fn default() -> Self {
        Self::new(CachePolicy::unbounded())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clip_bridge_core::models::Situation;
    use std::sync::atomic::AtomicUsize;

    fn fp(project: &str, count: usize) -> Fingerprint {
        Fingerprint {
            project_id: project.to_string(),
            latest_timestamp: "2024-01-01T00:00:00".to_string(),
            clip_count: count,
        }
    }

    fn synthesis(tag: &str) -> Synthesis {
        Synthesis {
            situation: Situation {
                summary: tag.to_string(),
                current_status: "ok".to_string(),
                urgency: "low".to_string(),
            },
            decisions: vec![],
            strategic_context: String::new(),
            instructions_for_llm: String::new(),
        }
    }

    #[tokio::test]
    async fn test_sequential_calls_compute_once() {
        let cache = SynthesisCache::default();
        let calls = AtomicUsize::new(0);
        let key = fp("p1", 3);

        let first = cache
            .get_or_compute(&key, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                synthesis("first")
            })
            .await;
        let second = cache
            .get_or_compute(&key, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                synthesis("second")
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
    }

    #[tokio::test]
    async fn test_new_fingerprint_recomputes() {
        let cache = SynthesisCache::default();
        let a = cache.get_or_compute(&fp("p1", 3), || async { synthesis("a") }).await;
        let b = cache.get_or_compute(&fp("p1", 4), || async { synthesis("b") }).await;
        assert_ne!(a, b);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_misses_single_flight() {
        let cache = Arc::new(SynthesisCache::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let key = fp("p1", 1);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute(&key, || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        synthesis("shared")
                    })
                    .await
            }));
        }

        for h in handles {
            assert_eq!(h.await.unwrap(), synthesis("shared"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_max_entries_evicts_oldest() {
        let cache = SynthesisCache::new(CachePolicy {
            max_entries: 2,
            ttl: None,
        });
        for i in 0..3 {
            cache
                .get_or_compute(&fp("p", i), || async { synthesis("x") })
                .await;
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        assert_eq!(cache.len(), 2);

        let calls = AtomicUsize::new(0);
        cache
            .get_or_compute(&fp("p", 0), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                synthesis("again")
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1, "oldest entry should have been evicted");
    }

    #[tokio::test]
    async fn test_ttl_expiry_recomputes() {
        let cache = SynthesisCache::new(CachePolicy {
            max_entries: 0,
            ttl: Some(Duration::from_millis(20)),
        });
        let key = fp("p", 1);
        cache.get_or_compute(&key, || async { synthesis("old") }).await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        let fresh = cache.get_or_compute(&key, || async { synthesis("new") }).await;
        assert_eq!(fresh.situation.summary, "new");
    }
}

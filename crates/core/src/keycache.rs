//! Dual-track SM4 key cache.
//!
//! SM2 wrapping is the expensive step on the hot path, so wrapped keys are
//! reused: the session track shares one key per trace id, the system track
//! rotates one key per wall-clock window for untraced records. Lookup is
//! lock-free on hit; a miss runs the key generation and SM2 wrap inside the
//! map's entry lock so exactly one `KeyInfo` exists per cache key.

use crate::crypto::{self, Sm2PublicKey, Sm4Key};
use crate::errors::{ConfigError, CryptoResult};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// An SM4 key and its SM2-wrapped form, produced together and never
/// mutated, so concurrent readers always observe a matching pair.
#[derive(Debug)]
pub struct KeyInfo {
    pub sm4_key: Sm4Key,
    pub wrapped_key: Vec<u8>,
    pub created_at_ms: i64,
}

/// One cache track: key -> `KeyInfo` map plus a FIFO of keys in creation
/// order for eviction.
pub struct KeyCache {
    entries: DashMap<String, Arc<KeyInfo>>,
    queue: Mutex<VecDeque<String>>,
    capacity: AtomicUsize,
    buffer_ratio: f64,
    evicting: AtomicBool,
}

impl KeyCache {
    /// `buffer_ratio` is clamped to [0, 1].
    pub fn new(capacity: usize, buffer_ratio: f64) -> Self {
        Self {
            entries: DashMap::new(),
            queue: Mutex::new(VecDeque::new()),
            capacity: AtomicUsize::new(capacity.max(1)),
            buffer_ratio: buffer_ratio.clamp(0.0, 1.0),
            evicting: AtomicBool::new(false),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Relaxed)
    }

    /// Administrative resize. Zero is rejected; shrinking takes effect at
    /// the next eviction pass.
    pub fn set_capacity(&self, capacity: i64) -> Result<(), ConfigError> {
        if capacity <= 0 {
            return Err(ConfigError::InvalidCacheSize(capacity));
        }
        self.capacity.store(capacity as usize, Ordering::Relaxed);
        Ok(())
    }

    /// Fetch the `KeyInfo` for `cache_key`, creating it on miss.
    ///
    /// The miss path generates a fresh SM4 key and SM2-wraps it while
    /// holding the entry lock, so concurrent callers for the same key all
    /// receive the single `KeyInfo` and at most one wrap runs. A wrap
    /// failure caches nothing.
    pub fn get_or_create(
        &self,
        cache_key: &str,
        public_key: &Sm2PublicKey,
    ) -> CryptoResult<Arc<KeyInfo>> {
        if let Some(existing) = self.entries.get(cache_key) {
            return Ok(Arc::clone(existing.value()));
        }

        let (info, inserted) = match self.entries.entry(cache_key.to_string()) {
            Entry::Occupied(occupied) => (Arc::clone(occupied.get()), false),
            Entry::Vacant(vacant) => {
                let sm4_key = crypto::sm4_generate_key();
                let wrapped_key = public_key.encrypt(&sm4_key)?;
                let info = Arc::new(KeyInfo {
                    sm4_key,
                    wrapped_key,
                    created_at_ms: now_ms(),
                });
                vacant.insert(Arc::clone(&info));
                (info, true)
            }
        };

        if inserted {
            self.queue.lock().push_back(cache_key.to_string());
            self.maybe_evict();
        }
        Ok(info)
    }

    /// Best-effort single-writer eviction. Whoever wins the flag drains
    /// from the FIFO head down to `capacity * (1 - buffer_ratio)`; everyone
    /// else proceeds and will retry on their next insert. Capacity may be
    /// exceeded briefly by in-flight inserts.
    fn maybe_evict(&self) {
        let capacity = self.capacity();
        if self.entries.len() < capacity {
            return;
        }
        if self
            .evicting
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return;
        }

        let target = (capacity as f64 * (1.0 - self.buffer_ratio)).floor() as usize;
        let mut removed = 0usize;
        while self.entries.len() > target {
            // The queue may name entries already gone; removal tolerates
            // that.
            let Some(oldest) = self.queue.lock().pop_front() else {
                break;
            };
            if self.entries.remove(&oldest).is_some() {
                removed += 1;
            }
        }
        self.evicting.store(false, Ordering::Release);
        tracing::debug!(removed, size = self.entries.len(), target_size = target, "evicted key cache entries");
    }
}

/// Identifier for the system track's current rotation window.
pub fn system_window_id(interval_minutes: u64) -> String {
    let window = now_ms() / (interval_minutes.max(1) as i64 * 60_000);
    format!("system_{window}")
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

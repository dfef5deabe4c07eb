// Host Memory Pool — Caching allocator for reference-device buffers
//
// Keeps per-size free lists of byte vectors released by the device so that
// the scratch and table buffers of short-lived applications are reused
// instead of reallocated.
//
// A buffer handed out by the pool is always zeroed: device allocations are
// specified to start zeroed and a recycled vector still holds old data.
//
//   let buf = pool.alloc_zeroed(4096);   // from pool or fresh
//   pool.reclaim(buf);                   // back to the free list
//   pool.empty_cache();                  // drop everything cached

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Snapshot of the pool's allocation statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Bytes held in the cache, not owned by any device buffer.
    pub cached_bytes: usize,
    /// Vectors currently in the cache.
    pub cached_buffers: usize,
    /// Allocations served from the cache.
    pub hits: u64,
    /// Allocations that fell through to the system allocator.
    pub misses: u64,
}

/// Byte-vector caching allocator keyed by exact length.
pub struct BufferPool {
    buckets: Mutex<HashMap<usize, Vec<Vec<u8>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl BufferPool {
    pub fn new() -> Self {
        BufferPool {
            buckets: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// A zeroed vector of exactly `bytes` bytes.
    pub fn alloc_zeroed(&self, bytes: usize) -> Vec<u8> {
        let cached = {
            let mut map = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
            map.get_mut(&bytes).and_then(|stack| stack.pop())
        };
        match cached {
            Some(mut buf) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                buf.fill(0);
                buf
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                vec![0u8; bytes]
            }
        }
    }

    /// Return a vector to the cache.
    pub fn reclaim(&self, buf: Vec<u8>) {
        if buf.is_empty() {
            return;
        }
        let mut map = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        map.entry(buf.len()).or_default().push(buf);
    }

    /// Drop every cached vector. Returns the number of bytes released.
    pub fn empty_cache(&self) -> usize {
        let mut map = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        map.drain().map(|(n, stack)| n * stack.len()).sum()
    }

    pub fn stats(&self) -> PoolStats {
        let map = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        let mut cached_buffers = 0usize;
        let mut cached_bytes = 0usize;
        for (n, stack) in map.iter() {
            cached_buffers += stack.len();
            cached_bytes += *n * stack.len();
        }
        PoolStats {
            cached_bytes,
            cached_buffers,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

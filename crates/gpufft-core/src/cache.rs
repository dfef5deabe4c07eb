use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::backend::{KernelCompiler, KernelHandle, KernelVariant};

// Kernel cache — Compile each kernel variant once
//
// Plans of every Application built against one compiler share a KernelCache.
// The cache maps KernelVariant -> Arc<CompiledKernel>; a pass holding the Arc
// keeps its kernel alive. When the last Arc goes away the kernel is released
// back to the compiler.
//
// Entries stay cached after their plans are gone so a later Application with
// the same variants hits. `release_unused` drops entries nobody else holds.

/// A compiled kernel owned through the cache.
pub struct CompiledKernel {
    handle: KernelHandle,
    variant: KernelVariant,
    compiler: Arc<dyn KernelCompiler>,
}

impl CompiledKernel {
    pub fn handle(&self) -> KernelHandle {
        self.handle
    }

    pub fn variant(&self) -> &KernelVariant {
        &self.variant
    }
}

impl fmt::Debug for CompiledKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledKernel")
            .field("handle", &self.handle)
            .field("variant", &self.variant)
            .finish()
    }
}

impl Drop for CompiledKernel {
    fn drop(&mut self) {
        self.compiler.release(self.handle);
    }
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Variants currently compiled.
    pub entries: usize,
    /// Lookups served from the cache.
    pub hits: u64,
    /// Lookups that had to compile.
    pub misses: u64,
}

/// Kernel cache keyed by variant identity.
pub struct KernelCache {
    compiler: Arc<dyn KernelCompiler>,
    entries: Mutex<HashMap<KernelVariant, Arc<CompiledKernel>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl KernelCache {
    pub fn new(compiler: Arc<dyn KernelCompiler>) -> Self {
        Self {
            compiler,
            entries: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Fetch the kernel for `variant`, compiling it on a miss. The flag is
    /// true when this call compiled the kernel.
    pub fn acquire(
        &self,
        variant: &KernelVariant,
    ) -> std::result::Result<(Arc<CompiledKernel>, bool), String> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(kernel) = entries.get(variant) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            log::debug!("kernel cache hit: {variant}");
            return Ok((kernel.clone(), false));
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        log::debug!("kernel cache miss: {variant}");
        let handle = self.compiler.compile(variant)?;
        let kernel = Arc::new(CompiledKernel {
            handle,
            variant: *variant,
            compiler: self.compiler.clone(),
        });
        entries.insert(*variant, kernel.clone());
        Ok((kernel, true))
    }

    /// Drop the listed entries that no plan holds any more. Returns how many
    /// were evicted.
    pub fn evict_unused(&self, variants: &[KernelVariant]) -> usize {
        let removed: Vec<Arc<CompiledKernel>> = {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            let unused: Vec<KernelVariant> = variants
                .iter()
                .filter(|v| entries.get(*v).is_some_and(|k| Arc::strong_count(k) == 1))
                .copied()
                .collect();
            unused.iter().filter_map(|v| entries.remove(v)).collect()
        };
        if !removed.is_empty() {
            log::debug!("evicted {} unused kernels", removed.len());
        }
        removed.len()
    }

    /// Drop every entry that no plan holds. Returns how many were released.
    pub fn release_unused(&self) -> usize {
        let removed: Vec<Arc<CompiledKernel>> = {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            let unused: Vec<KernelVariant> = entries
                .iter()
                .filter(|(_, k)| Arc::strong_count(k) == 1)
                .map(|(v, _)| *v)
                .collect();
            unused.iter().filter_map(|v| entries.remove(v)).collect()
        };
        removed.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Reset hit/miss counters.
    pub fn reset_stats(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

impl fmt::Debug for KernelCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelCache")
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::ElementLayout;
    use crate::precision::Precision;
    use crate::selector::PassKind;
    use std::sync::atomic::AtomicUsize;

    /// Compiler that counts live kernels and can refuse one radix.
    #[derive(Default)]
    pub(crate) struct CountingCompiler {
        pub next: AtomicU64,
        pub live: AtomicUsize,
        pub compiled: AtomicUsize,
        pub refuse_radix: Option<usize>,
    }

    impl KernelCompiler for CountingCompiler {
        fn compile(&self, variant: &KernelVariant) -> std::result::Result<KernelHandle, String> {
            if variant.kind.radix().is_some() && variant.kind.radix() == self.refuse_radix {
                return Err(format!("no {} butterfly", variant.kind));
            }
            self.compiled.fetch_add(1, Ordering::SeqCst);
            self.live.fetch_add(1, Ordering::SeqCst);
            Ok(KernelHandle(self.next.fetch_add(1, Ordering::SeqCst)))
        }

        fn release(&self, _kernel: KernelHandle) {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    pub(crate) fn variant(radix: usize) -> KernelVariant {
        KernelVariant {
            kind: PassKind::Butterfly { radix },
            inverse: false,
            precision: Precision::Single,
            src_layout: ElementLayout::Interleaved,
            dst_layout: ElementLayout::Interleaved,
            half_spectrum: false,
            lut: false,
        }
    }

    #[test]
    fn test_compile_once() {
        let compiler = Arc::new(CountingCompiler::default());
        let cache = KernelCache::new(compiler.clone());
        let (a, fresh_a) = cache.acquire(&variant(8)).unwrap();
        let (b, fresh_b) = cache.acquire(&variant(8)).unwrap();
        assert!(fresh_a);
        assert!(!fresh_b);
        assert_eq!(a.handle(), b.handle());
        assert_eq!(compiler.compiled.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!((stats.entries, stats.hits, stats.misses), (1, 1, 1));
    }

    #[test]
    fn test_release_unused() {
        let compiler = Arc::new(CountingCompiler::default());
        let cache = KernelCache::new(compiler.clone());
        let (held, _) = cache.acquire(&variant(4)).unwrap();
        drop(cache.acquire(&variant(2)).unwrap());
        assert_eq!(cache.release_unused(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(compiler.live.load(Ordering::SeqCst), 1);
        drop(held);
        assert_eq!(compiler.live.load(Ordering::SeqCst), 1);
        assert_eq!(cache.release_unused(), 1);
        assert_eq!(compiler.live.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_evict_only_listed() {
        let compiler = Arc::new(CountingCompiler::default());
        let cache = KernelCache::new(compiler.clone());
        drop(cache.acquire(&variant(4)).unwrap());
        drop(cache.acquire(&variant(2)).unwrap());
        assert_eq!(cache.evict_unused(&[variant(2)]), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(compiler.live.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_evict_keeps_held_entries() {
        let compiler = Arc::new(CountingCompiler::default());
        let cache = KernelCache::new(compiler.clone());
        let (held, _) = cache.acquire(&variant(8)).unwrap();
        drop(cache.acquire(&variant(4)).unwrap());
        let listed = [variant(8), variant(4), variant(16)];
        assert_eq!(cache.evict_unused(&listed), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(compiler.live.load(Ordering::SeqCst), 1);
        drop(held);
        assert_eq!(cache.evict_unused(&listed), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_compile_error() {
        let compiler = Arc::new(CountingCompiler {
            refuse_radix: Some(3),
            ..Default::default()
        });
        let cache = KernelCache::new(compiler);
        assert!(cache.acquire(&variant(3)).is_err());
        assert!(cache.is_empty());
    }
}

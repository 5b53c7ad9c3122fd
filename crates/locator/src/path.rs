use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[cfg(test)]
pub const NORMALIZED_CACHE_CAPACITY: usize = 3;
#[cfg(not(test))]
pub const NORMALIZED_CACHE_CAPACITY: usize = 1024;

#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicUsize,
    misses: AtomicUsize,
}

#[derive(Debug, Default)]
struct Inner {
    map: HashMap<PathBuf, PathBuf>,
    order: VecDeque<PathBuf>,
}

/// Resolves symlinks and relative components, caching recent answers.
///
/// Two spellings of the same file normalize to the same path, which is what
/// the discovery path filter relies on. Paths that cannot be canonicalized
/// (missing files) are returned unchanged.
#[derive(Debug)]
pub struct PathNormalizer {
    inner: Mutex<Inner>,
    capacity: usize,
    stats: CacheStats,
}

impl Default for PathNormalizer {
    fn default() -> Self {
        Self::with_capacity(NORMALIZED_CACHE_CAPACITY)
    }
}

impl PathNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            capacity: capacity.max(1),
            stats: CacheStats::default(),
        }
    }

    pub fn normalize<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        let path_ref = path.as_ref();
        {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(cached) = inner.map.get(path_ref).cloned() {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                if let Some(pos) = inner.order.iter().position(|p| p == path_ref) {
                    inner.order.remove(pos);
                }
                inner.order.push_back(path_ref.to_path_buf());
                return cached;
            }
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        let canonical = fs::canonicalize(path_ref).unwrap_or_else(|_| {
            #[cfg(windows)]
            {
                PathBuf::from(path_ref.to_string_lossy().replace('\\', "/"))
            }
            #[cfg(not(windows))]
            {
                path_ref.to_path_buf()
            }
        });
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner
            .map
            .insert(path_ref.to_path_buf(), canonical.clone())
            .is_none()
        {
            inner.order.push_back(path_ref.to_path_buf());
        }
        if inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.map.remove(&oldest);
            }
        }
        canonical
    }

    pub fn stats(&self) -> (usize, usize) {
        (
            self.stats.hits.load(Ordering::Relaxed),
            self.stats.misses.load(Ordering::Relaxed),
        )
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

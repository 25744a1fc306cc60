use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

/// Renderings cached under one route path. The generation moves on every
/// revalidation so renders started before it can be told apart.
struct PathEntries<T> {
    generation: u64,
    renders: HashMap<String, (Instant, T)>,
}

impl<T> Default for PathEntries<T> {
    fn default() -> Self {
        Self {
            generation: 0,
            renders: HashMap::new(),
        }
    }
}

/// Rendered page models, keyed by route path and then by a per-request key.
/// Revalidating a path drops everything cached under it.
pub struct RenderCache<T> {
    ttl: Duration,
    entries: Mutex<HashMap<String, PathEntries<T>>>,
}

impl<T: Clone> RenderCache<T> {
    /// A zero TTL disables caching.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, path: &str, key: &str) -> Option<T> {
        if self.ttl.is_zero() {
            return None;
        }
        let entries = self.entries.lock().ok()?;
        let (stored_at, value) = entries.get(path)?.renders.get(key)?;
        (stored_at.elapsed() < self.ttl).then(|| value.clone())
    }

    /// Current generation of `path`. Take it before loading the data a
    /// rendering is built from and hand it back to `put`.
    pub fn generation(&self, path: &str) -> u64 {
        match self.entries.lock() {
            Ok(entries) => entries.get(path).map_or(0, |e| e.generation),
            Err(e) => {
                warn!("Render cache lock poisoned: {}", e);
                0
            }
        }
    }

    /// Store a rendering unless `path` was revalidated since `generation`
    /// was read.
    pub fn put(&self, path: &str, generation: u64, key: String, value: T) {
        if self.ttl.is_zero() {
            return;
        }
        match self.entries.lock() {
            Ok(mut entries) => {
                let path_entries = entries.entry(path.to_string()).or_default();
                if path_entries.generation != generation {
                    debug!("Skipping stale rendering of {}", path);
                    return;
                }
                path_entries
                    .renders
                    .retain(|_, (stored_at, _)| stored_at.elapsed() < self.ttl);
                path_entries.renders.insert(key, (Instant::now(), value));
            }
            Err(e) => warn!("Render cache lock poisoned: {}", e),
        }
    }

    pub fn revalidate(&self, path: &str) {
        match self.entries.lock() {
            Ok(mut entries) => {
                let path_entries = entries.entry(path.to_string()).or_default();
                path_entries.generation += 1;
                let dropped = path_entries.renders.len();
                path_entries.renders.clear();
                debug!("Revalidated {} ({} cached renderings)", path, dropped);
            }
            Err(e) => warn!("Render cache lock poisoned: {}", e),
        }
    }
}

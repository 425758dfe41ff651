// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Parsed scriptlet caching.
//!
//! List materialization relinks the same template once per item, and most
//! relinked scriptlets are textually identical to ones already seen (ids
//! only change when the scriptlet mentions them). [`ScriptCache`] keeps the
//! parse results of recently compiled sources so identical text is parsed once.

use crate::error::Result;
use crate::script::ast::Script;
use crate::script::parse_script;
use lru::LruCache;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};

/// Default number of parsed scriptlets kept in memory.
pub const DEFAULT_CACHE_SIZE: usize = 256;

/// Computes the cache key of a scriptlet source.
pub fn source_hash(source: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    source.hash(&mut hasher);
    hasher.finish()
}

/// In-memory LRU cache of parsed scriptlets.
///
/// Clones share the same storage.
#[derive(Debug, Clone)]
pub struct ScriptCache {
    cache: Arc<Mutex<LruCache<u64, (String, Arc<Script>)>>>,
}

impl ScriptCache {
    /// Creates a cache holding at most `capacity` scripts (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    /// Returns the parsed form of `source`, parsing it on a miss.
    ///
    /// Parse failures are not cached.
    pub fn get_or_parse(&self, source: &str) -> Result<Arc<Script>> {
        let key = source_hash(source);

        if let Some((cached_source, script)) = self.lock().get(&key) {
            if cached_source == source {
                tracing::trace!("Script cache hit: {:016x}", key);
                return Ok(Arc::clone(script));
            }
        }

        let script = Arc::new(parse_script(source)?);
        self.lock()
            .put(key, (source.to_string(), Arc::clone(&script)));
        Ok(script)
    }

    /// Number of cached scripts.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every cached script.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<u64, (String, Arc<Script>)>> {
        // Entries are immutable once inserted, so a poisoned cache is still consistent.
        match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for ScriptCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_sources_share_one_parse() {
        let cache = ScriptCache::new(4);
        let a = cache.get_or_parse("n1.props.value + 1").unwrap();
        let b = cache.get_or_parse("n1.props.value + 1").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn least_recently_used_entries_are_evicted() {
        let cache = ScriptCache::new(2);
        cache.get_or_parse("a").unwrap();
        cache.get_or_parse("b").unwrap();
        cache.get_or_parse("c").unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn parse_failures_are_not_cached() {
        let cache = ScriptCache::new(2);
        assert!(cache.get_or_parse("a +").is_err());
        assert!(cache.is_empty());
    }
}

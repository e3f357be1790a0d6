//! Prepared-query cache keyed by `(SPARQL source text, active graph stack, world fingerprint)`
//! (spec.md §4.7). `*STATIC` property paths bake concrete closure values into the compiled SQL at
//! prepare time (see [`crate::path::compile_static_closure`]), so a plan compiled before a write
//! cannot simply be reused verbatim after one: the world fingerprint is folded into the cache key
//! itself, so any insert or delete anywhere in the store invalidates every cached plan rather than
//! only the ones that happen to embed a `*STATIC` closure. That trades cache-hit rate for a cache
//! that is never stale, which is the simpler property to reason about.

use crate::query::PreparedQuery;
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    source: String,
    graph_scope: Vec<i64>,
    world_fingerprint: i64,
}

#[derive(Default)]
pub struct PreparedQueryCache {
    entries: DashMap<CacheKey, Arc<PreparedQuery>>,
}

impl PreparedQueryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compile(
        &self,
        source: &str,
        graph_scope: &[i64],
        world_fingerprint: i64,
        compile: impl FnOnce() -> crate::error::CompileResult<PreparedQuery>,
    ) -> crate::error::CompileResult<Arc<PreparedQuery>> {
        let key = CacheKey {
            source: source.to_string(),
            graph_scope: graph_scope.to_vec(),
            world_fingerprint,
        };
        if let Some(hit) = self.entries.get(&key) {
            return Ok(Arc::clone(&hit));
        }
        let compiled = Arc::new(compile()?);
        self.entries.insert(key, Arc::clone(&compiled));
        Ok(compiled)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy(sql: &str) -> PreparedQuery {
        PreparedQuery {
            sql: sql.to_string(),
            params: Vec::new(),
            output_vars: vec!["x".to_string()],
        }
    }

    #[test]
    fn identical_source_scope_and_fingerprint_hits_the_cache() {
        let cache = PreparedQueryCache::new();
        let mut calls = 0;
        let a = cache.get_or_compile("SELECT ?x", &[1], 0, || {
            calls += 1;
            Ok(dummy("A"))
        }).unwrap();
        let b = cache.get_or_compile("SELECT ?x", &[1], 0, || {
            calls += 1;
            Ok(dummy("B"))
        }).unwrap();
        assert_eq!(calls, 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn a_new_world_fingerprint_forces_recompilation() {
        let cache = PreparedQueryCache::new();
        let a = cache.get_or_compile("SELECT ?x", &[1], 0, || Ok(dummy("A"))).unwrap();
        let b = cache.get_or_compile("SELECT ?x", &[1], 1, || Ok(dummy("B"))).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(b.sql, "B");
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn a_different_graph_scope_is_a_distinct_cache_entry() {
        let cache = PreparedQueryCache::new();
        cache.get_or_compile("SELECT ?x", &[1], 0, || Ok(dummy("A"))).unwrap();
        let b = cache.get_or_compile("SELECT ?x", &[2], 0, || Ok(dummy("B"))).unwrap();
        assert_eq!(b.sql, "B");
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn clear_evicts_every_entry() {
        let cache = PreparedQueryCache::new();
        cache.get_or_compile("SELECT ?x", &[1], 0, || Ok(dummy("A"))).unwrap();
        assert!(!cache.is_empty());
        cache.clear();
        assert!(cache.is_empty());
    }
}

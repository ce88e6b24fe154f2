//! Per-session memoization of expensive enumerations.
//!
//! One cache per session, four slots (functions, imports, exports, strings).
//! A populated slot is immutable until the whole cache is invalidated;
//! invalidation is coarse because any backend mutation can shift every
//! enumeration. Concurrent loaders for a missing slot collapse to one fetch:
//! the first caller loads under the write lock, siblings block on the same
//! lock and find the slot populated.

use crate::error::GatewayError;
use crate::worker::proto::{ExportItem, FunctionItem, ImportItem, StringItem};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Default)]
struct Slots {
    functions: Option<Arc<Vec<FunctionItem>>>,
    imports: Option<Arc<Vec<ImportItem>>>,
    exports: Option<Arc<Vec<ExportItem>>>,
    strings: Option<Arc<Vec<StringItem>>>,
}

/// Cache for a single session's enumerations.
#[derive(Default)]
pub struct SessionCache {
    slots: RwLock<Slots>,
}

macro_rules! load_slot {
    ($name:ident, $slot:ident, $item:ty, $label:literal) => {
        /// Return the cached slice, or run `loader` once and store its
        /// result. The boolean reports whether this call was served from
        /// cache.
        pub async fn $name<F>(
            &self,
            session_id: &str,
            loader: F,
        ) -> Result<(Arc<Vec<$item>>, bool), GatewayError>
        where
            F: Future<Output = Result<Vec<$item>, GatewayError>>,
        {
            {
                let slots = self.slots.read().await;
                if let Some(data) = &slots.$slot {
                    debug!(session_id, kind = $label, "cache hit");
                    return Ok((data.clone(), true));
                }
            }

            let mut slots = self.slots.write().await;
            if let Some(data) = &slots.$slot {
                // A sibling populated the slot while we waited for the lock.
                return Ok((data.clone(), false));
            }
            debug!(session_id, kind = $label, "cache miss");
            let data = Arc::new(loader.await?);
            slots.$slot = Some(data.clone());
            Ok((data, false))
        }
    };
}

impl SessionCache {
    load_slot!(load_functions, functions, FunctionItem, "functions");
    load_slot!(load_imports, imports, ImportItem, "imports");
    load_slot!(load_exports, exports, ExportItem, "exports");
    load_slot!(load_strings, strings, StringItem, "strings");
}

/// Top-level map of session id to cache. Sessions get a cache lazily on
/// first enumeration; invalidation drops the whole entry.
#[derive(Default)]
pub struct CacheMap {
    inner: Mutex<HashMap<String, Arc<SessionCache>>>,
}

impl CacheMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_session(&self, session_id: &str) -> Arc<SessionCache> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(SessionCache::default()))
            .clone()
    }

    /// Drop every cached enumeration for the session. Called on teardown and
    /// after any mutation that can change enumeration results.
    pub fn invalidate(&self, session_id: &str) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.remove(session_id).is_some() {
            debug!(session_id, "cache cleared");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn functions(n: usize) -> Vec<FunctionItem> {
        (0..n)
            .map(|i| FunctionItem {
                address: 0x1000 + i as u64,
                name: format!("sub_{i}"),
            })
            .collect()
    }

    #[tokio::test]
    async fn first_load_misses_then_hits() {
        let cache = SessionCache::default();

        let (data, hit) = cache
            .load_functions("s1", async { Ok(functions(2)) })
            .await
            .expect("load");
        assert!(!hit);
        assert_eq!(data.len(), 2);

        let (data, hit) = cache
            .load_functions("s1", async { panic!("loader must not run on hit") })
            .await
            .expect("load");
        assert!(hit);
        assert_eq!(data.len(), 2);
    }

    #[tokio::test]
    async fn failed_load_leaves_slot_empty_for_retry() {
        let cache = SessionCache::default();

        let err = cache
            .load_functions("s1", async {
                Err(GatewayError::Backend("fetch failed".to_string()))
            })
            .await
            .expect_err("loader error propagates");
        assert!(matches!(err, GatewayError::Backend(_)));

        let (data, hit) = cache
            .load_functions("s1", async { Ok(functions(1)) })
            .await
            .expect("retry succeeds");
        assert!(!hit);
        assert_eq!(data.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_loaders_collapse_to_one_fetch() {
        let cache = Arc::new(SessionCache::default());
        let fetches = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let fetches = fetches.clone();
            tasks.push(tokio::spawn(async move {
                cache
                    .load_functions("s1", async move {
                        fetches.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                        Ok(functions(3))
                    })
                    .await
                    .expect("load")
            }));
        }
        for task in tasks {
            let (data, _) = task.await.expect("join");
            assert_eq!(data.len(), 3);
        }
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidate_clears_every_slot() {
        let map = CacheMap::new();
        let cache = map.for_session("s1");
        cache
            .load_functions("s1", async { Ok(functions(2)) })
            .await
            .expect("functions");
        cache
            .load_strings("s1", async {
                Ok(vec![StringItem {
                    address: 0x100,
                    value: "alpha".to_string(),
                }])
            })
            .await
            .expect("strings");

        map.invalidate("s1");

        let fresh = map.for_session("s1");
        let (_, hit) = fresh
            .load_functions("s1", async { Ok(functions(2)) })
            .await
            .expect("reload");
        assert!(!hit, "post-invalidation read must miss");
        let (_, hit) = fresh
            .load_strings("s1", async { Ok(Vec::new()) })
            .await
            .expect("reload");
        assert!(!hit, "post-invalidation read must miss");
    }
}

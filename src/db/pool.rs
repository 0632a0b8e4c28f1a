//! Process-wide cache of connection pools, one per pooled backend kind.
//!
//! # Design Decisions
//!
//! - **`OnceCell` per backend key**: Single-flight pool creation. Concurrent
//!   first requests for the same kind wait for one construction and share it.
//! - **Failed construction is not cached**: `get_or_try_init` leaves the cell
//!   empty on error, so the next request retries.
//! - **First configuration wins**: a later request for the same kind with a
//!   different URL reuses the cached pool and logs a warning.
//!
//! # Concurrency Safety
//!
//! - The map lock is never held across an await point; only the per-key cell
//!   is awaited.
//! - Lookup takes the read lock first and upgrades to the write lock with a
//!   double-check, so two racing tasks never insert two cells for one key.

use crate::db::driver::{BackendConnection, PoolProvider};
use crate::models::{BackendKind, ErrorNode};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, LazyLock};
use std::time::Instant;
use tokio::sync::{OnceCell, RwLock as TokioRwLock};
use tracing::{debug, info, warn};

/// A cached pool together with the URL it was built for.
pub struct PoolHandle {
    pub kind: BackendKind,
    pub url: String,
    pub created_at: Instant,
    provider: Arc<dyn PoolProvider>,
}

impl PoolHandle {
    pub fn new(kind: BackendKind, url: impl Into<String>, provider: Arc<dyn PoolProvider>) -> Self {
        Self {
            kind,
            url: url.into(),
            created_at: Instant::now(),
            provider,
        }
    }

    /// Check a session out of the pool.
    pub async fn get_connection(&self) -> Result<Box<dyn BackendConnection>, ErrorNode> {
        self.provider.get_connection().await
    }

    pub async fn close(&self) {
        self.provider.close().await;
    }
}

impl std::fmt::Debug for PoolHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolHandle")
            .field("kind", &self.kind)
            .field("url", &self.url)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

static SHARED: LazyLock<Arc<PoolCache>> = LazyLock::new(|| Arc::new(PoolCache::new()));

/// Lazily populated map from backend kind to pool.
#[derive(Default)]
pub struct PoolCache {
    pools: TokioRwLock<HashMap<BackendKind, Arc<OnceCell<Arc<PoolHandle>>>>>,
}

impl PoolCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache.
    pub fn shared() -> Arc<PoolCache> {
        Arc::clone(&SHARED)
    }

    /// Return the pool for `kind`, creating it with `init` on first use.
    ///
    /// `init` runs at most once per kind across concurrent callers; if it
    /// fails, nothing is cached and the error is returned.
    pub async fn get_or_create<F, Fut>(
        &self,
        kind: BackendKind,
        url: &str,
        init: F,
    ) -> Result<Arc<PoolHandle>, ErrorNode>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<dyn PoolProvider>, ErrorNode>>,
    {
        let cell = {
            let pools = self.pools.read().await;
            if let Some(cell) = pools.get(&kind) {
                Arc::clone(cell)
            } else {
                drop(pools);
                let mut pools = self.pools.write().await;
                // Double-check after acquiring write lock
                Arc::clone(pools.entry(kind).or_insert_with(|| Arc::new(OnceCell::new())))
            }
        };

        let handle = cell
            .get_or_try_init(|| async {
                info!(backend = %kind, url = %url, "Creating connection pool");
                let provider = init().await?;
                Ok::<_, ErrorNode>(Arc::new(PoolHandle::new(kind, url, provider)))
            })
            .await?;

        if handle.url != url {
            warn!(
                backend = %kind,
                cached_url = %handle.url,
                requested_url = %url,
                "Pool already exists for this backend; ignoring new configuration"
            );
        }

        debug!(backend = %kind, "Returning cached pool");
        Ok(Arc::clone(handle))
    }

    /// The pool for `kind`, if one has been created.
    pub async fn get(&self, kind: BackendKind) -> Option<Arc<PoolHandle>> {
        let pools = self.pools.read().await;
        pools.get(&kind).and_then(|cell| cell.get()).cloned()
    }

    /// Number of initialized pools.
    pub async fn len(&self) -> usize {
        let pools = self.pools.read().await;
        pools.values().filter(|cell| cell.get().is_some()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Close and forget every pool.
    pub async fn clear(&self) {
        // Drain pools under lock, close outside lock
        let drained: Vec<_> = {
            let mut pools = self.pools.write().await;
            pools.drain().collect()
        };

        for (kind, cell) in drained {
            if let Some(handle) = cell.get() {
                info!(backend = %kind, "Closing connection pool");
                handle.close().await;
            }
        }
    }
}

impl std::fmt::Debug for PoolCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolCache").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct NullPool;

    #[async_trait]
    impl PoolProvider for NullPool {
        async fn get_connection(&self) -> Result<Box<dyn BackendConnection>, ErrorNode> {
            Err(ErrorNode::new("empty pool"))
        }
    }

    fn null_pool() -> Arc<dyn PoolProvider> {
        Arc::new(NullPool)
    }

    #[tokio::test]
    async fn test_second_request_reuses_pool() {
        let cache = PoolCache::new();
        let builds = AtomicUsize::new(0);
        let url = "mysql://localhost:3306/";

        let first = cache
            .get_or_create(BackendKind::PooledMySql, url, || async {
                builds.fetch_add(1, Ordering::SeqCst);
                Ok(null_pool())
            })
            .await
            .unwrap();
        let second = cache
            .get_or_create(BackendKind::PooledMySql, url, || async {
                builds.fetch_add(1, Ordering::SeqCst);
                Ok(null_pool())
            })
            .await
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_kinds_get_separate_pools() {
        let cache = PoolCache::new();
        let a = cache
            .get_or_create(BackendKind::PooledMySql, "mysql://a:3306/", || async {
                Ok(null_pool())
            })
            .await
            .unwrap();
        let b = cache
            .get_or_create(BackendKind::PooledMariaDb, "mariadb://b:3306/", || async {
                Ok(null_pool())
            })
            .await
            .unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn test_failed_init_is_not_cached() {
        let cache = PoolCache::new();
        let failed = cache
            .get_or_create(BackendKind::PooledMySql, "mysql://x:3306/", || async {
                Err(ErrorNode::new("boom"))
            })
            .await;
        assert!(failed.is_err());
        assert!(cache.get(BackendKind::PooledMySql).await.is_none());

        let ok = cache
            .get_or_create(BackendKind::PooledMySql, "mysql://x:3306/", || async {
                Ok(null_pool())
            })
            .await;
        assert!(ok.is_ok());
    }

    #[tokio::test]
    async fn test_first_configuration_wins() {
        let cache = PoolCache::new();
        cache
            .get_or_create(BackendKind::PooledMySql, "mysql://first:3306/", || async {
                Ok(null_pool())
            })
            .await
            .unwrap();
        let again = cache
            .get_or_create(BackendKind::PooledMySql, "mysql://second:3306/", || async {
                Ok(null_pool())
            })
            .await
            .unwrap();
        assert_eq!(again.url, "mysql://first:3306/");
    }

    #[tokio::test]
    async fn test_concurrent_first_use_builds_once() {
        let cache = Arc::new(PoolCache::new());
        let builds = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let cache = Arc::clone(&cache);
            let builds = Arc::clone(&builds);
            tasks.push(tokio::spawn(async move {
                cache
                    .get_or_create(BackendKind::PooledMariaDb, "mariadb://h:3306/", || async {
                        builds.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(null_pool())
                    })
                    .await
                    .unwrap()
            }));
        }

        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.unwrap());
        }

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(handles.iter().all(|h| Arc::ptr_eq(h, &handles[0])));
    }

    #[tokio::test]
    async fn test_clear_empties_cache() {
        let cache = PoolCache::new();
        cache
            .get_or_create(BackendKind::PooledMySql, "mysql://h:3306/", || async {
                Ok(null_pool())
            })
            .await
            .unwrap();
        cache.clear().await;
        assert!(cache.is_empty().await);
    }
}

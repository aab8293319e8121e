// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::IndexHandle;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// 索引缓存：按存储代数失效
///
/// Every successful ingest bumps the generation. A handle is stored with the
/// generation read *before* its snapshot was scanned, so a handle that might
/// miss records is never returned once a newer ingest has finished.
#[derive(Default)]
pub struct IndexCache {
    generation: AtomicU64,
    slot: RwLock<Option<(u64, Arc<IndexHandle>)>>,
}

impl IndexCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Called after the store accepted new records.
    pub fn invalidate(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub async fn get(&self) -> Option<Arc<IndexHandle>> {
        let current = self.current_generation();
        match &*self.slot.read().await {
            Some((generation, handle)) if *generation == current => Some(Arc::clone(handle)),
            _ => None,
        }
    }

    /// Keep `handle` unless a newer one is already cached.
    pub async fn store(&self, generation: u64, handle: Arc<IndexHandle>) {
        let mut slot = self.slot.write().await;
        if slot.as_ref().is_some_and(|(cached, _)| *cached > generation) {
            return;
        }
        *slot = Some((generation, handle));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{IndexParams, SimilarityIndex};
    use crate::store::Snapshot;

    fn empty_handle() -> Arc<IndexHandle> {
        Arc::new(SimilarityIndex::build(Snapshot::empty(), IndexParams::default()).unwrap())
    }

    #[tokio::test]
    async fn test_serves_handle_of_current_generation() {
        let cache = IndexCache::new();
        assert!(cache.get().await.is_none());

        let generation = cache.current_generation();
        cache.store(generation, empty_handle()).await;
        assert!(cache.get().await.is_some());
    }

    #[tokio::test]
    async fn test_invalidate_hides_older_handle() {
        let cache = IndexCache::new();
        let generation = cache.current_generation();
        cache.store(generation, empty_handle()).await;

        cache.invalidate();
        assert!(cache.get().await.is_none());
    }

    #[tokio::test]
    async fn test_build_racing_an_ingest_is_never_served() {
        let cache = IndexCache::new();
        // query reads the generation, then an ingest lands before it stores
        let seen = cache.current_generation();
        cache.invalidate();
        cache.store(seen, empty_handle()).await;

        assert!(cache.get().await.is_none());
    }

    #[tokio::test]
    async fn test_older_build_does_not_replace_newer() {
        let cache = IndexCache::new();
        let old = cache.current_generation();
        let new = cache.invalidate();

        cache.store(new, empty_handle()).await;
        cache.store(old, empty_handle()).await;
        assert!(cache.get().await.is_some());
    }
}

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use populator::k8s_openapi::api::core::v1::PersistentVolumeClaim;
use populator::kube::runtime::reflector::Store;
use thiserror::Error;

use crate::key::QueueKey;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Claim cache has not synced yet")]
    NotSynced,
    #[error("Claim cache writer was dropped before the initial sync")]
    WriterDropped,
}

/// Read side of the local claim mirror.
pub trait ClaimCache: Send + Sync {
    /// `Ok(None)` means the claim is gone from the cluster.
    fn get_by_key(&self, key: &QueueKey)
    -> Result<Option<Arc<PersistentVolumeClaim>>, CacheError>;
}

/// Reflector store of claims, populated by [`crate::event::ClaimReflector`].
#[derive(Clone)]
pub struct ClaimStore {
    store: Store<PersistentVolumeClaim>,
    synced: Arc<AtomicBool>,
}

impl ClaimStore {
    pub(crate) fn new(store: Store<PersistentVolumeClaim>, synced: Arc<AtomicBool>) -> Self {
        Self { store, synced }
    }

    pub fn has_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }

    pub async fn wait_synced(&self) -> Result<(), CacheError> {
        self.store
            .wait_until_ready()
            .await
            .map_err(|_| CacheError::WriterDropped)
    }

    pub fn state(&self) -> Vec<Arc<PersistentVolumeClaim>> {
        self.store.state()
    }
}

impl ClaimCache for ClaimStore {
    fn get_by_key(
        &self,
        key: &QueueKey,
    ) -> Result<Option<Arc<PersistentVolumeClaim>>, CacheError> {
        if !self.has_synced() {
            return Err(CacheError::NotSynced);
        }
        Ok(self.store.get(&key.object_ref()))
    }
}

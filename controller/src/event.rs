use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::prelude::*;
use populator::k8s_openapi::api::core::v1::PersistentVolumeClaim;
use populator::kube::runtime::reflector::{self, ObjectRef, store::Writer};
use populator::kube::runtime::{WatchStreamExt, watcher};
use tokio_util::sync::CancellationToken;

use crate::cache::ClaimStore;
use crate::key::QueueKey;
use crate::queue::WorkQueue;
use crate::source::data_source_ref;

/// A change to a claim observed by the watcher.
#[derive(Clone, Debug)]
pub enum ClaimEvent {
    Added(Arc<PersistentVolumeClaim>),
    Updated {
        old: Arc<PersistentVolumeClaim>,
        new: Arc<PersistentVolumeClaim>,
    },
    Deleted(Arc<PersistentVolumeClaim>),
}

impl ClaimEvent {
    pub fn claim(&self) -> &PersistentVolumeClaim {
        match self {
            Self::Added(claim) | Self::Deleted(claim) => claim,
            Self::Updated { new, .. } => new,
        }
    }

    pub fn key(&self) -> populator::Result<QueueKey> {
        QueueKey::from_resource(self.claim())
    }

    /// Updates are only interesting when they touch the data source reference
    /// or replace the claim with a new object of the same name.
    pub fn requires_reconcile(&self) -> bool {
        match self {
            Self::Added(_) | Self::Deleted(_) => true,
            Self::Updated { old, new } => {
                old.metadata.uid != new.metadata.uid
                    || data_source_ref(old) != data_source_ref(new)
            }
        }
    }
}

/// Applies watcher events to the claim store and turns them into [`ClaimEvent`]s.
pub struct ClaimReflector {
    writer: Writer<PersistentVolumeClaim>,
    reader: reflector::Store<PersistentVolumeClaim>,
    synced: Arc<AtomicBool>,
    // objects seen during an in-progress relist
    listing: Option<HashSet<ObjectRef<PersistentVolumeClaim>>>,
    // relist events held back until the store swaps in the new list
    pending: Vec<ClaimEvent>,
}

impl ClaimReflector {
    pub fn new() -> (Self, ClaimStore) {
        let writer = Writer::default();
        let reader = writer.as_reader();
        let synced = Arc::new(AtomicBool::new(false));
        let store = ClaimStore::new(reader.clone(), synced.clone());
        (
            Self {
                writer,
                reader,
                synced,
                listing: None,
                pending: Vec::new(),
            },
            store,
        )
    }

    fn applied(&self, claim: PersistentVolumeClaim) -> ClaimEvent {
        let new = Arc::new(claim);
        match self.reader.get(&ObjectRef::from_obj(new.as_ref())) {
            Some(old) => ClaimEvent::Updated { old, new },
            None => ClaimEvent::Added(new),
        }
    }

    pub fn apply(&mut self, event: watcher::Event<PersistentVolumeClaim>) -> Vec<ClaimEvent> {
        let events = match &event {
            watcher::Event::Init => {
                self.listing = Some(HashSet::new());
                self.pending.clear();
                vec![]
            }
            watcher::Event::InitApply(claim) => {
                if let Some(listing) = self.listing.as_mut() {
                    listing.insert(ObjectRef::from_obj(claim));
                }
                let applied = self.applied(claim.clone());
                self.pending.push(applied);
                vec![]
            }
            watcher::Event::InitDone => {
                let listing = self.listing.take().unwrap_or_default();
                let mut events = std::mem::take(&mut self.pending);
                events.extend(
                    self.reader
                        .state()
                        .into_iter()
                        .filter(|claim| !listing.contains(&ObjectRef::from_obj(claim.as_ref())))
                        .map(ClaimEvent::Deleted),
                );
                events
            }
            watcher::Event::Apply(claim) => vec![self.applied(claim.clone())],
            watcher::Event::Delete(claim) => vec![ClaimEvent::Deleted(Arc::new(claim.clone()))],
        };
        self.writer.apply_watcher_event(&event);
        if matches!(event, watcher::Event::InitDone) {
            self.synced.store(true, Ordering::Release);
        }
        events
    }
}

/// Mirrors claims into the store and queues the keys of the ones that need
/// reconciling until `shutdown` is cancelled.
pub async fn watch_claims(
    api: populator::kube::Api<PersistentVolumeClaim>,
    config: watcher::Config,
    mut reflector: ClaimReflector,
    queue: WorkQueue<QueueKey>,
    shutdown: CancellationToken,
) {
    let mut stream = watcher(api, config).default_backoff().boxed();
    loop {
        let event = tokio::select! {
            _ = shutdown.cancelled() => break,
            event = stream.next() => event,
        };
        match event {
            Some(Ok(event)) => {
                for event in reflector.apply(event) {
                    if !event.requires_reconcile() {
                        continue;
                    }
                    match event.key() {
                        Ok(key) => {
                            tracing::debug!(%key, ?event, "Queueing claim");
                            queue.add(key).await;
                        }
                        Err(err) => tracing::warn!("Skipping claim event: {err}"),
                    }
                }
            }
            Some(Err(err)) => tracing::warn!("Claim watch error: {err}"),
            None => break,
        }
    }
    tracing::info!("Claim watch stopped");
}

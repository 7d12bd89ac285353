use std::sync::{Arc, Mutex};

use populator::k8s_openapi::api::batch::v1::Job;
use populator::k8s_openapi::api::core::v1::{
    PersistentVolumeClaim, PersistentVolumeClaimSpec, TypedLocalObjectReference,
};
use populator::kube::api::ObjectMeta;
use populator::kube::runtime::watcher;
use populator::{GitSource, Populator, PopulatorSpec};
use populator_controller::claim::ClaimReconciler;
use populator_controller::dispatch::Dispatcher;
use populator_controller::event::ClaimReflector;
use populator_controller::launcher::{JobLauncher, LaunchError};
use populator_controller::source::SourceLookup;
use populator_controller::worker::Worker;
use populator_controller::{QueueKey, WorkQueue};

struct Sources(Vec<Populator>);

#[async_trait::async_trait]
impl SourceLookup for Sources {
    async fn get(&self, namespace: &str, name: &str) -> populator::Result<Option<Populator>> {
        Ok(self
            .0
            .iter()
            .find(|populator| {
                populator.metadata.namespace.as_deref() == Some(namespace)
                    && populator.metadata.name.as_deref() == Some(name)
            })
            .cloned())
    }
}

#[derive(Clone, Default)]
struct Launcher(Arc<Mutex<Vec<Job>>>);

impl Launcher {
    fn jobs(&self) -> Vec<Job> {
        self.0.lock().expect("Launcher lock poisoned").clone()
    }
}

#[async_trait::async_trait]
impl JobLauncher for Launcher {
    async fn launch(&self, job: &Job, _namespace: &str) -> Result<Job, LaunchError> {
        let mut jobs = self.0.lock().expect("Launcher lock poisoned");
        let name = job.metadata.name.clone().unwrap_or_default();
        if jobs.iter().any(|existing| existing.metadata.name.as_deref() == Some(&name)) {
            return Err(LaunchError::AlreadyExists(name));
        }
        jobs.push(job.clone());
        Ok(job.clone())
    }
}

fn claim(name: &str, source: &str) -> PersistentVolumeClaim {
    PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(name.into()),
            namespace: Some("ns".into()),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            data_source: Some(TypedLocalObjectReference {
                api_group: Some("populator.io".into()),
                kind: "Populator".into(),
                name: source.into(),
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn git_source(name: &str) -> Populator {
    let mut populator = Populator::new(
        name,
        PopulatorSpec {
            type_: "git".into(),
            mountpoint: "data".into(),
            git: Some(GitSource {
                repo: "https://x/y.git".into(),
                branch: "main".into(),
                tag: None,
            }),
            ..Default::default()
        },
    );
    populator.metadata.namespace = Some("ns".into());
    populator
}

#[tokio::test]
async fn test_claim_with_git_source_is_populated() {
    let (mut reflector, store) = ClaimReflector::new();
    let queue = WorkQueue::<QueueKey>::new();
    let launcher = Launcher::default();
    let reconciler = ClaimReconciler::new(
        Sources(vec![git_source("ds1")]),
        launcher.clone(),
        Dispatcher::default(),
    );
    let worker = Worker::new(queue.clone(), store.clone(), reconciler, 5);

    let mut events = reflector.apply(watcher::Event::Init);
    events.extend(reflector.apply(watcher::Event::InitApply(claim("pvc1", "ds1"))));
    events.extend(reflector.apply(watcher::Event::InitDone));
    for event in events.iter().filter(|event| event.requires_reconcile()) {
        queue.add(event.key().expect("Failed to build key")).await;
    }
    // a duplicate notification coalesces into the pending key
    queue.add(QueueKey::new("ns", "pvc1")).await;
    store.wait_synced().await.expect("Store never synced");
    assert_eq!(queue.len().await, 1);

    assert!(worker.process_next_item().await);
    let jobs = launcher.jobs();
    assert_eq!(jobs.len(), 1);
    let job = &jobs[0];
    assert_eq!(job.metadata.name.as_deref(), Some("ds1-pvc-pvc1"));
    assert_eq!(job.metadata.namespace.as_deref(), Some("ns"));
    let pod = job
        .spec
        .as_ref()
        .and_then(|spec| spec.template.spec.as_ref())
        .expect("Missing pod spec");
    let container = &pod.containers[0];
    assert_eq!(
        container.args.as_deref(),
        Some(["https://x/y.git", "main", "data"].map(String::from).as_slice())
    );
    let mounts = container.volume_mounts.as_deref().unwrap_or_default();
    assert_eq!(mounts[0].mount_path, "/data");
    assert!(queue.is_empty().await);

    // reprocessing the same claim does not launch a second job
    queue.add(QueueKey::new("ns", "pvc1")).await;
    assert!(worker.process_next_item().await);
    assert_eq!(launcher.jobs().len(), 1);

    // deleting the claim touches nothing
    let events = reflector.apply(watcher::Event::Delete(claim("pvc1", "ds1")));
    for event in &events {
        queue.add(event.key().expect("Failed to build key")).await;
    }
    assert!(worker.process_next_item().await);
    assert_eq!(launcher.jobs().len(), 1);

    queue.shut_down().await;
    assert!(!worker.process_next_item().await);
}

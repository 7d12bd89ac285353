use std::collections::BTreeMap;

use populator::k8s_openapi::api::batch::v1::{Job, JobSpec};
use populator::k8s_openapi::api::core::v1::{
    Container, EnvFromSource, PersistentVolumeClaimVolumeSource, PodSpec, PodTemplateSpec,
    SecretEnvSource, Volume, VolumeMount,
};
use populator::kube::api::ObjectMeta;
use populator::{APP_LABEL, APP_NAME, PopulatorLabel};

use crate::dispatch::WorkRequest;

/// Completed jobs are removed by the cluster after this many seconds.
pub const TTL_SECONDS_AFTER_FINISHED: i32 = 30;
pub const RESTART_POLICY: &str = "OnFailure";

const CONTAINER_NAME: &str = "populator";
const VOLUME_NAME: &str = "claim";

fn labels() -> BTreeMap<String, String> {
    [(APP_LABEL.to_string(), APP_NAME.to_string())].into()
}

fn annotations(request: &WorkRequest) -> BTreeMap<String, String> {
    [
        (
            PopulatorLabel::new("claim").to_string(),
            request.claim_name.clone(),
        ),
        (
            PopulatorLabel::new("source").to_string(),
            request.source_name.clone(),
        ),
    ]
    .into()
}

pub fn mount_path(mount_point: &str) -> String {
    format!("/{}", mount_point.trim_start_matches('/'))
}

/// Renders the job that populates `request.claim_name`.
pub fn build(request: &WorkRequest) -> Job {
    Job {
        metadata: ObjectMeta {
            name: Some(request.name.clone()),
            namespace: Some(request.namespace.clone()),
            labels: Some(labels()),
            annotations: Some(annotations(request)),
            owner_references: request.owner.clone().map(|owner| vec![owner]),
            ..Default::default()
        },
        spec: Some(JobSpec {
            ttl_seconds_after_finished: Some(TTL_SECONDS_AFTER_FINISHED),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels()),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: CONTAINER_NAME.into(),
                        image: Some(request.image.clone()),
                        args: Some(request.args.clone()),
                        env_from: request.secret.as_ref().map(|secret| {
                            vec![EnvFromSource {
                                secret_ref: Some(SecretEnvSource {
                                    name: secret.clone().into(),
                                    optional: Some(false),
                                }),
                                ..Default::default()
                            }]
                        }),
                        volume_mounts: Some(vec![VolumeMount {
                            name: VOLUME_NAME.into(),
                            mount_path: mount_path(&request.mount_point),
                            read_only: Some(false),
                            ..Default::default()
                        }]),
                        ..Default::default()
                    }],
                    restart_policy: Some(RESTART_POLICY.into()),
                    volumes: Some(vec![Volume {
                        name: VOLUME_NAME.into(),
                        persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                            claim_name: request.claim_name.clone(),
                            read_only: Some(false),
                        }),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::{CustomResource, CustomResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::validation::{git_source_required, mountpoint_relative};

/// Git repository to clone into the claim.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GitSource {
    /// Full URL of the repository (https or git protocol)
    pub repo: String,
    pub branch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct S3Source {
    pub bucket: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

/// A data source used to pre-populate persistent volume claims on creation.
///
/// `type` selects the population strategy and is kept as a free-form string so
/// that unrecognized values are rejected by the controller with an explicit
/// error rather than silently dropped during deserialization.
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, Default)]
#[kube(
    group = "populator.io",
    version = "v1alpha1",
    kind = "Populator",
    shortname = "pop",
    printcolumn = r#"{"name":"Type","type":"string","jsonPath":".spec.type"}"#,
    printcolumn = r#"{"name":"Mountpoint","type":"string","jsonPath":".spec.mountpoint"}"#,
    namespaced,
    validation = git_source_required(),
    validation = mountpoint_relative(),
)]
#[serde(rename_all = "camelCase")]
pub struct PopulatorSpec {
    #[serde(rename = "type")]
    pub type_: String,
    /// Directory, relative to the container root, the claim is mounted at
    pub mountpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<GitSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3: Option<S3Source>,
}

pub fn all_crds() -> Vec<CustomResourceDefinition> {
    vec![Populator::crd()]
}

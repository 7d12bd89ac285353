mod api;
mod client;
mod crd;
mod error;
mod label;
mod meta;
mod validation;

pub use k8s_openapi;
pub use kube;

pub use api::Api;
pub use client::{Client, ClientBuilder, NamespaceScope};
pub use crd::{GitSource, Populator, PopulatorSpec, S3Source, all_crds};
pub use error::{ClientBuildError, Error, Result};
pub use label::{APP_LABEL, APP_NAME, PopulatorLabel};
pub use meta::{ObjectMetaExt, ResourceNameExt, ResourceOwnerRefExt};

pub mod prelude {
    pub use super::{ObjectMetaExt, ResourceNameExt, ResourceOwnerRefExt};
    pub use kube::{Resource, ResourceExt};
}

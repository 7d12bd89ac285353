use crate::{Error, Result};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Resource, api::ObjectMeta};

pub trait ResourceNameExt: Resource {
    fn name(&self) -> Result<&str> {
        self.meta()
            .name
            .as_deref()
            .ok_or(Error::ObjectMetaMissing("name"))
    }

    fn require_namespace(&self) -> Result<&str> {
        self.meta()
            .namespace
            .as_deref()
            .ok_or(Error::ObjectMetaMissing("namespace"))
    }
}

impl<T> ResourceNameExt for T where T: Resource {}

pub trait ResourceOwnerRefExt: Resource<DynamicType = ()> {
    fn static_owner_ref(&self) -> Result<OwnerReference> {
        self.owner_ref(&())
            .ok_or(Error::ObjectMetaMissing("owner_ref"))
    }
}

impl<T> ResourceOwnerRefExt for T where T: Resource<DynamicType = ()> {}

pub trait ObjectMetaExt {
    fn strip_system(&self) -> Self;
}

impl ObjectMetaExt for kube::api::ObjectMeta {
    fn strip_system(&self) -> Self {
        ObjectMeta {
            name: self.name.clone(),
            namespace: self.namespace.clone(),
            generate_name: self.generate_name.clone(),
            annotations: self.annotations.clone(),
            labels: self.labels.clone(),
            finalizers: self.finalizers.clone(),
            owner_references: self.owner_references.clone(),
            ..Default::default()
        }
    }
}

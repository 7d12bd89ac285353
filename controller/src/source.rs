use populator::k8s_openapi::api::core::v1::PersistentVolumeClaim;
use populator::kube::Resource;
use populator::{Client, Populator};

/// A claim's reference to the [`Populator`] that should fill it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceRef<'a> {
    pub namespace: Option<&'a str>,
    pub name: &'a str,
}

fn is_populator(api_group: Option<&str>, kind: &str) -> bool {
    kind == Populator::kind(&()) && api_group.is_none_or(|group| group == Populator::group(&()))
}

/// Reads the populator reference from `dataSourceRef`, falling back to
/// `dataSource`. References to any other kind are not ours to handle.
pub fn data_source_ref(claim: &PersistentVolumeClaim) -> Option<SourceRef<'_>> {
    let spec = claim.spec.as_ref()?;
    if let Some(source) = spec.data_source_ref.as_ref() {
        return is_populator(source.api_group.as_deref(), &source.kind).then_some(SourceRef {
            namespace: source.namespace.as_deref(),
            name: &source.name,
        });
    }
    spec.data_source
        .as_ref()
        .filter(|source| is_populator(source.api_group.as_deref(), &source.kind))
        .map(|source| SourceRef {
            namespace: None,
            name: &source.name,
        })
}

/// Resolves populators by name.
#[async_trait::async_trait]
pub trait SourceLookup: Send + Sync {
    async fn get(&self, namespace: &str, name: &str) -> populator::Result<Option<Populator>>;
}

#[async_trait::async_trait]
impl SourceLookup for Client {
    async fn get(&self, namespace: &str, name: &str) -> populator::Result<Option<Populator>> {
        self.api_namespaced::<Populator>(namespace)
            .get_opt(name)
            .await
    }
}

use std::ops::Deref;

use populator::NamespaceScope;
use populator::k8s_openapi::api::core::v1::PersistentVolumeClaim;

use crate::Config;

#[derive(Clone)]
pub struct Context {
    pub client: populator::Client,
    pub config: Config,
}

impl Deref for Context {
    type Target = populator::Client;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

impl Context {
    pub fn new(client: populator::Client, config: Config) -> Self {
        Self { client, config }
    }

    /// Claim API scoped to the configured namespace.
    pub fn claims(&self) -> populator::kube::Api<PersistentVolumeClaim> {
        self.client
            .api_in::<PersistentVolumeClaim>(&self.config.scope())
            .kube()
            .clone()
    }

    /// Namespace label for logs.
    pub fn scope(&self) -> String {
        match self.config.scope() {
            NamespaceScope::Default => self.client.default_namespace().to_string(),
            NamespaceScope::Named(namespace) => namespace,
            NamespaceScope::All => "all".to_string(),
        }
    }
}

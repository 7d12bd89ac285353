use hyper_util::{client::legacy::Client as HttpClient, rt::TokioExecutor};
use k8s_openapi::NamespaceResourceScope;
use kube::Resource;
use kube::client::ConfigExt as _;
use tower::ServiceBuilder;
use tower_http::{BoxError, trace::TraceLayer};

use crate::{Api, ClientBuildError, Result};

const DEFAULT_MANAGER: &str = "populator";

/// Which namespaces a namespaced [`Api`] reaches.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum NamespaceScope {
    /// The client's default namespace.
    #[default]
    Default,
    Named(String),
    All,
}

impl NamespaceScope {
    /// `*` selects every namespace; a missing or empty value the default one.
    pub fn parse(namespace: Option<&str>) -> Self {
        match namespace.map(str::trim) {
            None | Some("") => Self::Default,
            Some("*") => Self::All,
            Some(namespace) => Self::Named(namespace.to_string()),
        }
    }
}

/// Kubernetes client that tags every write with a field manager name.
#[derive(Clone)]
pub struct Client {
    manager: String,
    kube: kube::Client,
}

#[derive(Default)]
pub struct ClientBuilder {
    manager: Option<String>,
    namespace: Option<String>,
    config: Option<kube::Config>,
}

impl ClientBuilder {
    /// Field manager recorded on objects this client creates.
    pub fn name(&mut self, manager: impl ToString) -> &mut Self {
        self.manager = Some(manager.to_string());
        self
    }

    /// Overrides the namespace inferred from the kube config.
    pub fn namespace(&mut self, namespace: impl ToString) -> &mut Self {
        self.namespace = Some(namespace.to_string());
        self
    }

    pub fn config(&mut self, config: kube::Config) -> &mut Self {
        self.config = Some(config);
        self
    }

    pub async fn build(&mut self) -> Result<Client, ClientBuildError> {
        let config = match self.config.take() {
            Some(config) => config,
            None => kube::Config::infer().await?,
        };
        let service = ServiceBuilder::new()
            .layer(config.base_uri_layer())
            .option_layer(config.auth_layer()?)
            .layer(TraceLayer::new_for_http())
            .map_err(BoxError::from)
            .service(
                HttpClient::builder(TokioExecutor::new()).build(config.rustls_https_connector()?),
            );
        let namespace = self
            .namespace
            .take()
            .unwrap_or_else(|| config.default_namespace.clone());
        Ok(Client {
            manager: self
                .manager
                .take()
                .unwrap_or_else(|| DEFAULT_MANAGER.to_string()),
            kube: kube::Client::new(service, namespace),
        })
    }
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    #[inline]
    pub fn default_namespace(&self) -> &str {
        self.kube.default_namespace()
    }

    #[inline]
    pub fn api_namespaced<T>(&self, namespace: &str) -> Api<T>
    where
        T: Resource<Scope = NamespaceResourceScope>,
        <T as Resource>::DynamicType: Default,
    {
        Api::new(
            self.manager.clone(),
            kube::Api::namespaced(self.kube.clone(), namespace),
        )
    }

    pub fn api_in<T>(&self, scope: &NamespaceScope) -> Api<T>
    where
        T: Resource<Scope = NamespaceResourceScope>,
        <T as Resource>::DynamicType: Default,
    {
        let inner = match scope {
            NamespaceScope::Default => kube::Api::default_namespaced(self.kube.clone()),
            NamespaceScope::Named(namespace) => kube::Api::namespaced(self.kube.clone(), namespace),
            NamespaceScope::All => kube::Api::all(self.kube.clone()),
        };
        Api::new(self.manager.clone(), inner)
    }
}

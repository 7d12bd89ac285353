use std::fmt::Debug;

use kube::{Resource, api::PostParams};
use serde::{Serialize, de::DeserializeOwned};

use crate::{ObjectMetaExt, Result};

/// Typed API handle that writes under the client's field manager.
pub struct Api<T> {
    manager: String,
    inner: kube::api::Api<T>,
}

impl<T> Api<T> {
    pub fn new(manager: String, inner: kube::api::Api<T>) -> Self {
        Self { manager, inner }
    }
}

impl<T> Api<T>
where
    T: Resource + Serialize + DeserializeOwned + Clone + Debug + Send + 'static,
{
    #[inline]
    pub fn kube(&self) -> &kube::Api<T> {
        &self.inner
    }

    #[inline]
    pub fn post_params(&self) -> PostParams {
        PostParams {
            field_manager: Some(self.manager.clone()),
            ..Default::default()
        }
    }

    /// Creates `resource`, dropping server-populated metadata first.
    #[tracing::instrument(level = "debug", skip(self), ret, err)]
    pub async fn create(&self, resource: &T) -> Result<T> {
        let mut resource = resource.clone();
        *resource.meta_mut() = resource.meta().strip_system();
        Ok(self.inner.create(&self.post_params(), &resource).await?)
    }

    #[tracing::instrument(level = "debug", skip(self), ret, err)]
    pub async fn get_opt(&self, name: &str) -> Result<Option<T>> {
        Ok(self.inner.get_opt(name).await?)
    }
}

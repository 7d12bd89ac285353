use populator::k8s_openapi::api::core::v1::PersistentVolumeClaim;

use crate::key::QueueKey;

/// What a reconciliation did with a claim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The claim does not reference a populator.
    NoDataSource,
    /// The referenced populator does not exist and the claim is left empty.
    SourceMissing { source: String },
    Dispatched { job: String },
    /// A job with the derived name was already submitted.
    AlreadyDispatched { job: String },
    Deleted,
}

pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

#[async_trait::async_trait]
pub trait Reconciler: Send + Sync {
    type Error: std::error::Error + Retryable + Send + Sync + 'static;

    async fn apply(&self, claim: &PersistentVolumeClaim) -> Result<Outcome, Self::Error>;

    async fn cleanup(&self, key: &QueueKey) -> Result<Outcome, Self::Error> {
        tracing::debug!(%key, "Nothing to clean up");
        Ok(Outcome::Deleted)
    }
}

#[async_trait::async_trait]
impl<R: Reconciler + ?Sized> Reconciler for std::sync::Arc<R> {
    type Error = R::Error;

    async fn apply(&self, claim: &PersistentVolumeClaim) -> Result<Outcome, Self::Error> {
        (**self).apply(claim).await
    }

    async fn cleanup(&self, key: &QueueKey) -> Result<Outcome, Self::Error> {
        (**self).cleanup(key).await
    }
}

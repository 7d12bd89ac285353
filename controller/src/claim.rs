use populator::k8s_openapi::api::core::v1::PersistentVolumeClaim;
use populator::prelude::*;
use thiserror::Error;

use crate::config::MissingSourcePolicy;
use crate::dispatch::{DispatchError, Dispatcher};
use crate::job;
use crate::launcher::{JobLauncher, LaunchError};
use crate::reconciler::{Outcome, Reconciler, Retryable};
use crate::source::{SourceLookup, data_source_ref};

#[derive(Debug, Error)]
pub enum ClaimError {
    #[error("Populator {namespace}/{name} not found")]
    SourceNotFound { namespace: String, name: String },
    #[error("Failed to fetch populator {namespace}/{name}: {source}")]
    SourceLookup {
        namespace: String,
        name: String,
        #[source]
        source: populator::Error,
    },
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Launch(#[from] LaunchError),
    #[error(transparent)]
    Meta(#[from] populator::Error),
}

impl Retryable for ClaimError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::SourceNotFound { .. } | Self::SourceLookup { .. } => true,
            Self::Launch(err) => err.is_retryable(),
            Self::Dispatch(_) | Self::Meta(_) => false,
        }
    }
}

/// Populates claims that reference a [`populator::Populator`].
pub struct ClaimReconciler<S, L> {
    sources: S,
    launcher: L,
    dispatcher: Dispatcher,
    missing_source: MissingSourcePolicy,
}

impl<S, L> ClaimReconciler<S, L> {
    pub fn new(sources: S, launcher: L, dispatcher: Dispatcher) -> Self {
        Self {
            sources,
            launcher,
            dispatcher,
            missing_source: MissingSourcePolicy::default(),
        }
    }

    pub fn missing_source(mut self, policy: MissingSourcePolicy) -> Self {
        self.missing_source = policy;
        self
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }
}

#[async_trait::async_trait]
impl<S, L> Reconciler for ClaimReconciler<S, L>
where
    S: SourceLookup,
    L: JobLauncher,
{
    type Error = ClaimError;

    async fn apply(&self, claim: &PersistentVolumeClaim) -> Result<Outcome, ClaimError> {
        let claim_name = claim.name()?;
        let Some(source_ref) = data_source_ref(claim) else {
            tracing::debug!("No data source for claim {claim_name}, moving along");
            return Ok(Outcome::NoDataSource);
        };
        let namespace = match source_ref.namespace {
            Some(namespace) => namespace,
            None => claim.require_namespace()?,
        };
        let populator = match self.sources.get(namespace, source_ref.name).await {
            Ok(Some(populator)) => populator,
            Ok(None) => match self.missing_source {
                MissingSourcePolicy::Skip => {
                    tracing::warn!(
                        "Populator {namespace}/{} not found, claim {claim_name} will not be populated",
                        source_ref.name
                    );
                    return Ok(Outcome::SourceMissing {
                        source: source_ref.name.to_string(),
                    });
                }
                MissingSourcePolicy::Retry => {
                    return Err(ClaimError::SourceNotFound {
                        namespace: namespace.to_string(),
                        name: source_ref.name.to_string(),
                    });
                }
            },
            Err(err) => {
                return Err(ClaimError::SourceLookup {
                    namespace: namespace.to_string(),
                    name: source_ref.name.to_string(),
                    source: err,
                });
            }
        };

        let request = self.dispatcher.dispatch(claim, &populator)?;
        let job = job::build(&request);
        match self.launcher.launch(&job, &request.namespace).await {
            Ok(_) => {
                tracing::info!(
                    "Launched populator job {} for claim {claim_name}",
                    request.name
                );
                Ok(Outcome::Dispatched { job: request.name })
            }
            Err(LaunchError::AlreadyExists(job)) => {
                tracing::debug!("Populator job {job} already exists for claim {claim_name}");
                Ok(Outcome::AlreadyDispatched { job })
            }
            Err(err) => Err(err.into()),
        }
    }
}

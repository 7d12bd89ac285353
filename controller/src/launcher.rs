use populator::Client;
use populator::k8s_openapi::api::batch::v1::Job;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Job {0} already exists")]
    AlreadyExists(String),
    #[error("Failed to launch job {name}: {source}")]
    Api {
        name: String,
        #[source]
        source: populator::Error,
    },
}

impl LaunchError {
    /// Malformed jobs are rejected the same way every time; everything else
    /// (quota, connectivity, server errors) may clear up.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::AlreadyExists(_) => false,
            Self::Api { source, .. } => !matches!(source.status_code(), Some(400 | 422)),
        }
    }
}

/// Submits population jobs to the cluster.
#[async_trait::async_trait]
pub trait JobLauncher: Send + Sync {
    async fn launch(&self, job: &Job, namespace: &str) -> Result<Job, LaunchError>;
}

#[async_trait::async_trait]
impl JobLauncher for Client {
    async fn launch(&self, job: &Job, namespace: &str) -> Result<Job, LaunchError> {
        let name = job.metadata.name.clone().unwrap_or_default();
        match self.api_namespaced::<Job>(namespace).create(job).await {
            Ok(job) => Ok(job),
            Err(err) if err.is_conflict() => Err(LaunchError::AlreadyExists(name)),
            Err(err) => {
                tracing::error!("Error launching job {namespace}/{name}: {err}");
                Err(LaunchError::Api { name, source: err })
            }
        }
    }
}

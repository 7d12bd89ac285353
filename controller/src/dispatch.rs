use populator::k8s_openapi::api::core::v1::PersistentVolumeClaim;
use populator::k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use populator::{Populator, prelude::*};
use strum::{Display, EnumString};
use thiserror::Error;

/// Image used for git populator jobs; its entrypoint clones
/// `<repo> <branch> <mountpoint>`.
pub const GIT_POPULATOR_IMAGE: &str = "jgriffith/git-populator";

macro_rules! args {
    ($($part:expr),*$(,)?) => {
        vec![$($part.to_string()),*]
    }
}

/// Population strategies a [`Populator`] `type` can select.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Strategy {
    Git,
    S3,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Unknown populator type {0:?}")]
    UnknownType(String),
    #[error("Populator type {0} is not supported yet")]
    UnsupportedType(Strategy),
    #[error("Populator {populator} of type {strategy} has no {strategy} parameters")]
    MissingParameters {
        populator: String,
        strategy: Strategy,
    },
    #[error(transparent)]
    Meta(#[from] populator::Error),
}

/// Everything needed to build a population job for one claim.
#[derive(Clone, Debug, PartialEq)]
pub struct WorkRequest {
    pub name: String,
    pub namespace: String,
    pub image: String,
    pub args: Vec<String>,
    pub mount_point: String,
    pub claim_name: String,
    pub source_name: String,
    pub secret: Option<String>,
    pub owner: Option<OwnerReference>,
}

pub fn job_name(source_name: &str, claim_name: &str) -> String {
    format!("{source_name}-pvc-{claim_name}")
}

#[derive(Clone, Debug)]
pub struct Dispatcher {
    git_image: String,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(GIT_POPULATOR_IMAGE)
    }
}

impl Dispatcher {
    pub fn new(git_image: impl ToString) -> Self {
        Self {
            git_image: git_image.to_string(),
        }
    }

    pub fn strategy(populator: &Populator) -> Result<Strategy, DispatchError> {
        populator
            .spec
            .type_
            .parse()
            .map_err(|_| DispatchError::UnknownType(populator.spec.type_.clone()))
    }

    pub fn dispatch(
        &self,
        claim: &PersistentVolumeClaim,
        populator: &Populator,
    ) -> Result<WorkRequest, DispatchError> {
        let strategy = Self::strategy(populator)?;
        let source_name = populator.name()?;
        let claim_name = claim.name()?;
        let spec = &populator.spec;
        let (image, args) = match strategy {
            Strategy::Git => {
                let git = spec
                    .git
                    .as_ref()
                    .ok_or_else(|| DispatchError::MissingParameters {
                        populator: source_name.to_string(),
                        strategy,
                    })?;
                tracing::debug!(?git, "Dispatching git populator");
                (
                    self.git_image.clone(),
                    args![git.repo, git.branch, spec.mountpoint],
                )
            }
            Strategy::S3 => return Err(DispatchError::UnsupportedType(strategy)),
        };
        Ok(WorkRequest {
            name: job_name(source_name, claim_name),
            namespace: claim.require_namespace()?.to_string(),
            image,
            args,
            mount_point: spec.mountpoint.clone(),
            claim_name: claim_name.to_string(),
            source_name: source_name.to_string(),
            secret: spec.secret_ref.clone(),
            owner: claim.static_owner_ref().ok(),
        })
    }
}

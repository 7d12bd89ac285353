use populator::NamespaceScope;
use serde::{Deserialize, Serialize};

use crate::dispatch::GIT_POPULATOR_IMAGE;

fn default_manager_name() -> String {
    "populator-controller".to_string()
}

fn default_git_image() -> String {
    GIT_POPULATOR_IMAGE.to_string()
}

fn default_workers() -> usize {
    1
}

fn default_max_attempts() -> u32 {
    5
}

/// What to do with a claim whose populator does not exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingSourcePolicy {
    /// Log and leave the claim unpopulated.
    #[default]
    Skip,
    /// Retry with backoff, up to `max_attempts`.
    Retry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Namespace to watch claims in; `*` watches every namespace.
    pub namespace: Option<String>,
    #[serde(default = "default_manager_name")]
    pub name: String,
    #[serde(default = "default_git_image")]
    pub git_image: String,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub missing_source: MissingSourcePolicy,
}

impl Config {
    pub fn load() -> Result<Config, config::ConfigError> {
        Self::load_from(config::Environment::with_prefix("POPULATOR"))
    }

    pub fn load_from(environment: config::Environment) -> Result<Config, config::ConfigError> {
        config::Config::builder()
            .add_source(environment.try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn scope(&self) -> NamespaceScope {
        NamespaceScope::parse(self.namespace.as_deref())
    }
}

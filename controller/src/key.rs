use std::fmt;
use std::str::FromStr;

use populator::kube::Resource;
use populator::kube::runtime::reflector::ObjectRef;
use populator::prelude::*;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid queue key {0:?}, expected namespace/name")]
pub struct KeyError(String);

/// Stable identifier of a watched object, rendered as `namespace/name`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueueKey {
    namespace: Option<String>,
    name: String,
}

impl QueueKey {
    pub fn new(namespace: impl ToString, name: impl ToString) -> Self {
        Self {
            namespace: Some(namespace.to_string()),
            name: name.to_string(),
        }
    }

    pub fn cluster(name: impl ToString) -> Self {
        Self {
            namespace: None,
            name: name.to_string(),
        }
    }

    pub fn from_resource<K: Resource>(resource: &K) -> populator::Result<Self> {
        Ok(Self {
            namespace: resource.meta().namespace.clone(),
            name: resource.name()?.to_string(),
        })
    }

    #[inline]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn object_ref<K>(&self) -> ObjectRef<K>
    where
        K: Resource,
        K::DynamicType: Default,
    {
        let object_ref = ObjectRef::new(&self.name);
        match self.namespace.as_deref() {
            Some(namespace) => object_ref.within(namespace),
            None => object_ref,
        }
    }
}

impl fmt::Display for QueueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.namespace.as_deref() {
            Some(namespace) => write!(f, "{namespace}/{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

impl FromStr for QueueKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (namespace, name) = match s.split_once('/') {
            Some((namespace, name)) => (Some(namespace), name),
            None => (None, s),
        };
        if name.is_empty() || name.contains('/') || namespace.is_some_and(str::is_empty) {
            return Err(KeyError(s.to_string()));
        }
        Ok(Self {
            namespace: namespace.map(str::to_string),
            name: name.to_string(),
        })
    }
}

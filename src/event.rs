/**
 * View models broadcast to subscribers.
 *
 * Every field is rendered as a UTF-8 string on the wire; the JSON names are
 * camelCase (`replicasCurrent`, `envVars`, ...).
 */
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a watched deployment
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResourceRef {
    pub name: String,
    pub namespace: String,
}

impl ResourceRef {
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerView {
    pub name: String,
    pub image: String,
    /// `KEY:VALUE`, or `KEY:********` when the declared value is empty
    pub env_vars: Vec<String>,
}

/// Sanitized snapshot of one deployment, produced fresh for every update
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub name: String,
    pub namespace: String,
    pub containers: Vec<ContainerView>,
    pub replicas_current: String,
    pub replicas_desired: String,
    pub age: String,
}

impl ChangeEvent {
    #[must_use]
    pub fn resource_ref(&self) -> ResourceRef {
        ResourceRef::new(self.namespace.clone(), self.name.clone())
    }

    /// # Errors
    ///
    /// Will return `Err` if the event cannot be serialized
    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(k8s_openapi::serde_json::to_string(self)?)
    }
}

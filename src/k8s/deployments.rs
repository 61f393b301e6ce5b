/**
 * Point-in-time deployment queries
 *
 * These sit beside the broadcast pipeline: one-shot reads against the API
 * server with the client passed in explicitly.
 */
use crate::config::AgeSource;
use crate::error::{Error, Result};
use crate::event::{ChangeEvent, ResourceRef};
use crate::k8s::store::ResourceStore;
use crate::k8s::utils::pod_selector;
use crate::transform::transform;
use chrono::Utc;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, ListParams, LogParams};
use kube::{Client, ResourceExt};
use serde::{Deserialize, Serialize};
use tracing::debug;

const RUNNING_ONLY: &str = "status.phase=Running";

/// Deployment names of one namespace, as `{"ID": [...]}`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentNames {
    #[serde(rename = "ID")]
    pub id: Vec<String>,
}

/// # Errors
///
/// Will return `Error::NotFound` if the deployment does not exist, or `Err`
/// if data can not be retrieved from the store
pub async fn get_event(
    store: &dyn ResourceStore,
    resource: &ResourceRef,
    age_source: AgeSource,
) -> Result<ChangeEvent> {
    let deployment = store
        .get(resource)
        .await?
        .ok_or_else(|| Error::NotFound(resource.clone()))?;
    Ok(transform(&deployment, Utc::now(), age_source))
}

/// # Errors
///
/// Will return `Err` if data can not be retrieved from k8s cluster api
pub async fn list_names(client: Client, namespace: &str) -> Result<DeploymentNames> {
    let api: Api<Deployment> = Api::namespaced(client, namespace);
    let list = api.list(&ListParams::default()).await?;

    Ok(DeploymentNames {
        id: list.items.iter().map(ResourceExt::name_any).collect(),
    })
}

/// Running pods selected by the deployment's `matchLabels`. A deployment
/// without match labels selects nothing.
///
/// # Errors
///
/// Will return `Error::NotFound` if the deployment does not exist, or `Err`
/// if data can not be retrieved from k8s cluster api
pub async fn running_pods(client: Client, resource: &ResourceRef) -> Result<Vec<Pod>> {
    let deployments: Api<Deployment> = Api::namespaced(client.clone(), &resource.namespace);
    let deployment = deployments
        .get_opt(&resource.name)
        .await?
        .ok_or_else(|| Error::NotFound(resource.clone()))?;

    let Some(label_selector) = pod_selector(&deployment) else {
        return Ok(Vec::new());
    };
    debug!("labelSelector for {}: {}", resource, label_selector);

    let lp = ListParams::default()
        .labels(&label_selector)
        .fields(RUNNING_ONLY);
    let pods: Api<Pod> = Api::namespaced(client, &resource.namespace);

    Ok(pods.list(&lp).await?.items)
}

/// Last `lines` log lines of the first running pod of the deployment
///
/// # Errors
///
/// Will return `Error::NotFound` if the deployment does not exist or has no
/// running pod, or `Err` if the logs can not be retrieved
pub async fn tail_logs(client: Client, resource: &ResourceRef, lines: i64) -> Result<String> {
    let pods = running_pods(client.clone(), resource).await?;
    let pod_name = pods
        .first()
        .map(ResourceExt::name_any)
        .ok_or_else(|| Error::NotFound(resource.clone()))?;

    let api: Api<Pod> = Api::namespaced(client, &resource.namespace);
    let lp = LogParams {
        tail_lines: Some(lines),
        ..LogParams::default()
    };

    Ok(api.logs(&pod_name, &lp).await?)
}

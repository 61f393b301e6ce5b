#![allow(dead_code)]

use async_trait::async_trait;
use deploycast::error::Result;
use deploycast::event::ResourceRef;
use deploycast::k8s::store::{Notification, NotificationStream, ResourceStore};
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::serde_json::{self, json};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// In-memory store whose watch stream is fed by the returned sender
pub struct FakeStore {
    deployments: Mutex<HashMap<ResourceRef, Deployment>>,
    stream: Mutex<Option<mpsc::Receiver<Result<Notification>>>>,
}

impl FakeStore {
    pub fn new() -> (Self, mpsc::Sender<Result<Notification>>) {
        let (tx, rx) = mpsc::channel(32);
        let store = Self {
            deployments: Mutex::new(HashMap::new()),
            stream: Mutex::new(Some(rx)),
        };
        (store, tx)
    }

    pub fn insert(&self, deployment: Deployment) {
        let key = ResourceRef::new(
            deployment.metadata.namespace.clone().unwrap_or_default(),
            deployment.metadata.name.clone().unwrap_or_default(),
        );
        self.deployments.lock().unwrap().insert(key, deployment);
    }
}

#[async_trait]
impl ResourceStore for FakeStore {
    async fn get(&self, resource: &ResourceRef) -> Result<Option<Deployment>> {
        Ok(self.deployments.lock().unwrap().get(resource).cloned())
    }

    fn watch(&self) -> NotificationStream {
        match self.stream.lock().unwrap().take() {
            Some(rx) => ReceiverStream::new(rx).boxed(),
            None => futures::stream::empty().boxed(),
        }
    }
}

pub fn deployment(namespace: &str, name: &str, available: i32, desired: i32) -> Deployment {
    serde_json::from_value(json!({
        "metadata": {
            "name": name,
            "namespace": namespace,
            "creationTimestamp": "2024-03-01T10:00:00Z"
        },
        "spec": {
            "replicas": desired,
            "selector": {"matchLabels": {"app": name}},
            "template": {
                "spec": {
                    "containers": [
                        {
                            "name": "app",
                            "image": "app:1.2",
                            "env": [
                                {"name": "MODE", "value": "prod"},
                                {"name": "SECRET", "value": ""}
                            ]
                        },
                        {"name": "sidecar", "image": "proxy:0.9"}
                    ]
                }
            }
        },
        "status": {"replicas": desired, "availableReplicas": available}
    }))
    .unwrap()
}

/**
 * Watch controller
 *
 * Owns the single watch session for deployments and forwards every update,
 * transformed into a `ChangeEvent`, to the hub. Added and deleted
 * notifications are discarded here: only changes to existing workloads are
 * surfaced. Resync updates are handled exactly like genuine ones.
 */
use crate::config::{AgeSource, BroadcastConfig};
use crate::hub::{Hub, PublishReport};
use crate::k8s::store::{Notification, ResourceStore};
use crate::transform::transform;
use chrono::Utc;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use kube::ResourceExt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

pub struct WatchController {
    hub: Arc<Hub>,
    age_source: AgeSource,
}

impl WatchController {
    #[must_use]
    pub fn new(hub: Arc<Hub>, config: &BroadcastConfig) -> Self {
        Self {
            hub,
            age_source: config.age_source,
        }
    }

    /// The only entry point for store notifications. Returns the fan-out
    /// report when an event was published.
    pub async fn on_notification(&self, notification: Notification) -> Option<PublishReport> {
        match notification {
            Notification::Updated(deployment) => self.on_update(&deployment).await,
            Notification::Added(deployment) | Notification::Deleted(deployment) => {
                trace!(deployment = %deployment.name_any(), "Ignoring lifecycle notification");
                None
            }
        }
    }

    async fn on_update(&self, deployment: &Deployment) -> Option<PublishReport> {
        let event = transform(deployment, Utc::now(), self.age_source);
        debug!(resource = %event.resource_ref(), "Deployment changed");

        match self.hub.publish(event).await {
            Ok(report) => Some(report),
            Err(e) => {
                warn!("Dropping change event: {}", e);
                None
            }
        }
    }

    /// Consume the store's notification stream until `shutdown` fires, then
    /// close every subscriber.
    ///
    /// Interrupted sessions are logged and left to the store to re-establish.
    /// If the stream ends for good, the controller idles until shutdown so
    /// connected subscribers stay open.
    pub async fn run(self, store: Arc<dyn ResourceStore>, shutdown: CancellationToken) {
        info!("📡 Watch controller started");
        let mut notifications = store.watch();

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                next = notifications.next() => match next {
                    Some(Ok(notification)) => {
                        self.on_notification(notification).await;
                    }
                    Some(Err(e)) => {
                        warn!("Watch session interrupted, waiting for the store to resume: {}", e);
                    }
                    None => {
                        warn!("Store notification stream ended");
                        shutdown.cancelled().await;
                        break;
                    }
                },
            }
        }

        info!("📡 Watch controller shutting down");
        self.hub.shutdown().await;
    }

    /// Run the controller on its own task
    #[must_use]
    pub fn spawn(self, store: Arc<dyn ResourceStore>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(store, shutdown))
    }
}

/**
 * Resource store: point-in-time lookups and the deployment notification stream
 *
 * `KubeStore` runs a namespace-scoped (or cluster-wide) watch session that
 * restarts itself with exponential backoff whenever the API server drops it,
 * and periodically re-delivers the current state of every deployment as
 * synthetic updates.
 */
use crate::config::{
    INITIAL_BACKOFF_SECONDS, MAX_BACKOFF_SECONDS, NOTIFICATION_CHANNEL_CAPACITY,
    RESTART_DELAY_SECONDS, WATCH_TIMEOUT_SECONDS,
};
use crate::error::{Error, Result};
use crate::event::ResourceRef;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use kube::api::{Api, ListParams, WatchEvent, WatchParams};
use kube::{Client, ResourceExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, MissedTickBehavior};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

/// One raw change notification
#[derive(Debug, Clone)]
pub enum Notification {
    Added(Deployment),
    Updated(Deployment),
    Deleted(Deployment),
}

/// Notifications in arrival order; `Err` items mark an interrupted session
pub type NotificationStream = BoxStream<'static, Result<Notification>>;

#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Current state of one deployment, `None` if it does not exist
    async fn get(&self, resource: &ResourceRef) -> Result<Option<Deployment>>;

    /// Open a watch session. Only changes observed after the call are
    /// reported as updates.
    fn watch(&self) -> NotificationStream;
}

pub struct KubeStore {
    client: Client,
    namespace: Option<String>,
    resync_period: Option<Duration>,
}

impl KubeStore {
    /// `namespace: None` watches every namespace
    #[must_use]
    pub const fn new(
        client: Client,
        namespace: Option<String>,
        resync_period: Option<Duration>,
    ) -> Self {
        Self {
            client,
            namespace,
            resync_period,
        }
    }

    fn api(&self) -> Api<Deployment> {
        match &self.namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }

    async fn run_watch(api: Api<Deployment>, tx: mpsc::Sender<Result<Notification>>) {
        info!("🔍 Starting Deployment watcher");

        let mut backoff_seconds = INITIAL_BACKOFF_SECONDS;
        loop {
            match Self::watch_session(&api, &tx).await {
                Ok(true) => {
                    debug!("🔍 Deployment watch session ended normally, restarting...");
                    backoff_seconds = INITIAL_BACKOFF_SECONDS;
                }
                Ok(false) => break,
                Err(e) => {
                    warn!(
                        "❌ Deployment watch session failed: {}, restarting in {}s",
                        e, backoff_seconds
                    );
                    if tx.send(Err(e)).await.is_err() {
                        break;
                    }
                    sleep(Duration::from_secs(backoff_seconds)).await;
                    backoff_seconds = (backoff_seconds * 2).min(MAX_BACKOFF_SECONDS);
                }
            }

            sleep(Duration::from_secs(RESTART_DELAY_SECONDS)).await;
        }

        info!("🔍 Deployment watcher stopped, no one is listening");
    }

    /// Returns `Ok(false)` once the receiving side has gone away
    async fn watch_session(
        api: &Api<Deployment>,
        tx: &mpsc::Sender<Result<Notification>>,
    ) -> Result<bool> {
        use futures::{pin_mut, TryStreamExt};

        let wp = WatchParams::default().timeout(WATCH_TIMEOUT_SECONDS);

        let stream = api.watch(&wp, "0").await?;
        pin_mut!(stream);

        while let Some(event) = stream.try_next().await? {
            let Some(notification) = to_notification(event)? else {
                continue;
            };
            if tx.send(Ok(notification)).await.is_err() {
                return Ok(false);
            }
        }

        Ok(true)
    }

    async fn run_resync(
        api: Api<Deployment>,
        period: Duration,
        tx: mpsc::Sender<Result<Notification>>,
    ) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; skipping it keeps the session
        // start free of replayed state.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                () = tx.closed() => break,
            }

            match api.list(&ListParams::default()).await {
                Ok(list) => {
                    debug!("🔄 Resync: re-delivering {} deployments", list.items.len());
                    for deployment in list.items {
                        if tx.send(Ok(Notification::Updated(deployment))).await.is_err() {
                            return;
                        }
                    }
                }
                Err(e) => {
                    if tx.send(Err(e.into())).await.is_err() {
                        return;
                    }
                }
            }
        }
    }
}

/// Map one raw watch event: `Modified` becomes `Updated`, bookmarks carry no
/// state and yield `None`, and a server-side error ends the session.
fn to_notification(event: WatchEvent<Deployment>) -> Result<Option<Notification>> {
    match event {
        WatchEvent::Added(d) => Ok(Some(Notification::Added(d))),
        WatchEvent::Modified(d) => {
            debug!("📝 Deployment modified: {}/{}", d.namespace().unwrap_or_default(), d.name_any());
            Ok(Some(Notification::Updated(d)))
        }
        WatchEvent::Deleted(d) => Ok(Some(Notification::Deleted(d))),
        WatchEvent::Bookmark(_) => Ok(None),
        WatchEvent::Error(e) => Err(Error::Custom(format!("watch session rejected: {e:?}"))),
    }
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn get(&self, resource: &ResourceRef) -> Result<Option<Deployment>> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), &resource.namespace);
        Ok(api.get_opt(&resource.name).await?)
    }

    fn watch(&self) -> NotificationStream {
        let (tx, rx) = mpsc::channel(NOTIFICATION_CHANNEL_CAPACITY);

        tokio::spawn(Self::run_watch(self.api(), tx.clone()));
        if let Some(period) = self.resync_period {
            tokio::spawn(Self::run_resync(self.api(), period, tx));
        }

        ReceiverStream::new(rx).boxed()
    }
}

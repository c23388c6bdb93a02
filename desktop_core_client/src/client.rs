use crate::cache::{Snapshot, StateCache};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::subscriber::{
    StopReason, SubscriberHandle, SubscriberState, Synchronizer, WallpaperChanged,
};
use crate::transport::{LocalTransport, Transport};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};

/// Client side of the desktop core channel.
///
/// Holds the cache of active wallpapers, the background subscriber that keeps
/// it current, and the command surface (see `commands.rs`). A value of this
/// type only exists once the initial wallpaper state has been loaded.
pub struct DesktopCoreClient<T: Transport = LocalTransport> {
    pub(crate) transport: Arc<T>,
    cache: Arc<StateCache>,
    events: broadcast::Sender<WallpaperChanged>,
    subscriber: SubscriberHandle,
    shutdown_grace: Duration,
}

impl DesktopCoreClient<LocalTransport> {
    pub async fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
        let transport = LocalTransport::new(config.address.clone());
        Self::with_transport(transport, config).await
    }
}

impl<T: Transport> DesktopCoreClient<T> {
    pub async fn with_transport(transport: T, config: &ClientConfig) -> Result<Self, ClientError> {
        let transport = Arc::new(transport);
        let cache = Arc::new(StateCache::new());
        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        let subscriber = SubscriberHandle::start(Synchronizer {
            transport: Arc::clone(&transport),
            cache: Arc::clone(&cache),
            events: events.clone(),
        })
        .await?;

        Ok(Self {
            transport,
            cache,
            events,
            subscriber,
            shutdown_grace: config.shutdown_grace,
        })
    }

    /// Current active wallpapers.
    pub fn wallpapers(&self) -> Snapshot {
        self.cache.snapshot()
    }

    /// Shared handle for subsystems that only read the cache.
    pub fn state_cache(&self) -> Arc<StateCache> {
        Arc::clone(&self.cache)
    }

    /// Change notifications raised after each refresh. Earlier events are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<WallpaperChanged> {
        self.events.subscribe()
    }

    pub fn subscriber_state(&self) -> SubscriberState {
        self.subscriber.state()
    }

    pub fn watch_subscriber(&self) -> watch::Receiver<SubscriberState> {
        self.subscriber.watch()
    }

    /// Resolves once the change subscriber has stopped for any reason. After
    /// that no further change events are raised.
    pub async fn stopped(&self) -> StopReason {
        self.subscriber.stopped().await
    }

    /// Stops the change subscriber, waiting at most the configured grace
    /// period. Returns whether it exited within that period.
    pub async fn close(mut self) -> bool {
        self.subscriber.stop(self.shutdown_grace).await
    }
}

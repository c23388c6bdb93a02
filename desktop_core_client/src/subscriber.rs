//! Background task that keeps the [`StateCache`] in step with the worker.
//!
//! Every item on the worker's change stream triggers a full re-fetch which is
//! swapped into the cache under the refresh guard; listeners are told after
//! the swap. The loop ends on cancellation, on a stream failure, or when the
//! worker closes the stream. It never reconnects.

use crate::cache::StateCache;
use crate::error::{ClientError, TransportError};
use crate::transport::{ReplyStream, Transport};
use crate::translate::wallpapers_from_wire;
use desktop_protocol::{ClientRequest, ServerMessage, WallpaperEntry};
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Raised after each successful refresh. Carries no data: read a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WallpaperChanged;

#[derive(Debug, Clone)]
pub enum StopReason {
    Cancelled,
    /// The worker ended the change stream.
    StreamClosed,
    Transport(Arc<TransportError>),
}

#[derive(Debug, Clone)]
pub enum SubscriberState {
    Idle,
    Streaming,
    Refreshing,
    Stopped(StopReason),
}

impl SubscriberState {
    pub fn is_stopped(&self) -> bool {
        matches!(self, SubscriberState::Stopped(_))
    }
}

pub(crate) enum RefreshOutcome {
    Replaced(usize),
    Cancelled,
}

/// Everything a refresh touches.
pub(crate) struct Synchronizer<T: ?Sized> {
    pub(crate) transport: Arc<T>,
    pub(crate) cache: Arc<StateCache>,
    pub(crate) events: broadcast::Sender<WallpaperChanged>,
}

impl<T: Transport + ?Sized> Synchronizer<T> {
    pub(crate) async fn refresh(
        &self,
        cancel: &CancellationToken,
    ) -> Result<RefreshOutcome, ClientError> {
        let guard = self.cache.begin_refresh().await;

        let entries = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(RefreshOutcome::Cancelled),
            fetched = fetch_wallpapers(self.transport.as_ref()) => fetched?,
        };
        let records = wallpapers_from_wire(entries)?;

        if cancel.is_cancelled() {
            return Ok(RefreshOutcome::Cancelled);
        }

        let count = records.len();
        guard.replace_all(records);
        // No receivers is fine; the event is not replayed.
        let _ = self.events.send(WallpaperChanged);
        drop(guard);

        Ok(RefreshOutcome::Replaced(count))
    }
}

/// Drains one `get_wallpapers` stream.
pub(crate) async fn fetch_wallpapers<T: Transport + ?Sized>(
    transport: &T,
) -> Result<Vec<WallpaperEntry>, TransportError> {
    let mut stream = transport.open_stream(ClientRequest::GetWallpapers).await?;
    let mut entries = Vec::new();
    while let Some(item) = stream.next().await {
        match item? {
            ServerMessage::Wallpaper(entry) => entries.push(entry),
            other => {
                return Err(TransportError::Unexpected {
                    request: "get_wallpapers",
                    reply: format!("{other:?}"),
                })
            }
        }
    }
    Ok(entries)
}

/// Owner side of the running subscriber.
pub(crate) struct SubscriberHandle {
    cancel: CancellationToken,
    state: Arc<watch::Sender<SubscriberState>>,
    task: Option<JoinHandle<()>>,
}

impl SubscriberHandle {
    /// Opens the change stream, loads the initial state, then starts the loop.
    ///
    /// The stream is opened before the initial load so no change in between
    /// goes unnoticed.
    pub(crate) async fn start<T: Transport + ?Sized>(
        sync: Synchronizer<T>,
    ) -> Result<Self, ClientError> {
        let (state, _) = watch::channel(SubscriberState::Idle);
        let state = Arc::new(state);
        let cancel = CancellationToken::new();

        let stream = sync
            .transport
            .open_stream(ClientRequest::SubscribeWallpaperChanged)
            .await?;

        if let RefreshOutcome::Replaced(count) = sync.refresh(&cancel).await? {
            tracing::info!(wallpapers = count, "initial wallpaper state loaded");
        }

        state.send_replace(SubscriberState::Streaming);
        let task = tokio::spawn(run(sync, stream, cancel.clone(), Arc::clone(&state)));

        Ok(Self {
            cancel,
            state,
            task: Some(task),
        })
    }

    pub(crate) fn state(&self) -> SubscriberState {
        self.state.borrow().clone()
    }

    pub(crate) fn watch(&self) -> watch::Receiver<SubscriberState> {
        self.state.subscribe()
    }

    /// Resolves with the stop reason once the loop has ended.
    pub(crate) async fn stopped(&self) -> StopReason {
        let mut rx = self.state.subscribe();
        loop {
            if let SubscriberState::Stopped(reason) = &*rx.borrow_and_update() {
                return reason.clone();
            }
            // The sender lives in `self`, so this only fails once we are gone.
            if rx.changed().await.is_err() {
                return StopReason::Cancelled;
            }
        }
    }

    /// Cancels the loop and waits up to `grace` for it. Returns whether it
    /// exited in time; a loop that did not is aborted.
    pub(crate) async fn stop(&mut self, grace: Duration) -> bool {
        self.cancel.cancel();
        let Some(mut task) = self.task.take() else {
            return true;
        };

        match tokio::time::timeout(grace, &mut task).await {
            Ok(_) => true,
            Err(_) => {
                tracing::warn!(?grace, "change subscriber did not stop in time, aborting");
                task.abort();
                self.state
                    .send_replace(SubscriberState::Stopped(StopReason::Cancelled));
                false
            }
        }
    }
}

impl Drop for SubscriberHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run<T: Transport + ?Sized>(
    sync: Synchronizer<T>,
    mut stream: ReplyStream,
    cancel: CancellationToken,
    state: Arc<watch::Sender<SubscriberState>>,
) {
    let reason = pump(&sync, &mut stream, &cancel, &state).await;
    match &reason {
        StopReason::Transport(e) => {
            tracing::warn!(error = %e, "wallpaper change stream failed, subscriber stopped")
        }
        other => tracing::info!(reason = ?other, "wallpaper change subscriber stopped"),
    }
    state.send_replace(SubscriberState::Stopped(reason));
}

async fn pump<T: Transport + ?Sized>(
    sync: &Synchronizer<T>,
    stream: &mut ReplyStream,
    cancel: &CancellationToken,
    state: &watch::Sender<SubscriberState>,
) -> StopReason {
    loop {
        state.send_replace(SubscriberState::Streaming);

        let item = tokio::select! {
            biased;
            _ = cancel.cancelled() => return StopReason::Cancelled,
            item = stream.next() => item,
        };

        match item {
            None => return StopReason::StreamClosed,
            Some(Err(e)) => return StopReason::Transport(Arc::new(e)),
            Some(Ok(_)) => {}
        }

        state.send_replace(SubscriberState::Refreshing);
        match sync.refresh(cancel).await {
            Ok(RefreshOutcome::Replaced(count)) => {
                tracing::debug!(wallpapers = count, "wallpaper cache refreshed");
            }
            Ok(RefreshOutcome::Cancelled) => return StopReason::Cancelled,
            Err(ClientError::Malformed(e)) => {
                tracing::warn!(error = %e, "rejected wallpaper refresh, keeping previous state");
            }
            Err(e) => {
                tracing::warn!(error = %e, "wallpaper refresh failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::DesktopCoreClient;
    use crate::config::ClientConfig;
    use crate::test_support::{entry, scripted};
    use tokio::sync::broadcast::error::TryRecvError;

    async fn wait_stopped(rx: &mut watch::Receiver<SubscriberState>) -> SubscriberState {
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| s.is_stopped()))
            .await
            .expect("subscriber stops")
            .expect("state sender alive")
            .clone()
    }

    #[tokio::test]
    async fn each_notification_refreshes_once_then_raises_the_event() {
        let (transport, script, notifier) = scripted();
        script.set_wallpapers(vec![entry("/a", "D1")]);
        let client = DesktopCoreClient::with_transport(transport, &ClientConfig::default())
            .await
            .unwrap();
        assert_eq!(client.wallpapers().len(), 1);

        let mut events = client.subscribe();
        for n in 2..=4 {
            let batch = (0..n).map(|i| entry("/a", &format!("D{i}"))).collect();
            script.set_wallpapers(batch);
            notifier.changed();

            events.recv().await.unwrap();
            assert_eq!(client.wallpapers().len(), n);
        }

        let mut state = client.watch_subscriber();
        drop(notifier);
        let stopped = wait_stopped(&mut state).await;
        assert!(matches!(
            stopped,
            SubscriberState::Stopped(StopReason::StreamClosed)
        ));

        // One initial load plus one per notification.
        assert_eq!(script.fetches(), 4);
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn cancelling_a_parked_subscriber_stops_it_within_the_grace_period() {
        let (transport, script, notifier) = scripted();
        script.set_wallpapers(vec![entry("/a", "D1")]);
        let client = DesktopCoreClient::with_transport(transport, &ClientConfig::default())
            .await
            .unwrap();
        let cache = client.state_cache();
        let mut state = client.watch_subscriber();

        assert!(client.close().await);
        assert!(matches!(
            wait_stopped(&mut state).await,
            SubscriberState::Stopped(StopReason::Cancelled)
        ));

        script.set_wallpapers(vec![]);
        notifier.changed();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(script.fetches(), 1);
        assert_eq!(cache.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn cancelling_mid_refresh_skips_the_replacement() {
        let (transport, script, notifier) = scripted();
        script.set_wallpapers(vec![entry("/a", "D1")]);
        let client = DesktopCoreClient::with_transport(transport, &ClientConfig::default())
            .await
            .unwrap();
        let cache = client.state_cache();
        let mut state = client.watch_subscriber();

        script.set_fetch_delay(Duration::from_secs(5));
        script.set_wallpapers(vec![]);
        notifier.changed();
        tokio::time::timeout(
            Duration::from_secs(2),
            state.wait_for(|s| matches!(s, SubscriberState::Refreshing)),
        )
        .await
        .unwrap()
        .unwrap();

        assert!(client.close().await);
        assert_eq!(cache.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn stopped_resolves_when_the_worker_closes_the_stream() {
        let (transport, _script, notifier) = scripted();
        let client = DesktopCoreClient::with_transport(transport, &ClientConfig::default())
            .await
            .unwrap();
        let mut events = client.subscribe();

        drop(notifier);
        let reason = tokio::time::timeout(Duration::from_secs(2), client.stopped())
            .await
            .expect("stopped resolves");
        assert!(matches!(reason, StopReason::StreamClosed));

        // The event channel stays open for the client's lifetime; only
        // `stopped` tells a listener that nothing more will arrive.
        let recv = tokio::time::timeout(Duration::from_millis(50), events.recv()).await;
        assert!(recv.is_err());
        assert!(matches!(
            tokio::time::timeout(Duration::from_millis(50), client.stopped()).await,
            Ok(StopReason::StreamClosed)
        ));
    }

    #[tokio::test]
    async fn a_loop_that_overruns_the_grace_period_is_aborted() {
        let (transport, script, notifier) = scripted();
        script.set_wallpapers(vec![entry("/a", "D1")]);
        let config = ClientConfig {
            shutdown_grace: Duration::from_millis(20),
            ..ClientConfig::default()
        };
        let client = DesktopCoreClient::with_transport(transport, &config)
            .await
            .unwrap();
        let cache = client.state_cache();
        let mut state = client.watch_subscriber();

        // Holding the refresh guard parks the loop where it does not look at
        // the cancellation token.
        let held = cache.begin_refresh().await;
        script.set_wallpapers(vec![]);
        notifier.changed();
        tokio::time::timeout(
            Duration::from_secs(2),
            state.wait_for(|s| matches!(s, SubscriberState::Refreshing)),
        )
        .await
        .unwrap()
        .unwrap();

        assert!(!client.close().await);
        assert!(matches!(
            *state.borrow(),
            SubscriberState::Stopped(StopReason::Cancelled)
        ));

        drop(held);
        notifier.changed();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(script.fetches(), 1);
        assert_eq!(cache.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn stream_failure_is_terminal() {
        let (transport, script, notifier) = scripted();
        let client = DesktopCoreClient::with_transport(transport, &ClientConfig::default())
            .await
            .unwrap();
        let mut state = client.watch_subscriber();

        notifier.fail();
        let stopped = wait_stopped(&mut state).await;
        assert!(matches!(
            stopped,
            SubscriberState::Stopped(StopReason::Transport(_))
        ));

        notifier.changed();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(script.fetches(), 1);
        assert!(client.subscriber_state().is_stopped());
    }

    #[tokio::test]
    async fn malformed_batch_keeps_previous_state_and_raises_nothing() {
        let (transport, script, notifier) = scripted();
        script.set_wallpapers(vec![entry("/a", "D1")]);
        let client = DesktopCoreClient::with_transport(transport, &ClientConfig::default())
            .await
            .unwrap();
        let mut events = client.subscribe();

        let mut broken = entry("/b", "D2");
        broken.screen = None;
        script.set_wallpapers(vec![entry("/b", "D1"), broken]);
        notifier.changed();
        script.wait_fetches(2).await;

        script.set_wallpapers(vec![entry("/c", "D1")]);
        notifier.changed();

        events.recv().await.unwrap();
        assert_eq!(client.wallpapers()[0].info_folder_path, "/c");
        assert_eq!(script.fetches(), 3);
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn failed_refresh_does_not_stop_streaming() {
        let (transport, script, notifier) = scripted();
        let client = DesktopCoreClient::with_transport(transport, &ClientConfig::default())
            .await
            .unwrap();
        let mut events = client.subscribe();

        script.fail_fetches(true);
        notifier.changed();
        script.wait_fetches(2).await;
        tokio::task::yield_now().await;
        assert!(!client.subscriber_state().is_stopped());

        script.fail_fetches(false);
        script.set_wallpapers(vec![entry("/a", "D1")]);
        notifier.changed();
        events.recv().await.unwrap();
        assert_eq!(client.wallpapers().len(), 1);
    }

    #[tokio::test]
    async fn initial_load_failure_fails_construction() {
        let (transport, script, _notifier) = scripted();
        let mut broken = entry("/a", "D1");
        broken.lively_info_path.clear();
        script.set_wallpapers(vec![broken]);

        let err = DesktopCoreClient::with_transport(transport, &ClientConfig::default())
            .await
            .err()
            .expect("construction fails");
        assert!(matches!(err, ClientError::Malformed(_)));
    }
}

//! Scripted transport and fixtures for unit tests.

use crate::error::TransportError;
use crate::model::{DisplayDescriptor, MonitorHandle, Rect, WallpaperRecord};
use crate::translate::wallpaper_to_wire;
use crate::transport::{ReplyStream, Transport};
use async_trait::async_trait;
use desktop_protocol::{ClientRequest, ErrorCode, ServerMessage, WallpaperEntry};
use futures_util::stream::{self, StreamExt};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

type Notification = Result<ServerMessage, TransportError>;

pub(crate) fn record(path: &str, device_id: &str) -> WallpaperRecord {
    WallpaperRecord {
        info_folder_path: path.to_string(),
        property_copy_path: String::new(),
        preview_path: String::new(),
        thumbnail_path: String::new(),
        display: DisplayDescriptor {
            device_id: device_id.to_string(),
            display_name: format!("Display {device_id}"),
            device_name: device_id.to_string(),
            monitor_handle: MonitorHandle::from_raw(1),
            is_primary: false,
            index: 0,
            bounds: Rect::new(0, 0, 1920, 1080),
            working_area: Rect::new(0, 0, 1920, 1040),
        },
    }
}

pub(crate) fn entry(path: &str, device_id: &str) -> WallpaperEntry {
    wallpaper_to_wire(&record(path, device_id))
}

#[derive(Default)]
pub(crate) struct Script {
    calls: Mutex<Vec<ClientRequest>>,
    wallpapers: Mutex<Vec<WallpaperEntry>>,
    fail_calls: AtomicBool,
    fail_fetches: AtomicBool,
    fetches: AtomicUsize,
    fetch_delay: Mutex<Option<Duration>>,
    notifications: Mutex<Option<mpsc::UnboundedReceiver<Notification>>>,
}

impl Script {
    /// Unary requests seen so far, in order.
    pub(crate) fn calls(&self) -> Vec<ClientRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn set_wallpapers(&self, entries: Vec<WallpaperEntry>) {
        *self.wallpapers.lock().unwrap() = entries;
    }

    pub(crate) fn fail_calls(&self, fail: bool) {
        self.fail_calls.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.lock().unwrap() = Some(delay);
    }

    pub(crate) fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub(crate) async fn wait_fetches(&self, n: usize) {
        let waited = tokio::time::timeout(Duration::from_secs(2), async {
            while self.fetches() < n {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await;
        assert!(waited.is_ok(), "expected {n} fetches, saw {}", self.fetches());
    }
}

pub(crate) struct ScriptedTransport(Arc<Script>);

/// Feeds the change stream. Dropping it closes the stream.
pub(crate) struct Notifier(mpsc::UnboundedSender<Notification>);

impl Notifier {
    pub(crate) fn changed(&self) {
        let _ = self.0.send(Ok(ServerMessage::WallpaperChanged));
    }

    pub(crate) fn fail(&self) {
        let _ = self.0.send(Err(TransportError::Fault {
            code: ErrorCode::InternalError,
            msg: "worker went away".to_string(),
        }));
    }
}

pub(crate) fn scripted() -> (ScriptedTransport, Arc<Script>, Notifier) {
    let (tx, rx) = mpsc::unbounded_channel();
    let script = Arc::new(Script::default());
    *script.notifications.lock().unwrap() = Some(rx);
    (ScriptedTransport(Arc::clone(&script)), script, Notifier(tx))
}

fn refused() -> TransportError {
    TransportError::Connect {
        address: "scripted".to_string(),
        source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn call(&self, request: ClientRequest) -> Result<(), TransportError> {
        self.0.calls.lock().unwrap().push(request);
        if self.0.fail_calls.load(Ordering::SeqCst) {
            return Err(refused());
        }
        Ok(())
    }

    async fn open_stream(&self, request: ClientRequest) -> Result<ReplyStream, TransportError> {
        match request {
            ClientRequest::GetWallpapers => {
                let entries = self.0.wallpapers.lock().unwrap().clone();
                self.0.fetches.fetch_add(1, Ordering::SeqCst);

                let delay = *self.0.fetch_delay.lock().unwrap();
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                if self.0.fail_fetches.load(Ordering::SeqCst) {
                    return Err(refused());
                }
                Ok(stream::iter(entries.into_iter().map(|e| Ok(ServerMessage::Wallpaper(e)))).boxed())
            }
            ClientRequest::SubscribeWallpaperChanged => {
                let rx = self.0.notifications.lock().unwrap().take();
                let Some(rx) = rx else {
                    return Err(TransportError::Closed("subscribe_wallpaper_changed"));
                };
                Ok(stream::unfold(rx, |mut rx| async move {
                    rx.recv().await.map(|item| (item, rx))
                })
                .boxed())
            }
            other => Err(TransportError::Unexpected {
                request: other.kind(),
                reply: "not a stream".to_string(),
            }),
        }
    }
}

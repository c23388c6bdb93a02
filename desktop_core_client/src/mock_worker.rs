//! Stand-in worker process speaking the desktop core wire protocol.
//!
//! Keeps an in-memory list of active wallpapers over a fixed set of screens,
//! applies commands to it, and pushes `wallpaper_changed` to every open
//! subscription whenever the list changes. Used by the integration tests and
//! by the `mock_worker` binary.

use crate::config::ChannelAddress;
use desktop_protocol::{
    ClientRequest, ErrorCode, ScreenData, ServerMessage, WallpaperCategory, WallpaperEntry,
};
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;

const CHANGE_CAP: usize = 64;

/// How the worker misbehaves on a session picked for failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Reply with an `error` frame carrying this code.
    Error(ErrorCode),
    /// Reply with a text frame that is not a server message.
    Garbage,
    /// Close the session without replying.
    Hangup,
}

#[derive(Debug, Clone, Copy)]
enum Push {
    Changed,
    Fault(Fault),
}

#[derive(Default)]
struct WorkerState {
    screens: Vec<ScreenData>,
    active: Vec<WallpaperEntry>,
    categories: HashMap<String, WallpaperCategory>,
    requests: Vec<ClientRequest>,
    fail_next: Option<Fault>,
    fail_next_fetch: Option<Fault>,
}

struct Shared {
    state: Mutex<WorkerState>,
    changes: broadcast::Sender<Push>,
    shutdown: CancellationToken,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, WorkerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self) {
        let _ = self.changes.send(Push::Changed);
    }
}

pub struct MockWorker {
    path: PathBuf,
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MockWorker {
    pub async fn spawn(address: &ChannelAddress, screens: Vec<ScreenData>) -> std::io::Result<Self> {
        let path = address.socket_path();
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        let listener = UnixListener::bind(&path)?;

        let (changes, _) = broadcast::channel(CHANGE_CAP);
        let shared = Arc::new(Shared {
            state: Mutex::new(WorkerState {
                screens,
                ..WorkerState::default()
            }),
            changes,
            shutdown: CancellationToken::new(),
        });

        let task = tokio::spawn(serve(listener, path.clone(), Arc::clone(&shared)));
        tracing::info!(path = %path.display(), "mock worker listening");

        Ok(Self {
            path,
            shared,
            task: Mutex::new(Some(task)),
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.path
    }

    /// Every request received so far, streams included.
    pub fn requests(&self) -> Vec<ClientRequest> {
        self.shared.lock().requests.clone()
    }

    pub fn active(&self) -> Vec<WallpaperEntry> {
        self.shared.lock().active.clone()
    }

    /// Replaces the active list as if the worker changed on its own.
    pub fn set_active(&self, entries: Vec<WallpaperEntry>) {
        self.shared.lock().active = entries;
        self.shared.notify();
    }

    pub fn notify_changed(&self) {
        self.shared.notify();
    }

    pub fn register_library(&self, lively_info_path: &str, category: WallpaperCategory) {
        self.shared
            .lock()
            .categories
            .insert(lively_info_path.to_string(), category);
    }

    /// The next unary command fails this way instead of being applied.
    pub fn fail_next(&self, fault: Fault) {
        self.shared.lock().fail_next = Some(fault);
    }

    /// The next `get_wallpapers` session fails this way instead of listing.
    pub fn fail_next_fetch(&self, fault: Fault) {
        self.shared.lock().fail_next_fetch = Some(fault);
    }

    /// Every open change subscription fails this way and ends.
    pub fn fault_subscriptions(&self, fault: Fault) {
        let _ = self.shared.changes.send(Push::Fault(fault));
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.shutdown.is_cancelled()
    }

    /// Resolves once a client asked the worker to shut down (or `shutdown` was called).
    pub async fn wait_shut_down(&self) {
        self.shared.shutdown.cancelled().await;
    }

    /// Stops accepting, ends open subscriptions and waits for the listener.
    pub async fn shutdown(&self) {
        self.shared.shutdown.cancel();
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

impl Drop for MockWorker {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
    }
}

async fn serve(listener: UnixListener, path: PathBuf, shared: Arc<Shared>) {
    loop {
        let accepted = tokio::select! {
            _ = shared.shutdown.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, _addr)) => {
                // Subscribe before the handshake completes so a client that has
                // finished opening a stream cannot miss a change.
                let changes = shared.changes.subscribe();
                let shared = Arc::clone(&shared);
                tokio::spawn(async move {
                    if let Err(e) = handle_session(stream, changes, &shared).await {
                        tracing::debug!(error = %e, "mock worker session ended with error");
                    }
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "mock worker accept failed");
                break;
            }
        }
    }

    let _ = std::fs::remove_file(&path);
}

async fn handle_session(
    stream: UnixStream,
    mut changes: broadcast::Receiver<Push>,
    shared: &Shared,
) -> Result<(), tungstenite::Error> {
    let mut ws = tokio_tungstenite::accept_async(stream).await?;

    let text = loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => break text,
            Some(Ok(Message::Close(_))) | None => return Ok(()),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e),
        }
    };

    let request = match serde_json::from_str::<ClientRequest>(&text) {
        Ok(r) => r,
        Err(_) => {
            send(
                &mut ws,
                &ServerMessage::Error {
                    msg: "invalid json".to_string(),
                    code: ErrorCode::InvalidCommand,
                },
            )
            .await?;
            return ws.close(None).await;
        }
    };
    tracing::debug!(request = request.kind(), "mock worker request");
    shared.lock().requests.push(request.clone());

    match request {
        ClientRequest::GetWallpapers => {
            let (fault, active) = {
                let mut state = shared.lock();
                (state.fail_next_fetch.take(), state.active.clone())
            };
            match fault {
                Some(fault) => send_fault(&mut ws, fault).await?,
                None => {
                    for entry in active {
                        send(&mut ws, &ServerMessage::Wallpaper(entry)).await?;
                    }
                }
            }
        }
        ClientRequest::SubscribeWallpaperChanged => loop {
            tokio::select! {
                _ = shared.shutdown.cancelled() => break,
                change = changes.recv() => match change {
                    Ok(Push::Changed) | Err(broadcast::error::RecvError::Lagged(_)) => {
                        send(&mut ws, &ServerMessage::WallpaperChanged).await?;
                    }
                    Ok(Push::Fault(fault)) => {
                        send_fault(&mut ws, fault).await?;
                        break;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                incoming = ws.next() => match incoming {
                    Some(Ok(Message::Close(_))) | None => return Ok(()),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e),
                },
            }
        },
        command => {
            let fault = shared.lock().fail_next.take();
            match fault {
                Some(fault) => send_fault(&mut ws, fault).await?,
                None => {
                    let reply = apply(shared, command);
                    send(&mut ws, &reply).await?;
                }
            }
        }
    }

    ws.close(None).await
}

fn apply(shared: &Shared, command: ClientRequest) -> ServerMessage {
    let mut state = shared.lock();
    let before = state.active.len();
    let mut changed = false;

    match command {
        ClientRequest::SetWallpaper {
            lively_info_path,
            monitor_id,
        } => {
            let Some(screen) = state
                .screens
                .iter()
                .find(|s| s.device_id == monitor_id)
                .cloned()
            else {
                return ServerMessage::Error {
                    msg: format!("no monitor {monitor_id}"),
                    code: ErrorCode::NotFound,
                };
            };
            state.active.retain(|e| !on_monitor(e, &monitor_id));
            state.active.push(WallpaperEntry {
                preview_path: format!("{lively_info_path}/preview.gif"),
                thumbnail_path: format!("{lively_info_path}/thumbnail.jpg"),
                lively_info_path,
                property_copy_path: String::new(),
                screen: Some(screen),
            });
            changed = true;
        }
        ClientRequest::CloseAllWallpapers { .. } => state.active.clear(),
        ClientRequest::CloseWallpaperCategory { category, .. } => {
            let WorkerState {
                active, categories, ..
            } = &mut *state;
            active.retain(|e| categories.get(&e.lively_info_path) != Some(&category));
        }
        ClientRequest::CloseWallpaperLibrary {
            lively_info_path, ..
        } => state
            .active
            .retain(|e| e.lively_info_path != lively_info_path),
        ClientRequest::CloseWallpaperMonitor { monitor_id, .. } => {
            state.active.retain(|e| !on_monitor(e, &monitor_id))
        }
        ClientRequest::SendMessageWallpaper { .. } => {}
        ClientRequest::ShutDown => shared.shutdown.cancel(),
        ClientRequest::GetWallpapers | ClientRequest::SubscribeWallpaperChanged => {
            return ServerMessage::Error {
                msg: "streaming request on unary path".to_string(),
                code: ErrorCode::InvalidCommand,
            };
        }
    }

    changed |= state.active.len() != before;
    drop(state);
    if changed {
        shared.notify();
    }
    ServerMessage::Ack
}

fn on_monitor(entry: &WallpaperEntry, monitor_id: &str) -> bool {
    entry
        .screen
        .as_ref()
        .is_some_and(|s| s.device_id == monitor_id)
}

async fn send_fault(
    ws: &mut WebSocketStream<UnixStream>,
    fault: Fault,
) -> Result<(), tungstenite::Error> {
    match fault {
        Fault::Error(code) => {
            send(
                ws,
                &ServerMessage::Error {
                    msg: "injected failure".to_string(),
                    code,
                },
            )
            .await
        }
        Fault::Garbage => ws.send(Message::Text("{\"type\":".into())).await,
        Fault::Hangup => Ok(()),
    }
}

async fn send(
    ws: &mut WebSocketStream<UnixStream>,
    msg: &ServerMessage,
) -> Result<(), tungstenite::Error> {
    let payload = serde_json::to_string(msg).map_err(|e| {
        tungstenite::Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })?;
    ws.send(Message::Text(payload.into())).await
}

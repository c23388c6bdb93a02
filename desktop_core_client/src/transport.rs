//! Connection to the worker process.
//!
//! Every call is its own websocket session over a fresh local stream: the
//! client sends one `ClientRequest` frame, then reads either a single reply
//! (unary calls) or items until the worker closes the session (streams).

use crate::config::ChannelAddress;
use crate::error::TransportError;
use async_trait::async_trait;
use desktop_protocol::{ClientRequest, ServerMessage, HANDSHAKE_URI};
use futures_util::stream::{self, BoxStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

/// Items of a server stream. Ends when the worker closes the session.
pub type ReplyStream = BoxStream<'static, Result<ServerMessage, TransportError>>;

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Unary call. `Ok` means the worker acknowledged the request.
    async fn call(&self, request: ClientRequest) -> Result<(), TransportError>;

    /// Opens a server stream; the caller drives consumption.
    async fn open_stream(&self, request: ClientRequest) -> Result<ReplyStream, TransportError>;
}

/// Transport over the platform's local socket (Unix socket / named pipe).
#[derive(Debug, Clone)]
pub struct LocalTransport {
    address: ChannelAddress,
}

impl LocalTransport {
    pub fn new(address: ChannelAddress) -> Self {
        Self { address }
    }

    pub fn address(&self) -> &ChannelAddress {
        &self.address
    }

    async fn session(&self) -> Result<WebSocketStream<LocalStream>, TransportError> {
        let stream = connect_local(&self.address)
            .await
            .map_err(|source| TransportError::Connect {
                address: self.address.to_string(),
                source,
            })?;
        let (ws, _resp) = tokio_tungstenite::client_async(HANDSHAKE_URI, stream).await?;
        Ok(ws)
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn call(&self, request: ClientRequest) -> Result<(), TransportError> {
        let kind = request.kind();
        tracing::debug!(request = kind, "call");

        let mut ws = self.session().await?;
        send_request(&mut ws, &request).await?;

        let reply = next_reply(&mut ws).await;
        let _ = ws.close(None).await;

        match reply? {
            Some(ServerMessage::Ack) => Ok(()),
            Some(ServerMessage::Error { msg, code }) => Err(TransportError::Fault { code, msg }),
            Some(other) => Err(TransportError::Unexpected {
                request: kind,
                reply: format!("{other:?}"),
            }),
            None => Err(TransportError::Closed(kind)),
        }
    }

    async fn open_stream(&self, request: ClientRequest) -> Result<ReplyStream, TransportError> {
        tracing::debug!(request = request.kind(), "open stream");

        let mut ws = self.session().await?;
        send_request(&mut ws, &request).await?;
        Ok(reply_stream(ws))
    }
}

async fn send_request<S>(
    ws: &mut WebSocketStream<S>,
    request: &ClientRequest,
) -> Result<(), TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let payload = serde_json::to_string(request).map_err(TransportError::Encode)?;
    ws.send(Message::Text(payload.into())).await?;
    Ok(())
}

/// Next decoded frame, skipping control frames. `None` once the session ends.
async fn next_reply<S>(ws: &mut WebSocketStream<S>) -> Result<Option<ServerMessage>, TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(frame) = ws.next().await {
        match frame? {
            Message::Text(text) => {
                let msg = serde_json::from_str::<ServerMessage>(&text)
                    .map_err(TransportError::Decode)?;
                return Ok(Some(msg));
            }
            Message::Close(_) => return Ok(None),
            _ => continue,
        }
    }
    Ok(None)
}

fn reply_stream<S>(ws: WebSocketStream<S>) -> ReplyStream
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    stream::unfold(Some(ws), |state| async move {
        let mut ws = state?;
        match next_reply(&mut ws).await {
            Ok(Some(ServerMessage::Error { msg, code })) => {
                Some((Err(TransportError::Fault { code, msg }), None))
            }
            Ok(Some(msg)) => Some((Ok(msg), Some(ws))),
            Ok(None) => None,
            Err(e) => Some((Err(e), None)),
        }
    })
    .boxed()
}

#[cfg(unix)]
pub(crate) type LocalStream = tokio::net::UnixStream;

#[cfg(unix)]
pub(crate) async fn connect_local(address: &ChannelAddress) -> std::io::Result<LocalStream> {
    tokio::net::UnixStream::connect(address.socket_path()).await
}

#[cfg(windows)]
pub(crate) type LocalStream = tokio::net::windows::named_pipe::NamedPipeClient;

#[cfg(windows)]
pub(crate) async fn connect_local(address: &ChannelAddress) -> std::io::Result<LocalStream> {
    tokio::net::windows::named_pipe::ClientOptions::new().open(address.pipe_name())
}

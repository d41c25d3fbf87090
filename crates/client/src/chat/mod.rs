//! Realtime chat with the MediTrack assistant
//!
//! A [`ChatSession`] owns one Socket.IO connection. Frames are read and
//! written by two background tasks; the session itself only queues outbound
//! events and hands out decoded replies. Missed replies are not resumed after
//! a [`ChatSession::reconnect`].

pub mod history;
pub mod packet;

pub use history::{APOLOGY, ChatMessage, GREETING, Sender, transcript};
pub use packet::{Packet, PacketError};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::store::{self, TokenStore};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};
use url::Url;

pub const MESSAGE_EVENT: &str = "chat_message";
pub const RESPONSE_EVENT: &str = "chat_response";

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A reply pushed by the chat server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatReply {
    Response(String),
    Error(String),
}

impl ChatReply {
    /// Render the reply as a transcript line
    pub fn into_message(self) -> ChatMessage {
        match self {
            Self::Response(text) => ChatMessage::assistant(text),
            Self::Error(_) => ChatMessage::assistant(APOLOGY),
        }
    }
}

#[derive(Deserialize)]
struct ResponsePayload {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

pub struct ChatSession {
    url: Url,
    store: Arc<dyn TokenStore>,
    outbound: mpsc::UnboundedSender<Message>,
    replies: mpsc::UnboundedReceiver<ChatReply>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl ChatSession {
    /// Connect to the chat server named in `config`
    pub async fn connect(
        config: &ClientConfig,
        store: Arc<dyn TokenStore>,
    ) -> Result<Self, ClientError> {
        Self::connect_url(config.chat_socket_url()?, store).await
    }

    /// Connect to a fully-formed Socket.IO WebSocket URL
    pub async fn connect_url(url: Url, store: Arc<dyn TokenStore>) -> Result<Self, ClientError> {
        let (mut socket, _) = connect_async(url.as_str())
            .await
            .map_err(|e| ClientError::Chat(format!("connect to {url} failed: {e}")))?;

        let token = store::access_token(store.as_ref());
        tokio::time::timeout(HANDSHAKE_TIMEOUT, handshake(&mut socket, token.as_deref()))
            .await
            .map_err(|_| ClientError::Chat("handshake timed out".into()))??;

        let (sink, stream) = socket.split();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (replies_tx, replies) = mpsc::unbounded_channel();
        let writer = tokio::spawn(write_loop(sink, outbound_rx));
        let reader = tokio::spawn(read_loop(stream, outbound.clone(), replies_tx));
        info!(%url, "Connected to chat server");

        Ok(Self {
            url,
            store,
            outbound,
            replies,
            reader,
            writer,
        })
    }

    /// Emit a chat message carrying the current access token
    pub fn send(&self, message: &str) -> Result<(), ClientError> {
        if message.trim().is_empty() {
            return Err(ClientError::Chat("message is empty".into()));
        }
        let token = store::access_token(self.store.as_ref());
        let packet = Packet::event(MESSAGE_EVENT, json!({ "token": token, "message": message }));
        self.queue(&packet)
    }

    /// Wait for the next reply; `None` once the connection is gone
    pub async fn next_reply(&mut self) -> Option<ChatReply> {
        self.replies.recv().await
    }

    pub fn is_connected(&self) -> bool {
        !self.reader.is_finished() && !self.writer.is_finished()
    }

    /// Replace this connection with a fresh one to the same server
    pub async fn reconnect(&mut self) -> Result<(), ClientError> {
        let fresh = Self::connect_url(self.url.clone(), self.store.clone()).await?;
        let mut old = std::mem::replace(self, fresh);
        old.shutdown().await;
        debug!(url = %self.url, "Chat session reconnected");
        Ok(())
    }

    /// Leave the namespace and close the socket
    pub async fn close(mut self) {
        self.shutdown().await;
    }

    fn queue(&self, packet: &Packet) -> Result<(), ClientError> {
        self.outbound
            .send(Message::Text(packet.encode().into()))
            .map_err(|_| ClientError::Chat("connection closed".into()))
    }

    async fn shutdown(&mut self) {
        let _ = self.queue(&Packet::Disconnect);
        let _ = self.outbound.send(Message::Close(None));
        if tokio::time::timeout(CLOSE_TIMEOUT, &mut self.writer).await.is_err() {
            debug!("Chat writer did not finish in time");
        }
        self.reader.abort();
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

async fn send_packet(socket: &mut Socket, packet: &Packet) -> Result<(), ClientError> {
    socket
        .send(Message::Text(packet.encode().into()))
        .await
        .map_err(|e| ClientError::Chat(e.to_string()))
}

/// Engine.IO open, then Socket.IO connect to the default namespace
async fn handshake(socket: &mut Socket, token: Option<&str>) -> Result<(), ClientError> {
    let mut opened = false;

    while let Some(frame) = socket.next().await {
        let frame = frame.map_err(|e| ClientError::Chat(e.to_string()))?;
        let Message::Text(text) = frame else {
            continue;
        };

        match Packet::decode(text.as_str())? {
            Packet::Open(params) if !opened => {
                debug!(%params, "Engine.IO session opened");
                opened = true;
                let auth = token.map(|t| json!({ "token": t }));
                send_packet(socket, &Packet::Connect(auth)).await?;
            }
            Packet::Ping => send_packet(socket, &Packet::Pong).await?,
            Packet::Connect(_) if opened => return Ok(()),
            Packet::ConnectError(data) => {
                return Err(ClientError::Chat(format!("connection refused: {data}")));
            }
            other => debug!(?other, "Ignoring frame during handshake"),
        }
    }

    Err(ClientError::Chat("connection closed during handshake".into()))
}

async fn write_loop(
    mut sink: SplitSink<Socket, Message>,
    mut outbound: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(message) = outbound.recv().await {
        let closing = matches!(message, Message::Close(_));
        if let Err(e) = sink.send(message).await {
            warn!("Chat write failed: {e}");
            break;
        }
        if closing {
            break;
        }
    }
}

async fn read_loop(
    mut stream: SplitStream<Socket>,
    outbound: mpsc::UnboundedSender<Message>,
    replies: mpsc::UnboundedSender<ChatReply>,
) {
    while let Some(frame) = stream.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                warn!("Chat connection error: {e}");
                break;
            }
        };

        match Packet::decode(text.as_str()) {
            Ok(Packet::Ping) => {
                if outbound
                    .send(Message::Text(Packet::Pong.encode().into()))
                    .is_err()
                {
                    break;
                }
            }
            Ok(Packet::Event { name, data }) if name == RESPONSE_EVENT => {
                if replies.send(parse_reply(data)).is_err() {
                    break;
                }
            }
            Ok(Packet::Disconnect | Packet::Close) => break,
            Ok(other) => debug!(?other, "Ignoring chat frame"),
            Err(e) => warn!("Malformed chat frame: {e}"),
        }
    }
    debug!("Chat reader finished");
}

fn parse_reply(data: Value) -> ChatReply {
    match serde_json::from_value::<ResponsePayload>(data) {
        Ok(ResponsePayload { error: Some(e), .. }) => ChatReply::Error(e),
        Ok(ResponsePayload {
            response: Some(r), ..
        }) => ChatReply::Response(r),
        Ok(_) => ChatReply::Error("empty chat response".into()),
        Err(e) => ChatReply::Error(format!("malformed chat response: {e}")),
    }
}

//! WebSocket client for the channel broadcast topic.
//!
//! The host platform fans EBS pushes out to every connected viewer; the
//! headless overlay subscribes directly with a plain websocket. Decoded
//! frames are forwarded over an mpsc channel, everything undecodable is
//! dropped by [`message::decode`].

use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use super::message::{self, BroadcastMessage};

pub type Writer = Arc<Mutex<SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>>>;
pub type Reader = Arc<Mutex<SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>>>;

#[derive(Debug)]
pub struct BroadcastSocket {
    writer: Writer,
    reader: Reader,
    channel_id: String,
}

impl BroadcastSocket {
    /// Connects to the broadcast endpoint for one channel's topic.
    #[instrument(skip(url))]
    pub async fn connect(url: &str, channel_id: &str) -> SocketResult<Self> {
        let topic_url = format!("{}?channelId={}", url, channel_id);
        let (stream, _) = connect_async(topic_url).await?;
        let (w, r) = stream.split();

        tracing::info!(channel_id, "broadcast socket connected");

        Ok(Self {
            writer: Arc::new(Mutex::new(w)),
            reader: Arc::new(Mutex::new(r)),
            channel_id: channel_id.to_string(),
        })
    }

    /// Reads frames until the peer closes or the token is cancelled,
    /// forwarding every decoded [`BroadcastMessage`] to `tx`.
    ///
    /// A dropped receiver ends the loop as well; late frames after teardown
    /// go nowhere instead of erroring.
    #[instrument(skip(self, tx, cancel_token), fields(channel_id = self.channel_id))]
    pub async fn loop_read(
        &self,
        tx: UnboundedSender<BroadcastMessage>,
        cancel_token: CancellationToken,
    ) -> SocketResult<()> {
        let reader = self.reader.clone();

        loop {
            tokio::select! {
                incoming = Self::read(&reader) => {
                    let Some(frame) = incoming else {
                        tracing::warn!("broadcast socket closed by peer");
                        break;
                    };

                    match frame {
                        Message::Text(raw) => {
                            if let Some(msg) = message::decode(raw.as_str())
                                && tx.send(msg).is_err()
                            {
                                tracing::debug!("broadcast receiver dropped, ending read loop");
                                break;
                            }
                        }

                        Message::Ping(payload) => {
                            self.write(Message::Pong(payload)).await?;
                        }

                        Message::Close(_) => {
                            tracing::info!("received close frame");
                            break;
                        }

                        _ => (),
                    }
                }

                _ = cancel_token.cancelled() => {
                    tracing::info!("broadcast read loop cancelled");
                    break;
                }
            }
        }

        Ok(())
    }

    async fn write(&self, msg: Message) -> SocketResult<()> {
        Ok(self.writer.lock().await.send(msg).await?)
    }

    async fn read(reader: &Reader) -> Option<Message> {
        let mut lock = reader.lock().await;

        match lock.next().await {
            Some(Ok(frame)) => Some(frame),
            Some(Err(e)) => {
                tracing::warn!(error = ?e, "broadcast read fault, treating as closed");
                None
            }
            None => None,
        }
    }
}

pub type SocketResult<T> = core::result::Result<T, SocketErr>;

#[derive(Debug, Error)]
pub enum SocketErr {
    #[error(transparent)]
    Ws(#[from] tokio_tungstenite::tungstenite::Error),
}

// WebSocket server for draft clients.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::stream::Stream;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Capacity of each connection's outbound queue.
const OUTBOUND_CAPACITY: usize = 64;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one client connection for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Events emitted by the WebSocket server to the application layer.
#[derive(Debug)]
pub enum WsEvent {
    /// A client completed the handshake. Text pushed into `outbound` is sent
    /// to that client.
    Connected {
        id: ConnectionId,
        addr: String,
        outbound: mpsc::Sender<String>,
    },
    Disconnected { id: ConnectionId },
    /// A text frame from a client (raw JSON).
    Message { id: ConnectionId, text: String },
}

/// Bind the listener on `127.0.0.1:{port}`. Port 0 picks a free port.
pub async fn bind(port: u16) -> anyhow::Result<TcpListener> {
    let listener = TcpListener::bind(format!("127.0.0.1:{port}")).await?;
    info!("WebSocket server listening on {}", listener.local_addr()?);
    Ok(listener)
}

/// Accept connections forever, one task per client, forwarding events
/// through `tx`. Returns when `tx` is closed.
pub async fn run(listener: TcpListener, tx: mpsc::Sender<WsEvent>) -> anyhow::Result<()> {
    loop {
        let (stream, addr) = listener.accept().await?;
        if tx.is_closed() {
            break;
        }
        let tx = tx.clone();
        tokio::spawn(async move {
            handle_connection(stream, addr.to_string(), tx).await;
        });
    }
    Ok(())
}

async fn handle_connection(stream: TcpStream, addr: String, tx: mpsc::Sender<WsEvent>) {
    let ws_stream = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake failed for {addr}: {e}");
            return;
        }
    };
    let id = ConnectionId::next();
    info!("Client {id} connected from {addr}");

    let (mut write, read) = ws_stream.split();
    let (out_tx, mut out_rx) = mpsc::channel::<String>(OUTBOUND_CAPACITY);

    if tx
        .send(WsEvent::Connected {
            id,
            addr: addr.clone(),
            outbound: out_tx,
        })
        .await
        .is_err()
    {
        return;
    }

    let writer = tokio::spawn(async move {
        while let Some(text) = out_rx.recv().await {
            if let Err(e) = write.send(Message::Text(text.into())).await {
                debug!("Send to {id} failed: {e}");
                break;
            }
        }
        let _ = write.close().await;
    });

    let _ = process_message_stream(read, &tx, id, &addr).await;
    writer.abort();
    let _ = tx.send(WsEvent::Disconnected { id }).await;
    info!("Client {id} disconnected");
}

/// Forward text frames from `stream` through `tx` until the client closes,
/// errors, or the channel is dropped. Returns `Err(())` in the last case.
pub async fn process_message_stream<St>(
    mut stream: St,
    tx: &mpsc::Sender<WsEvent>,
    id: ConnectionId,
    addr: &str,
) -> Result<(), ()>
where
    St: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    while let Some(msg_result) = stream.next().await {
        match msg_result {
            Ok(Message::Text(text)) => {
                let event = WsEvent::Message {
                    id,
                    text: text.to_string(),
                };
                if tx.send(event).await.is_err() {
                    return Err(());
                }
            }
            Ok(Message::Close(_)) => {
                info!("Client {addr} sent close frame");
                break;
            }
            Err(e) => {
                warn!("WebSocket error from {addr}: {e}");
                break;
            }
            _ => {
                // Binary, Ping, Pong, Frame.
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use tokio_tungstenite::tungstenite::Error as WsError;

    fn mock_stream(
        messages: Vec<Result<Message, WsError>>,
    ) -> impl Stream<Item = Result<Message, WsError>> + Unpin {
        stream::iter(messages)
    }

    fn text_of(event: WsEvent) -> String {
        match event {
            WsEvent::Message { text, .. } => text,
            other => panic!("expected Message, got {other:?}"),
        }
    }

    #[test]
    fn connection_id_display() {
        assert_eq!(ConnectionId::new(7).to_string(), "conn-7");
        assert_ne!(ConnectionId::next(), ConnectionId::next());
    }

    #[tokio::test]
    async fn text_messages_forwarded_in_order_with_id() {
        let (tx, mut rx) = mpsc::channel(64);
        let id = ConnectionId::new(3);
        let messages = vec![
            Ok(Message::Text("first".into())),
            Ok(Message::Text("second".into())),
        ];
        process_message_stream(mock_stream(messages), &tx, id, "test")
            .await
            .unwrap();

        match rx.recv().await.unwrap() {
            WsEvent::Message { id: got, text } => {
                assert_eq!(got, id);
                assert_eq!(text, "first");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(text_of(rx.recv().await.unwrap()), "second");
    }

    #[tokio::test]
    async fn close_frame_stops_processing() {
        let (tx, mut rx) = mpsc::channel(64);
        let messages = vec![
            Ok(Message::Text("before_close".into())),
            Ok(Message::Close(None)),
            Ok(Message::Text("after_close".into())),
        ];
        process_message_stream(mock_stream(messages), &tx, ConnectionId::new(1), "test")
            .await
            .unwrap();
        assert_eq!(text_of(rx.recv().await.unwrap()), "before_close");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn error_stops_processing() {
        let (tx, mut rx) = mpsc::channel(64);
        let messages = vec![
            Ok(Message::Text("before_error".into())),
            Err(WsError::ConnectionClosed),
            Ok(Message::Text("after_error".into())),
        ];
        process_message_stream(mock_stream(messages), &tx, ConnectionId::new(1), "test")
            .await
            .unwrap();
        assert_eq!(text_of(rx.recv().await.unwrap()), "before_error");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn binary_and_ping_messages_are_ignored() {
        let (tx, mut rx) = mpsc::channel(64);
        let messages = vec![
            Ok(Message::Binary(vec![1, 2, 3].into())),
            Ok(Message::Ping(vec![].into())),
            Ok(Message::Text("after_ignored".into())),
        ];
        process_message_stream(mock_stream(messages), &tx, ConnectionId::new(1), "test")
            .await
            .unwrap();
        assert_eq!(text_of(rx.recv().await.unwrap()), "after_ignored");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_channel_returns_err() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let messages = vec![Ok(Message::Text("x".into()))];
        assert_eq!(
            process_message_stream(mock_stream(messages), &tx, ConnectionId::new(1), "test").await,
            Err(())
        );
    }
}

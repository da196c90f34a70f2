//! WebSocket transport to the controller.
//!
//! The controller speaks one JSON object per frame. [`connect`] performs the
//! handshake and hands back a [`FrameWriter`] / [`FrameReader`] pair for the
//! connection task's `tokio::select!` loop. The reader already reduces the
//! tungstenite message set to what the router cares about: a frame of text,
//! or the end of the connection.
//!
//! Nothing outside [`crate::connection`] uses this module.

use anyhow::{Context, Result};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::{self, client::IntoClientRequest};

use crate::constants::{DEFAULT_PORT, WS_PATH};

type Socket = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Close code reported when the peer closes without one.
const NO_STATUS_CODE: u16 = 1005;

/// What the reader produced.
#[derive(Debug, PartialEq, Eq)]
pub enum Inbound {
    /// One frame of text. Binary frames are decoded as lossy UTF-8.
    Frame(String),
    /// The controller sent a close frame.
    Closed {
        /// WebSocket close code.
        code: u16,
        /// Close reason, possibly empty.
        reason: String,
    },
}

/// Outbound half of the socket.
#[derive(Debug)]
pub struct FrameWriter {
    sink: SplitSink<Socket, tungstenite::Message>,
}

impl FrameWriter {
    /// Write one text frame.
    pub async fn send(&mut self, frame: &str) -> Result<()> {
        self.sink
            .send(tungstenite::Message::Text(frame.to_owned()))
            .await
            .context("Failed to write frame")
    }

    /// Start the closing handshake.
    pub async fn close(&mut self) -> Result<()> {
        self.sink
            .send(tungstenite::Message::Close(None))
            .await
            .context("Failed to send close frame")
    }
}

/// Inbound half of the socket.
#[derive(Debug)]
pub struct FrameReader {
    stream: SplitStream<Socket>,
}

impl FrameReader {
    /// Next frame or close notice; `None` once the socket is gone.
    ///
    /// Ping and pong frames never surface here; tungstenite answers pings
    /// on the next write or read.
    pub async fn recv(&mut self) -> Option<Result<Inbound>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(anyhow::Error::new(e).context("Failed to read frame"))),
            };
            if let Some(inbound) = reduce(message) {
                return Some(Ok(inbound));
            }
        }
    }
}

fn reduce(message: tungstenite::Message) -> Option<Inbound> {
    match message {
        tungstenite::Message::Text(text) => Some(Inbound::Frame(text)),
        tungstenite::Message::Binary(data) => {
            Some(Inbound::Frame(String::from_utf8_lossy(&data).into_owned()))
        }
        tungstenite::Message::Close(frame) => Some(match frame {
            Some(frame) => Inbound::Closed {
                code: frame.code.into(),
                reason: frame.reason.into_owned(),
            },
            None => Inbound::Closed {
                code: NO_STATUS_CODE,
                reason: String::new(),
            },
        }),
        tungstenite::Message::Ping(_)
        | tungstenite::Message::Pong(_)
        | tungstenite::Message::Frame(_) => None,
    }
}

/// Dial `url` and split the socket.
///
/// # Errors
///
/// Fails if `url` is not a WebSocket URL or the handshake fails.
pub async fn connect(url: &str) -> Result<(FrameWriter, FrameReader)> {
    let request = url
        .into_client_request()
        .with_context(|| format!("Invalid controller URL: {url}"))?;

    let (socket, _response) = tokio_tungstenite::connect_async(request)
        .await
        .with_context(|| format!("Failed to connect to {url}"))?;

    let (sink, stream) = socket.split();
    Ok((FrameWriter { sink }, FrameReader { stream }))
}

/// Rewrite an `http(s)://` URL to `ws(s)://`; WebSocket URLs pass through.
#[must_use]
pub fn http_to_ws_scheme(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        url.to_string()
    }
}

/// Well-known controller endpoint for a host: `ws://<host>:1506/ws`.
#[must_use]
pub fn endpoint_for_host(host: &str) -> String {
    format!("ws://{host}:{DEFAULT_PORT}{WS_PATH}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tungstenite::protocol::frame::coding::CloseCode;
    use tungstenite::protocol::CloseFrame;

    #[test]
    fn test_http_to_ws_scheme() {
        assert_eq!(
            http_to_ws_scheme("http://raspberrypi.local:1506/ws"),
            "ws://raspberrypi.local:1506/ws"
        );
        assert_eq!(http_to_ws_scheme("https://cnc.example/ws"), "wss://cnc.example/ws");
        assert_eq!(http_to_ws_scheme("ws://localhost:1506/ws"), "ws://localhost:1506/ws");
    }

    #[test]
    fn test_endpoint_for_host() {
        assert_eq!(endpoint_for_host("10.0.0.7"), "ws://10.0.0.7:1506/ws");
    }

    #[test]
    fn test_reduce_binary_is_lossy_text() {
        let frame = reduce(tungstenite::Message::Binary(b"{\"type\":\"x\"}\xff".to_vec()));
        assert_eq!(frame, Some(Inbound::Frame("{\"type\":\"x\"}\u{fffd}".to_string())));
    }

    #[test]
    fn test_reduce_skips_control_frames() {
        assert_eq!(reduce(tungstenite::Message::Ping(vec![1])), None);
        assert_eq!(reduce(tungstenite::Message::Pong(Vec::new())), None);
    }

    #[test]
    fn test_reduce_close() {
        assert_eq!(
            reduce(tungstenite::Message::Close(None)),
            Some(Inbound::Closed {
                code: 1005,
                reason: String::new()
            })
        );
        let frame = CloseFrame {
            code: CloseCode::Away,
            reason: "restarting".into(),
        };
        assert_eq!(
            reduce(tungstenite::Message::Close(Some(frame))),
            Some(Inbound::Closed {
                code: 1001,
                reason: "restarting".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_connect_invalid_url_returns_error() {
        assert!(connect("not-a-url").await.is_err());
    }

    #[tokio::test]
    async fn test_connect_unreachable_host_returns_error() {
        assert!(connect("ws://127.0.0.1:1/ws").await.is_err());
    }
}

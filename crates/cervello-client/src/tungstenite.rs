//! `tokio-tungstenite` implementation of the [`Connector`] port.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;
use url::Url;

use crate::connection::{Connector, Frame, NO_STATUS_RECEIVED, Socket};
use crate::error::ConnectError;

/// Dials real WebSocket endpoints.
#[derive(Debug, Default, Clone, Copy)]
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &Url) -> Result<Box<dyn Socket>, ConnectError> {
        let (stream, _) = connect_async(url.as_str())
            .await
            .map_err(|err| ConnectError::handshake(url.as_str(), err.to_string()))?;
        Ok(Box::new(TungsteniteSocket { stream }))
    }
}

struct TungsteniteSocket {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Socket for TungsteniteSocket {
    async fn send_text(&mut self, text: String) -> Result<(), ConnectError> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|err| ConnectError::transport(err.to_string()))
    }

    async fn next_frame(&mut self) -> Option<Result<Frame, ConnectError>> {
        while let Some(message) = self.stream.next().await {
            match message {
                Ok(Message::Text(text)) => return Some(Ok(Frame::Text(text.as_str().to_owned()))),
                Ok(Message::Close(frame)) => {
                    let code = frame.map_or(NO_STATUS_RECEIVED, |close| u16::from(close.code));
                    return Some(Ok(Frame::Close(code)));
                }
                Ok(Message::Binary(bytes)) => {
                    debug!(len = bytes.len(), "ignoring binary WebSocket frame");
                }
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
                Err(err) => return Some(Err(ConnectError::transport(err.to_string()))),
            }
        }
        None
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<(), ConnectError> {
        self.stream
            .close(Some(CloseFrame {
                code: CloseCode::from(code),
                reason: reason.to_owned().into(),
            }))
            .await
            .map_err(|err| ConnectError::transport(err.to_string()))
    }
}

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Sink, Stream};
use futures_util::StreamExt;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

pub type SocketSink = Pin<Box<dyn Sink<Message, Error = WsError> + Send>>;
pub type SocketStream = Pin<Box<dyn Stream<Item = Result<Message, WsError>> + Send>>;

/// Opens the socket for one connection attempt.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, request: Request) -> Result<(SocketSink, SocketStream), WsError>;
}

/// Connects over the network with tokio-tungstenite.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, request: Request) -> Result<(SocketSink, SocketStream), WsError> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(request).await?;
        let (write, read) = ws_stream.split();
        Ok((Box::pin(write), Box::pin(read)))
    }
}

mod client;
mod error;
pub mod playback;

pub use gesture_realtime_types as types;
pub use client::{
    connect, connect_with_config, Backoff, Client, Config, ConfigBuilder, ConfigError,
    ConnectionState, ConnectionStatus, Connector, ErrorInfo, ExponentialBackoff, FixedBackoff,
    Inbound, InboundRx, Notice, NoticeRx, Outbound, SendPolicy, SocketSink, SocketStream, Stats,
    WsConnector,
};
pub use error::{PlaybackError, TransportError};

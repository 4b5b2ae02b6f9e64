use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use gesture_realtime_types::events::client::{AudioChunkEvent, TextInputEvent, VideoFrameEvent};
use gesture_realtime_types::{ClientEvent, MessageKind};
use tokio::sync::{broadcast, mpsc, oneshot, watch};

use crate::client::session::{Command, Session};
use crate::error::TransportError;

mod backoff;
mod codec;
mod config;
mod connector;
mod consts;
mod dispatch;
mod outbox;
mod session;
mod state;
mod stats;
mod utils;

pub use backoff::{Backoff, ExponentialBackoff, FixedBackoff};
pub use codec::{Inbound, Outbound};
pub use config::{Config, ConfigBuilder, ConfigError, SendPolicy};
pub use connector::{Connector, SocketSink, SocketStream, WsConnector};
pub use dispatch::InboundRx;
pub use state::{ConnectionState, ConnectionStatus, ErrorInfo};
pub use stats::Stats;

/// Out-of-band events about the connection itself.
#[derive(Debug, Clone)]
pub enum Notice {
    StatusChanged(ConnectionState),
    /// The retry budget ran out. Sent once per exhausted run; only a manual
    /// `connect` starts a new one.
    ConnectionFailed { attempts: u32, error: ErrorInfo },
    /// An inbound message whose tag is missing or not recognised.
    UnknownMessage { tag: Option<String>, raw: String },
    /// An inbound message with a known tag whose fields did not parse.
    Malformed { kind: MessageKind, reason: String },
}

pub type NoticeRx = broadcast::Receiver<Notice>;

/// Handle to one logical connection with the translation backend.
///
/// The connection is driven by a background task spawned in
/// [`Client::new`], so a client must be created inside a tokio runtime.
/// Dropping the last handle shuts that task down and closes the socket.
pub struct Client {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    notices: broadcast::Sender<Notice>,
    epoch: Arc<AtomicU64>,
    stats: Arc<Mutex<Stats>>,
    capacity: usize,
}

impl Client {
    pub fn new(config: Config) -> Self {
        Self::with_connector(config, Arc::new(WsConnector))
    }

    pub fn with_connector(config: Config, connector: Arc<dyn Connector>) -> Self {
        let capacity = config.capacity();
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(ConnectionState::new());
        let (notices, _) = broadcast::channel(capacity);
        let epoch = Arc::new(AtomicU64::new(0));
        let stats = Arc::new(Mutex::new(Stats::new()));

        let session = Session::new(
            config,
            connector,
            commands_rx,
            state_tx,
            notices.clone(),
            epoch.clone(),
            stats.clone(),
        );
        tokio::spawn(session.run());

        Self {
            commands,
            state,
            notices,
            epoch,
            stats,
            capacity,
        }
    }

    fn command(&self, command: Command) -> Result<(), TransportError> {
        self.commands
            .send(command)
            .map_err(|_| TransportError::Closed)
    }

    /// Starts connecting unless already connecting or open. Resets the
    /// retry counter, so this is also how a failed connection is revived.
    pub fn connect(&self) -> Result<(), TransportError> {
        self.command(Command::Connect { ack: None })
    }

    /// Connects and waits until the connection is open or has failed.
    pub async fn open(&self) -> Result<(), TransportError> {
        let (ack, applied) = oneshot::channel();
        self.command(Command::Connect { ack: Some(ack) })?;
        applied.await.map_err(|_| TransportError::Closed)?;
        self.wait_until_open().await
    }

    /// Waits until the connection is open. Returns an error once it has
    /// failed or been disconnected.
    pub async fn wait_until_open(&self) -> Result<(), TransportError> {
        let mut changes = self.state.clone();
        let state = changes
            .wait_for(|s| match s.status() {
                ConnectionStatus::Open | ConnectionStatus::Failed => true,
                ConnectionStatus::Closed => !s.is_retry_pending(),
                ConnectionStatus::Connecting => false,
            })
            .await
            .map_err(|_| TransportError::Closed)?;

        match state.status() {
            ConnectionStatus::Open => Ok(()),
            ConnectionStatus::Failed => Err(TransportError::ConnectionFailed {
                attempts: state.attempt(),
                last_error: state
                    .last_error()
                    .cloned()
                    .unwrap_or_else(|| ErrorInfo::new("unknown error")),
            }),
            _ => Err(TransportError::NotConnected),
        }
    }

    /// Closes the connection and cancels any pending retry. A retry timer
    /// that fires after this call returns is ignored.
    pub fn disconnect(&self) -> Result<(), TransportError> {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.command(Command::Disconnect)
    }

    pub async fn send(&self, message: impl Into<Outbound>) -> Result<(), TransportError> {
        let (reply, result) = oneshot::channel();
        self.command(Command::Send {
            message: message.into(),
            reply,
        })?;
        result.await.map_err(|_| TransportError::Closed)?
    }

    pub async fn send_text(&self, text: &str) -> Result<(), TransportError> {
        let event = ClientEvent::TextInput(TextInputEvent::new(text));
        self.send(event).await
    }

    pub async fn send_video_frame(
        &self,
        frame: &[u8],
        context: Option<&str>,
    ) -> Result<(), TransportError> {
        let mut event = VideoFrameEvent::new(frame);
        if let Some(context) = context {
            event = event.with_context(context);
        }
        self.send(ClientEvent::VideoFrame(event)).await
    }

    pub async fn send_audio_chunk(
        &self,
        audio: &[u8],
        context: Option<&str>,
    ) -> Result<(), TransportError> {
        let mut event = AudioChunkEvent::new(audio);
        if let Some(context) = context {
            event = event.with_context(context);
        }
        self.send(ClientEvent::AudioChunk(event)).await
    }

    /// Sends raw bytes as a binary frame.
    pub async fn send_media(&self, bytes: Vec<u8>) -> Result<(), TransportError> {
        self.send(Outbound::Media(bytes)).await
    }

    /// Receives every inbound message of `kind` from now on, in arrival
    /// order. Subscriptions survive reconnects. The queue holds up to
    /// `Config::capacity` messages; while it is full, new messages of this
    /// kind are skipped for this subscriber and counted in `Stats::lagged`.
    pub fn subscribe(&self, kind: MessageKind) -> Result<InboundRx, TransportError> {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.command(Command::Subscribe { kind, tx })?;
        Ok(rx)
    }

    pub fn notices(&self) -> NoticeRx {
        self.notices.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn stats(&self) -> Stats {
        match self.stats.lock() {
            Ok(stats_guard) => stats_guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

pub async fn connect_with_config(config: Config) -> Result<Client, TransportError> {
    let client = Client::new(config);
    client.open().await?;
    Ok(client)
}

pub async fn connect() -> Result<Client, TransportError> {
    let config = Config::new();
    connect_with_config(config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use async_trait::async_trait;
    use futures::channel::mpsc as wire;
    use futures_util::{SinkExt, StreamExt};
    use gesture_realtime_types::ServerEvent;
    use mockall::predicate::eq;
    use tokio_tungstenite::tungstenite::handshake::client::Request;
    use tokio_tungstenite::tungstenite::{Error as WsError, Message};

    use crate::client::backoff::MockBackoff;

    enum Step {
        Refuse,
        Accept,
    }

    /// The far end of an accepted in-memory socket.
    struct Peer {
        from_client: wire::UnboundedReceiver<Message>,
        to_client: wire::UnboundedSender<Result<Message, WsError>>,
    }

    impl Peer {
        async fn next_text(&mut self) -> serde_json::Value {
            match self.from_client.next().await {
                Some(Message::Text(text)) => serde_json::from_str(&text).unwrap(),
                other => panic!("expected a text frame, got {:?}", other),
            }
        }

        fn push(&self, raw: &str) {
            self.to_client
                .unbounded_send(Ok(Message::Text(raw.to_string())))
                .unwrap();
        }
    }

    /// Answers each connection attempt from a script, refusing once it
    /// runs out.
    struct ScriptedConnector {
        steps: Mutex<VecDeque<Step>>,
        attempts: AtomicUsize,
        peers: mpsc::UnboundedSender<Peer>,
    }

    impl ScriptedConnector {
        fn new(steps: Vec<Step>) -> (Arc<Self>, mpsc::UnboundedReceiver<Peer>) {
            let (peers, peers_rx) = mpsc::unbounded_channel();
            let connector = Arc::new(Self {
                steps: Mutex::new(steps.into()),
                attempts: AtomicUsize::new(0),
                peers,
            });
            (connector, peers_rx)
        }

        fn then(&self, step: Step) {
            self.steps.lock().unwrap().push_back(step);
        }

        fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        async fn connect(&self, _request: Request) -> Result<(SocketSink, SocketStream), WsError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let step = self.steps.lock().unwrap().pop_front().unwrap_or(Step::Refuse);
            match step {
                Step::Refuse => Err(WsError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "connection refused",
                ))),
                Step::Accept => {
                    let (sink, from_client) = wire::unbounded();
                    let (to_client, stream) = wire::unbounded();
                    let _ = self.peers.send(Peer {
                        from_client,
                        to_client,
                    });
                    let sink = sink.sink_map_err(|_| WsError::ConnectionClosed);
                    Ok((Box::pin(sink), Box::pin(stream)))
                }
            }
        }
    }

    fn client(config: Config, connector: &Arc<ScriptedConnector>) -> Client {
        Client::with_connector(config, connector.clone())
    }

    async fn wait_for(client: &Client, condition: impl FnMut(&ConnectionState) -> bool) {
        client.state_changes().wait_for(condition).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_retry_budget() {
        let (connector, _peers) = ScriptedConnector::new(vec![]);
        let client = client(Config::builder().with_max_attempts(3).build(), &connector);
        let mut notices = client.notices();

        let result = client.open().await;
        assert!(matches!(
            result,
            Err(TransportError::ConnectionFailed { attempts: 3, .. })
        ));
        assert_eq!(connector.attempts(), 4);
        assert_eq!(client.state().status(), ConnectionStatus::Failed);
        assert_eq!(client.state().attempt(), 3);

        // No automatic attempts once failed.
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(connector.attempts(), 4);

        let mut failures = 0;
        while let Ok(notice) = notices.try_recv() {
            if let Notice::ConnectionFailed { attempts, error } = notice {
                assert_eq!(attempts, 3);
                assert!(error.message().contains("refused"));
                failures += 1;
            }
        }
        assert_eq!(failures, 1);

        connector.then(Step::Accept);
        client.open().await.unwrap();
        assert_eq!(client.state().attempt(), 0);
        assert_eq!(connector.attempts(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_fails_on_first_error() {
        let (connector, _peers) = ScriptedConnector::new(vec![]);
        let client = client(Config::builder().with_max_attempts(0).build(), &connector);
        assert!(client.open().await.is_err());
        assert_eq!(connector.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_buffered_messages_flush_before_live_ones() {
        let (connector, mut peers) = ScriptedConnector::new(vec![Step::Accept]);
        let client = client(Config::new(), &connector);

        client.send_text("queued one").await.unwrap();
        client.send_text("queued two").await.unwrap();
        client.open().await.unwrap();
        client.send_text("live").await.unwrap();

        let mut peer = peers.recv().await.unwrap();
        for expected in ["queued one", "queued two", "live"] {
            let value = peer.next_text().await;
            assert_eq!(value["type"], "text_input");
            assert_eq!(value["text"], expected);
        }
        assert_eq!(client.stats().sent(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_outbox_drops_oldest() {
        let (connector, mut peers) = ScriptedConnector::new(vec![Step::Accept]);
        let config = Config::builder()
            .with_send_policy(SendPolicy::Buffer { capacity: 2 })
            .build();
        let client = client(config, &connector);

        for text in ["a", "b", "c"] {
            client.send_text(text).await.unwrap();
        }
        client.open().await.unwrap();

        let mut peer = peers.recv().await.unwrap();
        assert_eq!(peer.next_text().await["text"], "b");
        assert_eq!(peer.next_text().await["text"], "c");
        assert_eq!(client.stats().dropped(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reject_policy() {
        let (connector, _peers) = ScriptedConnector::new(vec![]);
        let config = Config::builder()
            .with_send_policy(SendPolicy::Reject)
            .with_max_attempts(0)
            .build();
        let client = client(config, &connector);

        assert!(matches!(
            client.send_text("hello").await,
            Err(TransportError::NotConnected)
        ));

        let _ = client.open().await;
        assert!(matches!(
            client.send_media(vec![1, 2, 3]).await,
            Err(TransportError::ConnectionFailed { attempts: 0, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_routes_inbound_by_kind() {
        let (connector, mut peers) = ScriptedConnector::new(vec![Step::Accept]);
        let client = client(Config::new(), &connector);
        let mut translations = client.subscribe(MessageKind::Translation).unwrap();
        let mut errors = client.subscribe(MessageKind::Error).unwrap();
        let mut media = client.subscribe(MessageKind::Media).unwrap();
        client.open().await.unwrap();

        let peer = peers.recv().await.unwrap();
        peer.push(r#"{"type":"translation","text":"hello","confidence":0.9}"#);
        peer.push(r#"{"type":"error","message":"model unavailable"}"#);
        peer.push(r#"{"type":"translation","text":"world","confidence":0.8}"#);
        peer.to_client
            .unbounded_send(Ok(Message::Binary(vec![7, 7])))
            .unwrap();

        for expected in ["hello", "world"] {
            match translations.recv().await {
                Some(Inbound::Event(ServerEvent::Translation(event))) => {
                    assert_eq!(event.text(), expected)
                }
                other => panic!("expected a translation, got {:?}", other),
            }
        }
        match errors.recv().await {
            Some(Inbound::Event(ServerEvent::Error(event))) => {
                assert_eq!(event.message(), "model unavailable")
            }
            other => panic!("expected an error, got {:?}", other),
        }
        assert!(matches!(media.recv().await, Some(Inbound::Media(bytes)) if bytes == vec![7, 7]));
        assert_eq!(client.stats().received(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_subscriber_is_bounded() {
        let (connector, mut peers) = ScriptedConnector::new(vec![Step::Accept]);
        let client = client(Config::builder().with_capacity(2).build(), &connector);
        let mut translations = client.subscribe(MessageKind::Translation).unwrap();
        let mut errors = client.subscribe(MessageKind::Error).unwrap();
        client.open().await.unwrap();

        let peer = peers.recv().await.unwrap();
        for text in ["one", "two", "three", "four"] {
            peer.push(&format!(
                r#"{{"type":"translation","text":"{}","confidence":0.9}}"#,
                text
            ));
        }
        peer.push(r#"{"type":"error","message":"done"}"#);
        assert!(errors.recv().await.is_some());

        let mut texts = Vec::new();
        while let Ok(Inbound::Event(ServerEvent::Translation(event))) = translations.try_recv() {
            texts.push(event.text().to_string());
        }
        assert_eq!(texts, vec!["one", "two"]);
        assert_eq!(client.stats().lagged(), 2);
        assert!(client.state().is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_and_malformed_messages_are_reported() {
        let (connector, mut peers) = ScriptedConnector::new(vec![Step::Accept]);
        let client = client(Config::new(), &connector);
        let mut notices = client.notices();
        let mut translations = client.subscribe(MessageKind::Translation).unwrap();
        client.open().await.unwrap();

        let peer = peers.recv().await.unwrap();
        peer.push(r#"{"type":"threejs_scene","scene":{}}"#);
        peer.push(r#"{"type":"translation","confidence":"high"}"#);
        peer.push(r#"{"type":"translation","text":"still here","confidence":0.5}"#);

        assert!(translations.recv().await.is_some());

        let mut unknown = None;
        let mut malformed = None;
        while let Ok(notice) = notices.try_recv() {
            match notice {
                Notice::UnknownMessage { tag, .. } => unknown = tag,
                Notice::Malformed { kind, .. } => malformed = Some(kind),
                _ => {}
            }
        }
        assert_eq!(unknown.as_deref(), Some("threejs_scene"));
        assert_eq!(malformed, Some(MessageKind::Translation));
        assert_eq!(client.stats().undecodable(), 2);
        assert!(client.state().is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_after_drop_and_resends_queued() {
        let (connector, mut peers) = ScriptedConnector::new(vec![Step::Accept, Step::Accept]);
        let mut backoff = MockBackoff::new();
        backoff
            .expect_delay()
            .with(eq(0))
            .times(1)
            .returning(|_| Duration::from_millis(500));
        let config = Config::builder().with_backoff(backoff).build();
        let client = client(config, &connector);
        client.open().await.unwrap();

        drop(peers.recv().await.unwrap());
        wait_for(&client, |s| s.is_retry_pending()).await;
        client.send_text("during outage").await.unwrap();

        wait_for(&client, |s| s.is_open()).await;
        let mut peer = peers.recv().await.unwrap();
        assert_eq!(peer.next_text().await["text"], "during outage");
        assert_eq!(connector.attempts(), 2);
        assert_eq!(client.stats().opens(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_cancels_pending_retry() {
        let (connector, mut peers) = ScriptedConnector::new(vec![Step::Accept, Step::Accept]);
        let client = client(Config::new(), &connector);
        client.open().await.unwrap();

        drop(peers.recv().await.unwrap());
        wait_for(&client, |s| s.is_retry_pending()).await;
        client.disconnect().unwrap();

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(connector.attempts(), 1);
        assert_eq!(client.state().status(), ConnectionStatus::Closed);
        assert!(!client.state().is_retry_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_closes_socket() {
        let (connector, mut peers) = ScriptedConnector::new(vec![Step::Accept]);
        let client = client(Config::new(), &connector);
        client.open().await.unwrap();
        let mut peer = peers.recv().await.unwrap();

        client.disconnect().unwrap();
        assert!(peer.from_client.next().await.is_none());
        wait_for(&client, |s| s.status() == ConnectionStatus::Closed).await;
        assert!(matches!(
            client.wait_until_open().await,
            Err(TransportError::NotConnected)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_notices() {
        let (connector, _peers) = ScriptedConnector::new(vec![Step::Accept]);
        let client = client(Config::new(), &connector);
        let mut notices = client.notices();
        client.open().await.unwrap();

        let mut statuses = Vec::new();
        while let Ok(notice) = notices.try_recv() {
            if let Notice::StatusChanged(state) = notice {
                statuses.push(state.status());
            }
        }
        assert_eq!(
            statuses,
            vec![ConnectionStatus::Connecting, ConnectionStatus::Open]
        );
    }
}

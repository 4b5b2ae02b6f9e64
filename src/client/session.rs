use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use gesture_realtime_types::MessageKind;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::Sleep;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use crate::client::codec::{self, DecodeError, Frame, Outbound};
use crate::client::config::{Config, SendPolicy};
use crate::client::connector::{Connector, SocketSink, SocketStream};
use crate::client::dispatch::{Dispatcher, InboundTx};
use crate::client::outbox::Outbox;
use crate::client::state::{ConnectionState, ConnectionStatus, Effect, ErrorInfo, LinkEvent};
use crate::client::stats::Stats;
use crate::client::{utils, Notice};
use crate::error::TransportError;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

pub(crate) enum Command {
    /// `ack` fires once the request has been applied and published.
    Connect { ack: Option<oneshot::Sender<()>> },
    Disconnect,
    Send {
        message: Outbound,
        reply: oneshot::Sender<Result<(), TransportError>>,
    },
    Subscribe { kind: MessageKind, tx: InboundTx },
}

type Opening = BoxFuture<'static, Result<(SocketSink, SocketStream), WsError>>;

struct RetryTimer {
    sleep: Pin<Box<Sleep>>,
    /// Disconnect epoch when the timer was armed.
    epoch: u64,
}

/// The task that owns one logical connection.
///
/// All connection state lives here and is only changed by feeding
/// [`LinkEvent`]s through [`ConnectionState::apply`]. At most one socket
/// (open or opening) exists at any time.
pub(crate) struct Session {
    config: Config,
    connector: Arc<dyn Connector>,
    state: ConnectionState,
    commands: mpsc::UnboundedReceiver<Command>,
    state_tx: watch::Sender<ConnectionState>,
    notices: broadcast::Sender<Notice>,
    epoch: Arc<AtomicU64>,
    stats: Arc<Mutex<Stats>>,
    outbox: Outbox,
    dispatcher: Dispatcher,
    opening: Option<Opening>,
    sink: Option<SocketSink>,
    stream: Option<SocketStream>,
    retry: Option<RetryTimer>,
}

impl Session {
    pub(crate) fn new(
        config: Config,
        connector: Arc<dyn Connector>,
        commands: mpsc::UnboundedReceiver<Command>,
        state_tx: watch::Sender<ConnectionState>,
        notices: broadcast::Sender<Notice>,
        epoch: Arc<AtomicU64>,
        stats: Arc<Mutex<Stats>>,
    ) -> Self {
        let outbox_capacity = match config.send_policy() {
            SendPolicy::Buffer { capacity } => capacity,
            SendPolicy::Reject => 0,
        };
        Self {
            config,
            connector,
            state: ConnectionState::new(),
            commands,
            state_tx,
            notices,
            epoch,
            stats,
            outbox: Outbox::new(outbox_capacity),
            dispatcher: Dispatcher::default(),
            opening: None,
            sink: None,
            stream: None,
            retry: None,
        }
    }

    pub(crate) async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                opened = poll_opening(&mut self.opening) => self.on_opened(opened).await,
                frame = next_frame(&mut self.stream) => self.on_frame(frame).await,
                epoch = retry_elapsed(&mut self.retry) => self.on_retry_elapsed(epoch).await,
            }
        }
        self.close_socket().await;
        tracing::debug!("transport session shut down");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect { ack } => {
                self.process(LinkEvent::ConnectRequested).await;
                if let Some(ack) = ack {
                    let _ = ack.send(());
                }
            }
            Command::Disconnect => {
                tracing::info!("disconnecting from {}", self.config.url());
                self.process(LinkEvent::DisconnectRequested).await;
            }
            Command::Send { message, reply } => {
                let result = self.send(message).await;
                let _ = reply.send(result);
            }
            Command::Subscribe { kind, tx } => self.dispatcher.subscribe(kind, tx),
        }
    }

    /// Applies `event` and everything its effects lead to, publishing the
    /// state after each transition.
    async fn process(&mut self, event: LinkEvent) {
        let mut events = VecDeque::from([event]);
        while let Some(event) = events.pop_front() {
            let before = self.state.status();
            let effects = self.state.apply(event, self.config.max_attempts());
            for effect in effects {
                if let Some(next) = self.perform(effect).await {
                    events.push_back(next);
                }
            }
            self.publish(before);
        }
    }

    async fn perform(&mut self, effect: Effect) -> Option<LinkEvent> {
        match effect {
            Effect::OpenSocket => {
                self.close_socket().await;
                let request = match utils::build_request(&self.config) {
                    Ok(request) => request,
                    Err(e) => {
                        tracing::error!("failed to build request: {}", e);
                        return Some(LinkEvent::Dropped(ErrorInfo::new(e.to_string())));
                    }
                };
                tracing::debug!("opening socket to {}", self.config.url());
                let connector = self.connector.clone();
                self.opening = Some(Box::pin(async move { connector.connect(request).await }));
                None
            }
            Effect::CloseSocket => {
                self.close_socket().await;
                None
            }
            Effect::FlushOutbox => self.flush().await,
            Effect::ScheduleRetry { attempt } => {
                let delay = self.config.backoff().delay(attempt);
                tracing::warn!(
                    "connection lost, retry {} of {} in {:?}",
                    attempt + 1,
                    self.config.max_attempts(),
                    delay
                );
                self.retry = Some(RetryTimer {
                    sleep: Box::pin(tokio::time::sleep(delay)),
                    epoch: self.epoch.load(Ordering::SeqCst),
                });
                None
            }
            Effect::CancelRetry => {
                self.retry = None;
                None
            }
            Effect::NotifyFailed(error) => {
                tracing::error!(
                    "giving up on {} after {} retries: {}",
                    self.config.url(),
                    self.state.attempt(),
                    error
                );
                self.notify(Notice::ConnectionFailed {
                    attempts: self.state.attempt(),
                    error,
                });
                None
            }
        }
    }

    async fn on_opened(&mut self, opened: Result<(SocketSink, SocketStream), WsError>) {
        match opened {
            Ok((sink, stream)) => {
                tracing::info!("connected to {}", self.config.url());
                self.sink = Some(sink);
                self.stream = Some(stream);
                self.record(Stats::record_open);
                self.process(LinkEvent::Opened).await;
            }
            Err(e) => {
                tracing::warn!("failed to connect to {}: {}", self.config.url(), e);
                self.process(LinkEvent::Dropped(ErrorInfo::new(e.to_string())))
                    .await;
            }
        }
    }

    async fn on_frame(&mut self, frame: Option<Result<Message, WsError>>) {
        let message = match frame {
            None => {
                tracing::info!("connection closed by peer");
                self.process(LinkEvent::Dropped(ErrorInfo::new("connection closed by peer")))
                    .await;
                return;
            }
            Some(Err(e)) => {
                tracing::error!("failed to read message: {}", e);
                self.process(LinkEvent::Dropped(ErrorInfo::new(e.to_string())))
                    .await;
                return;
            }
            Some(Ok(message)) => message,
        };

        match codec::decode(message) {
            Ok(Frame::Inbound(inbound)) => {
                self.record(Stats::record_received);
                let kind = inbound.kind();
                let delivery = self.dispatcher.dispatch(inbound);
                if delivery.lagged > 0 {
                    tracing::warn!(
                        "{} subscribers too slow for {} message, dropped it",
                        delivery.lagged,
                        kind
                    );
                    if let Ok(mut stats_guard) = self.stats.lock() {
                        stats_guard.record_lagged(delivery.lagged);
                    } else {
                        tracing::error!("failed to update stats");
                    }
                }
            }
            Ok(Frame::Close(reason)) => {
                tracing::info!("connection closed: {:?}", reason);
                let reason = reason.unwrap_or_else(|| "no reason".to_string());
                self.process(LinkEvent::Dropped(ErrorInfo::new(format!(
                    "closed by server: {}",
                    reason
                ))))
                .await;
            }
            Ok(Frame::Control) => {}
            Err(DecodeError::Unknown { tag, raw }) => {
                tracing::warn!("unknown message type {:?}: {}", tag, raw);
                self.record(Stats::record_undecodable);
                self.notify(Notice::UnknownMessage { tag, raw });
            }
            Err(DecodeError::Malformed { kind, reason }) => {
                tracing::warn!("failed to deserialize {} message: {}", kind, reason);
                self.record(Stats::record_undecodable);
                self.notify(Notice::Malformed { kind, reason });
            }
        }
    }

    async fn on_retry_elapsed(&mut self, epoch: u64) {
        if epoch != self.epoch.load(Ordering::SeqCst) {
            tracing::debug!("discarding retry armed before a disconnect");
            return;
        }
        tracing::info!("reconnecting to {}", self.config.url());
        self.process(LinkEvent::RetryElapsed).await;
    }

    async fn send(&mut self, message: Outbound) -> Result<(), TransportError> {
        if self.state.is_open() {
            return match self.write(&message).await {
                Ok(()) => Ok(()),
                Err(TransportError::Serialize(e)) => Err(TransportError::Serialize(e)),
                Err(e) => {
                    tracing::error!("failed to send message: {}", e);
                    let buffered = matches!(self.config.send_policy(), SendPolicy::Buffer { .. });
                    if buffered {
                        self.buffer(message);
                    }
                    self.process(LinkEvent::Dropped(ErrorInfo::new(e.to_string())))
                        .await;
                    if buffered {
                        Ok(())
                    } else {
                        Err(e)
                    }
                }
            };
        }

        match self.config.send_policy() {
            SendPolicy::Buffer { .. } => {
                self.buffer(message);
                Ok(())
            }
            SendPolicy::Reject if self.state.status() == ConnectionStatus::Failed => {
                Err(TransportError::ConnectionFailed {
                    attempts: self.state.attempt(),
                    last_error: self
                        .state
                        .last_error()
                        .cloned()
                        .unwrap_or_else(|| ErrorInfo::new("unknown error")),
                })
            }
            SendPolicy::Reject => Err(TransportError::NotConnected),
        }
    }

    fn buffer(&mut self, message: Outbound) {
        if self.outbox.push(message).is_some() {
            tracing::warn!("outbox full, dropped the oldest queued message");
            self.record(Stats::record_dropped);
        }
    }

    async fn flush(&mut self) -> Option<LinkEvent> {
        if self.outbox.len() > 0 {
            tracing::debug!("flushing {} queued messages", self.outbox.len());
        }
        while let Some(message) = self.outbox.pop_front() {
            match self.write(&message).await {
                Ok(()) => {}
                Err(TransportError::Serialize(e)) => {
                    tracing::error!("failed to serialize queued message: {}", e);
                }
                Err(e) => {
                    self.outbox.push_front(message);
                    return Some(LinkEvent::Dropped(ErrorInfo::new(e.to_string())));
                }
            }
        }
        None
    }

    async fn write(&mut self, message: &Outbound) -> Result<(), TransportError> {
        let frame = codec::encode(message)?;
        let sink = self.sink.as_mut().ok_or(TransportError::NotConnected)?;
        sink.send(frame).await?;
        self.record(Stats::record_sent);
        Ok(())
    }

    async fn close_socket(&mut self) {
        self.opening = None;
        self.stream = None;
        if let Some(mut sink) = self.sink.take() {
            match tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await {
                Ok(Err(e)) => tracing::debug!("error while closing socket: {}", e),
                Err(_) => tracing::debug!("timed out closing socket"),
                Ok(Ok(())) => {}
            }
        }
    }

    fn publish(&mut self, before: ConnectionStatus) {
        self.state_tx.send_replace(self.state.clone());
        if self.state.status() != before {
            tracing::debug!("connection {:?} -> {:?}", before, self.state.status());
            self.notify(Notice::StatusChanged(self.state.clone()));
        }
    }

    fn notify(&self, notice: Notice) {
        if self.notices.send(notice).is_err() {
            tracing::trace!("no notice subscribers");
        }
    }

    fn record(&self, update: fn(&mut Stats)) {
        if let Ok(mut stats_guard) = self.stats.lock() {
            update(&mut stats_guard);
        } else {
            tracing::error!("failed to update stats");
        }
    }
}

async fn poll_opening(
    opening: &mut Option<Opening>,
) -> Result<(SocketSink, SocketStream), WsError> {
    match opening.as_mut() {
        Some(future) => {
            let result = future.await;
            *opening = None;
            result
        }
        None => std::future::pending().await,
    }
}

async fn next_frame(stream: &mut Option<SocketStream>) -> Option<Result<Message, WsError>> {
    match stream.as_mut() {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}

async fn retry_elapsed(retry: &mut Option<RetryTimer>) -> u64 {
    match retry.as_mut() {
        Some(timer) => {
            timer.sleep.as_mut().await;
            let epoch = timer.epoch;
            *retry = None;
            epoch
        }
        None => std::future::pending().await,
    }
}

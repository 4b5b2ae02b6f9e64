//! The connection state machine.
//!
//! [`ConnectionState::apply`] is a pure transition: it takes one
//! [`LinkEvent`], updates the state and returns the side effects the session
//! task must perform. Nothing here touches a socket or a timer.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Closed,
    Connecting,
    Open,
    Failed,
}

/// Why the last connection attempt or live connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    message: String,
}

impl ErrorInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionState {
    status: ConnectionStatus,
    attempt: u32,
    last_error: Option<ErrorInfo>,
    retry_pending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// The caller asked to connect. Always user-initiated.
    ConnectRequested,
    Opened,
    /// The socket failed to open, errored or was closed by the peer.
    Dropped(ErrorInfo),
    RetryElapsed,
    DisconnectRequested,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    OpenSocket,
    CloseSocket,
    FlushOutbox,
    /// Start the retry timer with the delay the backoff gives for `attempt`.
    ScheduleRetry { attempt: u32 },
    CancelRetry,
    /// The retry budget is spent. Emitted once per exhausted run.
    NotifyFailed(ErrorInfo),
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionState {
    pub fn new() -> Self {
        Self {
            status: ConnectionStatus::Closed,
            attempt: 0,
            last_error: None,
            retry_pending: false,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Retries made since the last successful open or manual connect.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn last_error(&self) -> Option<&ErrorInfo> {
        self.last_error.as_ref()
    }

    /// True while closed with a retry timer running.
    pub fn is_retry_pending(&self) -> bool {
        self.retry_pending
    }

    pub fn is_open(&self) -> bool {
        self.status == ConnectionStatus::Open
    }

    pub fn apply(&mut self, event: LinkEvent, max_attempts: u32) -> Vec<Effect> {
        match event {
            LinkEvent::ConnectRequested => match self.status {
                ConnectionStatus::Connecting | ConnectionStatus::Open => vec![],
                ConnectionStatus::Closed | ConnectionStatus::Failed => {
                    let mut effects = Vec::with_capacity(2);
                    if self.retry_pending {
                        effects.push(Effect::CancelRetry);
                    }
                    self.status = ConnectionStatus::Connecting;
                    self.attempt = 0;
                    self.last_error = None;
                    self.retry_pending = false;
                    effects.push(Effect::OpenSocket);
                    effects
                }
            },
            LinkEvent::Opened => match self.status {
                ConnectionStatus::Connecting => {
                    self.status = ConnectionStatus::Open;
                    self.attempt = 0;
                    self.last_error = None;
                    vec![Effect::FlushOutbox]
                }
                // A socket nobody is waiting for any more.
                _ => vec![Effect::CloseSocket],
            },
            LinkEvent::Dropped(error) => match self.status {
                ConnectionStatus::Connecting | ConnectionStatus::Open => {
                    self.status = ConnectionStatus::Closed;
                    self.last_error = Some(error.clone());
                    if self.attempt < max_attempts {
                        let attempt = self.attempt;
                        self.attempt += 1;
                        self.retry_pending = true;
                        vec![Effect::CloseSocket, Effect::ScheduleRetry { attempt }]
                    } else {
                        self.status = ConnectionStatus::Failed;
                        vec![Effect::CloseSocket, Effect::NotifyFailed(error)]
                    }
                }
                _ => vec![],
            },
            LinkEvent::RetryElapsed => {
                if self.status == ConnectionStatus::Closed && self.retry_pending {
                    self.status = ConnectionStatus::Connecting;
                    self.retry_pending = false;
                    vec![Effect::OpenSocket]
                } else {
                    vec![]
                }
            }
            LinkEvent::DisconnectRequested => {
                let mut effects = Vec::with_capacity(2);
                if self.retry_pending {
                    effects.push(Effect::CancelRetry);
                }
                if matches!(
                    self.status,
                    ConnectionStatus::Connecting | ConnectionStatus::Open
                ) {
                    effects.push(Effect::CloseSocket);
                }
                self.status = ConnectionStatus::Closed;
                self.retry_pending = false;
                effects
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dropped() -> LinkEvent {
        LinkEvent::Dropped(ErrorInfo::new("connection refused"))
    }

    #[test]
    fn test_connect_open_flushes() {
        let mut state = ConnectionState::new();
        assert_eq!(state.apply(LinkEvent::ConnectRequested, 3), vec![Effect::OpenSocket]);
        assert_eq!(state.status(), ConnectionStatus::Connecting);
        assert_eq!(state.apply(LinkEvent::ConnectRequested, 3), vec![]);
        assert_eq!(state.apply(LinkEvent::Opened, 3), vec![Effect::FlushOutbox]);
        assert!(state.is_open());
        assert_eq!(state.apply(LinkEvent::ConnectRequested, 3), vec![]);
    }

    #[test]
    fn test_retry_budget_then_single_failure_notice() {
        let mut state = ConnectionState::new();
        state.apply(LinkEvent::ConnectRequested, 3);

        let mut notices = 0;
        let mut retries = Vec::new();
        for _ in 0..4 {
            for effect in state.apply(dropped(), 3) {
                match effect {
                    Effect::ScheduleRetry { attempt } => retries.push(attempt),
                    Effect::NotifyFailed(_) => notices += 1,
                    _ => {}
                }
            }
            state.apply(LinkEvent::RetryElapsed, 3);
        }

        assert_eq!(retries, vec![0, 1, 2]);
        assert_eq!(notices, 1);
        assert_eq!(state.status(), ConnectionStatus::Failed);
        assert_eq!(state.attempt(), 3);
        assert_eq!(state.last_error().unwrap().message(), "connection refused");

        // Nothing more comes out of a failed connection on its own.
        assert_eq!(state.apply(dropped(), 3), vec![]);
        assert_eq!(state.apply(LinkEvent::RetryElapsed, 3), vec![]);
    }

    #[test]
    fn test_manual_connect_resets_attempt() {
        let mut state = ConnectionState::new();
        state.apply(LinkEvent::ConnectRequested, 0);
        state.apply(dropped(), 0);
        assert_eq!(state.status(), ConnectionStatus::Failed);

        assert_eq!(state.apply(LinkEvent::ConnectRequested, 0), vec![Effect::OpenSocket]);
        assert_eq!(state.attempt(), 0);
        assert_eq!(state.last_error(), None);
    }

    #[test]
    fn test_open_resets_attempt() {
        let mut state = ConnectionState::new();
        state.apply(LinkEvent::ConnectRequested, 3);
        state.apply(dropped(), 3);
        state.apply(LinkEvent::RetryElapsed, 3);
        assert_eq!(state.attempt(), 1);
        state.apply(LinkEvent::Opened, 3);
        assert_eq!(state.attempt(), 0);
    }

    #[test]
    fn test_disconnect_cancels_pending_retry() {
        let mut state = ConnectionState::new();
        state.apply(LinkEvent::ConnectRequested, 3);
        state.apply(LinkEvent::Opened, 3);
        assert_eq!(
            state.apply(dropped(), 3),
            vec![Effect::CloseSocket, Effect::ScheduleRetry { attempt: 0 }]
        );
        assert!(state.is_retry_pending());

        assert_eq!(state.apply(LinkEvent::DisconnectRequested, 3), vec![Effect::CancelRetry]);
        assert_eq!(state.apply(LinkEvent::RetryElapsed, 3), vec![]);
        assert_eq!(state.status(), ConnectionStatus::Closed);
    }

    #[test]
    fn test_manual_connect_while_waiting_to_retry() {
        let mut state = ConnectionState::new();
        state.apply(LinkEvent::ConnectRequested, 3);
        state.apply(dropped(), 3);
        assert_eq!(
            state.apply(LinkEvent::ConnectRequested, 3),
            vec![Effect::CancelRetry, Effect::OpenSocket]
        );
        assert_eq!(state.attempt(), 0);
    }

    #[test]
    fn test_stale_open_is_closed() {
        let mut state = ConnectionState::new();
        assert_eq!(state.apply(LinkEvent::Opened, 3), vec![Effect::CloseSocket]);
        assert_eq!(state.status(), ConnectionStatus::Closed);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Stats {
    sent: u64,
    received: u64,
    dropped: u64,
    undecodable: u64,
    lagged: u64,
    opens: u64,
}

impl Stats {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_sent(&mut self) {
        self.sent += 1;
    }

    pub(crate) fn record_received(&mut self) {
        self.received += 1;
    }

    pub(crate) fn record_dropped(&mut self) {
        self.dropped += 1;
    }

    pub(crate) fn record_undecodable(&mut self) {
        self.undecodable += 1;
    }

    pub(crate) fn record_lagged(&mut self, missed: usize) {
        self.lagged += missed as u64;
    }

    pub(crate) fn record_open(&mut self) {
        self.opens += 1;
    }

    /// Frames written to the socket.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Inbound messages decoded and dispatched.
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Outbound messages evicted from a full outbox.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Inbound frames that were unknown or malformed.
    pub fn undecodable(&self) -> u64 {
        self.undecodable
    }

    /// Inbound deliveries skipped because a subscriber's queue was full.
    pub fn lagged(&self) -> u64 {
        self.lagged
    }

    /// Successful socket opens, including reconnects.
    pub fn opens(&self) -> u64 {
        self.opens
    }
}

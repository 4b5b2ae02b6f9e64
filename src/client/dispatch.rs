use std::collections::HashMap;

use gesture_realtime_types::MessageKind;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::client::codec::Inbound;

pub type InboundTx = mpsc::Sender<Inbound>;
pub type InboundRx = mpsc::Receiver<Inbound>;

/// Outcome of routing one message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Delivery {
    pub(crate) delivered: usize,
    /// Subscribers whose queue was full, so they missed this message.
    pub(crate) lagged: usize,
}

/// Routes parsed inbound messages to the subscribers of their kind.
///
/// Delivery happens on the session task in arrival order, so each
/// subscriber sees its kind in the order the socket produced it. Each
/// subscriber queue is bounded; a subscriber that falls behind misses
/// messages instead of holding them all in memory.
#[derive(Default)]
pub(crate) struct Dispatcher {
    subscribers: HashMap<MessageKind, Vec<InboundTx>>,
}

impl Dispatcher {
    pub(crate) fn subscribe(&mut self, kind: MessageKind, tx: InboundTx) {
        self.subscribers.entry(kind).or_default().push(tx);
    }

    /// Subscribers whose receiver was dropped are forgotten.
    pub(crate) fn dispatch(&mut self, message: Inbound) -> Delivery {
        let kind = message.kind();
        let mut delivery = Delivery::default();
        let Some(subscribers) = self.subscribers.get_mut(&kind) else {
            tracing::debug!("no subscribers for {}", kind);
            return delivery;
        };
        subscribers.retain(|tx| match tx.try_send(message.clone()) {
            Ok(()) => {
                delivery.delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                delivery.lagged += 1;
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });
        delivery
    }
}

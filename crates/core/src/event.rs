//! Events multiplexed by the aggregator's event loop

use crate::action::ActionEvent;
use crate::delivery::{ServerId, StreamId, StreamIo};
use std::fmt;
use tokio::sync::mpsc;

/// Work items queued for the event loop
pub enum LoopEvent {
    /// Run the coalesced regeneration task
    Regenerate,
    /// Inbound user action parsed by a stream
    Action(ActionEvent),
    /// A listening socket accepted a new consumer
    Accepted {
        server: ServerId,
        peer: String,
        io: StreamIo,
    },
    /// A stream ended for good (EOF, retries exhausted or not reconnectable)
    StreamClosed(StreamId),
    /// A listening socket stopped accepting
    ServerClosed(ServerId),
    /// Nothing left to serve, or an explicit quit request
    Quit,
}

impl fmt::Debug for LoopEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopEvent::Regenerate => f.write_str("Regenerate"),
            LoopEvent::Action(event) => f.debug_tuple("Action").field(event).finish(),
            LoopEvent::Accepted { server, peer, .. } => f
                .debug_struct("Accepted")
                .field("server", server)
                .field("peer", peer)
                .finish(),
            LoopEvent::StreamClosed(id) => f.debug_tuple("StreamClosed").field(id).finish(),
            LoopEvent::ServerClosed(id) => f.debug_tuple("ServerClosed").field(id).finish(),
            LoopEvent::Quit => f.write_str("Quit"),
        }
    }
}

pub type LoopSender = mpsc::UnboundedSender<LoopEvent>;
pub type LoopReceiver = mpsc::UnboundedReceiver<LoopEvent>;

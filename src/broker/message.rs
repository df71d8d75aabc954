//! Messages exchanged with a shard actor's mailbox (spec §9: "Cross-shard
//! broadcast is naturally a message-passing pattern: each shard exposes a
//! deliver(event, sourceShardId) RPC").

use axum::extract::ws::Message;
use nostr::Event;
use tokio::sync::mpsc;

use crate::query::filter::VendorFilter;

pub type ShardId = String;
pub type SessionId = String;

/// An outbound WebSocket message destined for one session's writer task.
pub type Outbound = mpsc::Sender<Message>;

pub enum ShardCommand {
    Register {
        session_id: SessionId,
        outbound: Outbound,
    },
    Unregister {
        session_id: SessionId,
    },
    Subscribe {
        session_id: SessionId,
        sub_id: String,
        filters: Vec<VendorFilter>,
    },
    Unsubscribe {
        session_id: SessionId,
        sub_id: String,
    },
    /// A locally-accepted event: match against local sessions, then fan out
    /// one `Deliver` to every sibling shard.
    Publish {
        event: Box<Event>,
        tags: Vec<Vec<String>>,
    },
    /// An event broadcast by a sibling shard: match against local sessions
    /// only, never re-broadcast (spec §4.9: "does not re-broadcast, no
    /// two-hop").
    Deliver {
        event: Box<Event>,
        tags: Vec<Vec<String>>,
        source_shard: ShardId,
    },
}

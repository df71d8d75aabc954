//! C9 — regional broker: one long-lived actor per shard, owning the live
//! sessions homed on it (spec §4.9). Each shard is a `tokio::spawn`'d task
//! with an `mpsc` mailbox rather than a networked service — an in-process
//! simplification of the spec's message-passing RPC, licensed by its own
//! framing of shard identity as "configuration" (spec §9).

pub mod message;
pub mod router;

use std::collections::HashMap;

use axum::extract::ws::Message;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::broker::message::{Outbound, SessionId, ShardCommand, ShardId};
use crate::query::filter::VendorFilter;
use crate::ws::protocol::event_frame;

const MAILBOX_CAPACITY: usize = 1024;

struct SessionEntry {
    outbound: Outbound,
    subs: HashMap<String, Vec<VendorFilter>>,
}

struct ShardActor {
    id: ShardId,
    inbox: mpsc::Receiver<ShardCommand>,
    siblings: Vec<(ShardId, mpsc::Sender<ShardCommand>)>,
    sessions: HashMap<SessionId, SessionEntry>,
}

impl ShardActor {
    fn dispatch_to_local_sessions(&mut self, event: &nostr::Event, tags: &[Vec<String>]) {
        for entry in self.sessions.values() {
            for (sub_id, filters) in &entry.subs {
                if filters.iter().any(|f| f.matches_event(event, tags)) {
                    let _ = entry.outbound.try_send(Message::Text(event_frame(sub_id, event)));
                    break;
                }
            }
        }
    }

    async fn run(mut self) {
        while let Some(cmd) = self.inbox.recv().await {
            match cmd {
                ShardCommand::Register { session_id, outbound } => {
                    self.sessions.insert(session_id, SessionEntry { outbound, subs: HashMap::new() });
                }
                ShardCommand::Unregister { session_id } => {
                    self.sessions.remove(&session_id);
                }
                ShardCommand::Subscribe { session_id, sub_id, filters } => {
                    if let Some(entry) = self.sessions.get_mut(&session_id) {
                        entry.subs.insert(sub_id, filters);
                    }
                }
                ShardCommand::Unsubscribe { session_id, sub_id } => {
                    if let Some(entry) = self.sessions.get_mut(&session_id) {
                        entry.subs.remove(&sub_id);
                    }
                }
                ShardCommand::Publish { event, tags } => {
                    self.dispatch_to_local_sessions(&event, &tags);
                    for (sibling_id, sender) in &self.siblings {
                        let deliver = ShardCommand::Deliver {
                            event: event.clone(),
                            tags: tags.clone(),
                            source_shard: self.id.clone(),
                        };
                        if sender.try_send(deliver).is_err() {
                            warn!(shard = %self.id, sibling = %sibling_id, "dropped cross-shard broadcast: sibling mailbox full or gone");
                        }
                    }
                }
                ShardCommand::Deliver { event, tags, source_shard } => {
                    debug!(shard = %self.id, from = %source_shard, event = %event.id, "delivering cross-shard event");
                    self.dispatch_to_local_sessions(&event, &tags);
                }
            }
        }
    }
}

#[derive(Clone)]
pub struct ShardHandle {
    pub id: ShardId,
    sender: mpsc::Sender<ShardCommand>,
}

impl ShardHandle {
    pub async fn register(&self, session_id: SessionId, outbound: Outbound) {
        let _ = self.sender.send(ShardCommand::Register { session_id, outbound }).await;
    }

    pub async fn unregister(&self, session_id: SessionId) {
        let _ = self.sender.send(ShardCommand::Unregister { session_id }).await;
    }

    pub async fn subscribe(&self, session_id: SessionId, sub_id: String, filters: Vec<VendorFilter>) {
        let _ = self.sender.send(ShardCommand::Subscribe { session_id, sub_id, filters }).await;
    }

    pub async fn unsubscribe(&self, session_id: SessionId, sub_id: String) {
        let _ = self.sender.send(ShardCommand::Unsubscribe { session_id, sub_id }).await;
    }

    pub async fn publish(&self, event: nostr::Event, tags: Vec<Vec<String>>) {
        let _ = self.sender.send(ShardCommand::Publish { event: Box::new(event), tags }).await;
    }
}

/// Owns every shard actor and the handles used to reach them.
#[derive(Clone)]
pub struct Broker {
    shards: HashMap<ShardId, ShardHandle>,
}

impl Broker {
    /// Spawns one actor per shard id, wiring each one's `siblings` list to
    /// every other shard's mailbox sender so `Publish` can fan out.
    pub fn spawn(shard_ids: &[&str]) -> Self {
        let mut senders = HashMap::new();
        let mut receivers = HashMap::new();
        for id in shard_ids {
            let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
            senders.insert(id.to_string(), tx);
            receivers.insert(id.to_string(), rx);
        }

        let mut shards = HashMap::new();
        for id in shard_ids {
            let id = id.to_string();
            let inbox = receivers.remove(&id).expect("receiver exists for every declared shard id");
            let siblings: Vec<(ShardId, mpsc::Sender<ShardCommand>)> =
                senders.iter().filter(|(sid, _)| **sid != id).map(|(sid, tx)| (sid.clone(), tx.clone())).collect();

            let actor = ShardActor {
                id: id.clone(),
                inbox,
                siblings,
                sessions: HashMap::new(),
            };
            tokio::spawn(actor.run());

            shards.insert(id.clone(), ShardHandle { sender: senders[&id].clone(), id });
        }

        Broker { shards }
    }

    pub fn shard(&self, id: &str) -> Option<ShardHandle> {
        self.shards.get(id).cloned()
    }

    pub fn shard_ids(&self) -> Vec<&str> {
        self.shards.keys().map(|s| s.as_str()).collect()
    }
}

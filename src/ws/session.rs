//! C8 — subscription engine: per-connection state and the EVENT/REQ/CLOSE
//! dispatch logic (spec §4.8). One session owns its token buckets and talks
//! to its home shard through [`ShardHandle`] messages rather than shared
//! state, matching the single-writer-per-session model (spec §5).

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket};
use futures::{sink::SinkExt, stream::StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::warn;

use crate::broker::ShardHandle;
use crate::error::RelayError;
use crate::event::classify::ReplaceableClass;
use crate::event::{classify_kind, validator};
use crate::query;
use crate::query::filter::VendorFilter;
use crate::state::AppState;
use crate::ws::protocol::{self, ClientFrame};
use crate::ws::ratelimit::TokenBucket;

const OUTBOUND_MAILBOX_CAPACITY: usize = 256;
const HEARTBEAT_INTERVAL: std::time::Duration = std::time::Duration::from_secs(30);

async fn send_text(outbound: &mpsc::Sender<Message>, text: String) {
    let _ = outbound.send(Message::Text(text)).await;
}

/// Runs one WebSocket connection end to end: registers with its shard,
/// spawns the outbound writer and heartbeat tasks, then loops over inbound
/// frames until the socket closes.
pub async fn run(socket: WebSocket, state: AppState, shard: ShardHandle) {
    let session_id = nanoid::nanoid!();
    let (mut sink, mut stream) = socket.split();

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Message>(OUTBOUND_MAILBOX_CAPACITY);

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            if sink.send(msg).await.is_err() {
                break;
            }
        }
    });

    let heartbeat_tx = outbound_tx.clone();
    let mut heartbeat_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(HEARTBEAT_INTERVAL);
        loop {
            interval.tick().await;
            if heartbeat_tx.send(Message::Ping(Vec::new())).await.is_err() {
                break;
            }
        }
    });

    shard.register(session_id.clone(), outbound_tx.clone()).await;

    let mut subscriptions: HashMap<String, Vec<VendorFilter>> = HashMap::new();
    let mut event_bucket = TokenBucket::new(state.config.event_bucket_rate_per_sec, state.config.event_bucket_capacity);
    let mut req_bucket = TokenBucket::new(state.config.req_bucket_rate_per_sec, state.config.req_bucket_capacity);

    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                handle_text(
                    &text,
                    &state,
                    &shard,
                    &session_id,
                    &outbound_tx,
                    &mut subscriptions,
                    &mut event_bucket,
                    &mut req_bucket,
                )
                .await;
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(session = %session_id, error = %e, "websocket read error");
                break;
            }
        }
    }

    shard.unregister(session_id).await;
    send_task.abort();
    heartbeat_task.abort();
}

async fn handle_text(
    text: &str,
    state: &AppState,
    shard: &ShardHandle,
    session_id: &str,
    outbound: &mpsc::Sender<Message>,
    subscriptions: &mut HashMap<String, Vec<VendorFilter>>,
    event_bucket: &mut TokenBucket,
    req_bucket: &mut TokenBucket,
) {
    let frame = match protocol::parse_frame(text) {
        Ok(f) => f,
        Err(e) => {
            send_text(outbound, protocol::notice_frame(&e.wire_reason())).await;
            return;
        }
    };

    match frame {
        ClientFrame::Event(event) => {
            handle_event(*event, state, shard, outbound, event_bucket).await;
        }
        ClientFrame::Req { sub_id, filters } => {
            handle_req(sub_id, filters, state, shard, session_id, outbound, subscriptions, req_bucket).await;
        }
        ClientFrame::Close { sub_id } => {
            subscriptions.remove(&sub_id);
            shard.unsubscribe(session_id.to_string(), sub_id.clone()).await;
            send_text(outbound, protocol::closed_frame(&sub_id, "closed by client")).await;
        }
    }
}

const EVENT_RATE_EXEMPT: &str = "event";

async fn handle_event(
    event: nostr::Event,
    state: &AppState,
    shard: &ShardHandle,
    outbound: &mpsc::Sender<Message>,
    event_bucket: &mut TokenBucket,
) {
    let exempt = state.config.rate_limit_exempt_kinds().contains(&event.kind.as_u64());
    if !exempt && !event_bucket.try_consume() {
        let reason = RelayError::RateLimited(EVENT_RATE_EXEMPT).wire_reason();
        send_text(outbound, protocol::ok_frame(event.id, false, &reason)).await;
        return;
    }

    if let Err(e) = validator::validate_event(&event, &state.config, state.store.pool()).await {
        send_text(outbound, protocol::ok_frame(event.id, false, &e.wire_reason())).await;
        return;
    }

    let is_deletion = classify_kind(event.kind.as_u64()) == ReplaceableClass::Deletion;
    let result = if is_deletion {
        state.store.accept_deletion(&event).await
    } else {
        state.store.accept_event(&event).await
    };

    match result {
        Ok(()) => {
            send_text(outbound, protocol::ok_frame(event.id, true, "")).await;
            let tags: Vec<Vec<String>> = event.tags.iter().map(|t| t.as_vec()).collect();
            shard.publish(event, tags).await;
        }
        // accept_deletion persists the deletion event even when some of its
        // targets were unauthorized; report that, but the event itself is
        // still broadcast like any other accepted event.
        Err(RelayError::UnauthorizedDelete(target)) => {
            let reason = RelayError::UnauthorizedDelete(target).wire_reason();
            send_text(outbound, protocol::ok_frame(event.id, false, &reason)).await;
            let tags: Vec<Vec<String>> = event.tags.iter().map(|t| t.as_vec()).collect();
            shard.publish(event, tags).await;
        }
        Err(e) => {
            send_text(outbound, protocol::ok_frame(event.id, false, &e.wire_reason())).await;
        }
    }
}

async fn handle_req(
    sub_id: String,
    raw_filters: Vec<Value>,
    state: &AppState,
    shard: &ShardHandle,
    session_id: &str,
    outbound: &mpsc::Sender<Message>,
    subscriptions: &mut HashMap<String, Vec<VendorFilter>>,
    req_bucket: &mut TokenBucket,
) {
    if !req_bucket.try_consume() {
        let reason = RelayError::RateLimited("req").wire_reason();
        send_text(outbound, protocol::closed_frame(&sub_id, &reason)).await;
        return;
    }

    let mut parsed = Vec::with_capacity(raw_filters.len());
    for raw in &raw_filters {
        match VendorFilter::from_json(raw) {
            Ok(f) => parsed.push(f),
            Err(e) => {
                send_text(outbound, protocol::closed_frame(&sub_id, &e.wire_reason())).await;
                return;
            }
        }
        if let Err(e) = parsed.last().unwrap().validate_caps() {
            send_text(outbound, protocol::closed_frame(&sub_id, &e.wire_reason())).await;
            return;
        }
    }

    let mut cursor_to_send: Option<String> = None;
    for (filter, raw) in parsed.iter().zip(raw_filters.iter()) {
        match query::execute(state.store.pool(), &*state.blob_store, &state.config, filter, raw).await {
            Ok(result) => {
                for event in &result.events {
                    send_text(outbound, protocol::event_frame(&sub_id, event)).await;
                }
                if let Some(cursor) = result.cursor {
                    cursor_to_send = Some(cursor);
                }
            }
            Err(e) => {
                send_text(outbound, protocol::closed_frame(&sub_id, &e.wire_reason())).await;
                return;
            }
        }
    }

    send_text(outbound, protocol::eose_frame(&sub_id)).await;
    if let Some(cursor) = cursor_to_send {
        send_text(outbound, protocol::vcursor_frame(&sub_id, &cursor)).await;
    }

    subscriptions.insert(sub_id.clone(), parsed.clone());
    shard.subscribe(session_id.to_string(), sub_id, parsed).await;
}

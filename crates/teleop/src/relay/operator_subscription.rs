// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator-facing subscription runners (spec §4.4). Camera, location and
//! view subscriptions are receive-only, mirroring `handleSubscribeCamera`/
//! `handleSubscribeLocation` in the original: no reader task exists at
//! all, so a dead peer is only discovered when a write fails. The control
//! subscription is the one duplex case (`communicateWithVehicle`), and
//! additionally assigns the command timing id operators expect to see
//! echoed back in command latency metrics.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::relay::Relay;
use crate::protocol::{BackendMessage, BackendPayload, ListenerCategory};
use crate::timing;

/// Drive a receive-only operator subscription until the socket closes or
/// is cancelled. `camera_filter`, when set, drops frames for any other
/// device name (spec §4.4's per-camera subscribe).
pub async fn run_receive_only(
    relay: Arc<Relay>,
    category: ListenerCategory,
    camera_filter: Option<String>,
    min_interval: Duration,
    mut socket: WebSocket,
) {
    let cancel = CancellationToken::new();
    let mut handle = relay.listen(category, cancel.clone());
    let mut last_sent = tokio::time::Instant::now() - min_interval;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            msg = handle.rx.recv() => {
                let Some(msg) = msg else { break };
                if let Some(filter) = &camera_filter {
                    if let crate::protocol::VehiclePayload::Frame(frame) = &msg.payload {
                        if &frame.device != filter {
                            continue;
                        }
                    }
                }
                let now = tokio::time::Instant::now();
                if now.duration_since(last_sent) < min_interval {
                    continue;
                }
                let Ok(text) = serde_json::to_string(&msg) else { continue };
                if socket.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
                last_sent = now;
            }
        }
    }

    relay.unlisten(&handle.id);
}

/// Drive the duplex control subscription: operator joystick commands
/// forward to the vehicle with a rate limit; vehicle acknowledgements and
/// docking updates forward back to the operator.
pub async fn run_control(relay: Arc<Relay>, min_interval: Duration, socket: WebSocket) {
    let cancel = CancellationToken::new();
    let mut handle = relay.listen(ListenerCategory::Control, cancel.clone());
    let (mut sink, mut stream) = socket.split();
    let mut last_sent = tokio::time::Instant::now() - min_interval;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            inbound = handle.rx.recv() => {
                let Some(msg) = inbound else { break };
                let Ok(text) = serde_json::to_string(&msg) else { continue };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        let now = tokio::time::Instant::now();
                        if now.duration_since(last_sent) < min_interval {
                            continue;
                        }
                        let Ok(payload) = serde_json::from_str::<BackendPayload>(&text) else { continue };
                        let id = Uuid::new_v4().to_string();
                        timing::start(&id);
                        relay.submit_to_vehicle(BackendMessage { id, payload });
                        last_sent = now;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    cancel.cancel();
    relay.unlisten(&handle.id);
}

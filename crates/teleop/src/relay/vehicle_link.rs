// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The duplex pair bound to one vehicle websocket (spec §4.3): a read
//! task that categorizes and fans out inbound envelopes, a write task
//! that drains the outbound queue, and the bookkeeping state transitions
//! that follow a closed transport.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::relay::Relay;
use crate::protocol::{BackendMessage, VehicleMessage, VehiclePayload};
use crate::storage::model::{dummy_camera, CameraSample, LocationSample, SessionStatus};
use crate::storage::Storage;
use crate::timing;

/// Bounded outbound capacity (spec §3): a full queue drops rather than
/// blocks, and 3 gives the write loop enough slack to drain transient bursts.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 3;

/// How the vehicle transport ended, distinguishing a clean close (normal
/// WS close frame) from a network-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectKind {
    Normal,
    Abnormal,
}

impl DisconnectKind {
    pub fn session_status(self) -> SessionStatus {
        match self {
            DisconnectKind::Normal => SessionStatus::Offline,
            DisconnectKind::Abnormal => SessionStatus::NetworkDrop,
        }
    }
}

/// The duplex pair bound to one vehicle transport. Owned exclusively by
/// its Relay (spec §3); the read/write loops live in free functions
/// spawned by [`VehicleLink::run`] rather than as methods tangled with a
/// back-pointer to the Relay, breaking the cyclic-ownership pattern the
/// original code used (spec §9).
pub struct VehicleLink {
    outbound_tx: mpsc::Sender<BackendMessage>,
    pub cancel: CancellationToken,
}

impl VehicleLink {
    /// Non-blocking enqueue; drops (with a log event) if the queue is full.
    /// Called only through `Relay::submit_to_vehicle`.
    pub(super) fn try_send(&self, msg: BackendMessage) -> bool {
        self.outbound_tx.try_send(msg).is_ok()
    }

    #[cfg(test)]
    pub(super) fn for_test(outbound_tx: mpsc::Sender<BackendMessage>) -> Self {
        Self { outbound_tx, cancel: CancellationToken::new() }
    }

    /// Bind a freshly accepted vehicle websocket to `relay` and drive it
    /// to completion. Returns once the transport closes; the caller is
    /// responsible for persisting the resulting `SessionStatus`.
    pub async fn run(
        relay: Arc<Relay>,
        vehicle_id: String,
        session_id: String,
        storage: Arc<dyn Storage>,
        grace_window: std::time::Duration,
        socket: WebSocket,
    ) -> DisconnectKind {
        let cancel = CancellationToken::new();
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        let link = Arc::new(VehicleLink { outbound_tx, cancel: cancel.clone() });

        relay.bind_vehicle(Arc::clone(&link));
        metrics::counter!(crate::metrics::names::VEHICLE_CONNECTS_TOTAL).increment(1);

        let (sink, mut stream) = socket.split();

        let write_cancel = cancel.clone();
        let write_task =
            tokio::spawn(async move { write_loop(sink, outbound_rx, write_cancel).await });

        let mut got_manifest = false;
        let read_kind = read_loop(
            &relay,
            &vehicle_id,
            &session_id,
            &storage,
            &mut stream,
            &cancel,
            &mut got_manifest,
        )
        .await;

        cancel.cancel();
        let write_kind = write_task.await.unwrap_or(None);
        let kind = read_kind.or(write_kind).unwrap_or(DisconnectKind::Normal);

        relay.on_vehicle_state_change(&link, kind, &storage, grace_window).await;
        metrics::counter!(crate::metrics::names::VEHICLE_DISCONNECTS_TOTAL).increment(1);
        kind
    }
}

/// Read loop: decode, categorize, apply side effects, fan out. Returns
/// `Some(kind)` if the transport closed (the common exit); `None` if
/// cancelled externally (vehicle rebind or process shutdown) before any
/// close was observed locally.
async fn read_loop(
    relay: &Arc<Relay>,
    vehicle_id: &str,
    session_id: &str,
    storage: &Arc<dyn Storage>,
    stream: &mut futures_util::stream::SplitStream<WebSocket>,
    cancel: &CancellationToken,
    got_manifest: &mut bool,
) -> Option<DisconnectKind> {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return None,
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Binary(bytes))) => {
                        let Ok(msg) = serde_json::from_slice::<VehicleMessage>(&bytes) else {
                            tracing::debug!(%session_id, "failed to decode vehicle envelope");
                            continue;
                        };
                        apply_side_effects(&msg, vehicle_id, session_id, storage, got_manifest);
                        let category = msg.payload.category();
                        relay.deliver_from_vehicle(category, msg);
                    }
                    Some(Ok(Message::Close(_))) => return Some(DisconnectKind::Normal),
                    Some(Ok(_)) => {} // ping/pong/text ignored on the vehicle transport
                    Some(Err(_)) => return Some(DisconnectKind::Abnormal),
                    None => return Some(DisconnectKind::Normal),
                }
            }
        }
    }
}

/// Side effects are fire-and-forget (spec §4.3 expansion): they never
/// block the read loop, mirroring the original's best-effort goroutines.
fn apply_side_effects(
    msg: &VehicleMessage,
    vehicle_id: &str,
    session_id: &str,
    storage: &Arc<dyn Storage>,
    got_manifest: &mut bool,
) {
    match &msg.payload {
        VehiclePayload::Frame(frame) => {
            if !*got_manifest {
                let storage = Arc::clone(storage);
                let vehicle_id = vehicle_id.to_owned();
                tokio::spawn(async move {
                    let _ = storage.set_cameras(&vehicle_id, vec![dummy_camera()]).await;
                    let _ = storage.create_vehicle(&vehicle_id).await;
                });
                *got_manifest = true;
            }
            let sample = CameraSample {
                camera: frame.device.clone(),
                timestamp_ns: crate::storage::model::epoch_ms() * 1_000_000,
                data: frame.content.clone(),
            };
            let storage = Arc::clone(storage);
            let vehicle_id = vehicle_id.to_owned();
            tokio::spawn(async move {
                if storage.save_frame(&vehicle_id, sample).await.is_err() {
                    metrics::counter!(crate::metrics::names::MESSAGES_DROPPED_TOTAL, "reason" => "storage_failure").increment(1);
                }
            });
        }
        VehiclePayload::Gps(gps) => {
            let sample = LocationSample {
                latitude: gps.latitude,
                longitude: gps.longitude,
                heading: gps.heading,
                timestamp_ns: crate::storage::model::epoch_ms() * 1_000_000,
            };
            let storage = Arc::clone(storage);
            let session_id = session_id.to_owned();
            tokio::spawn(async move {
                let _ = storage.save_location(&session_id, sample).await;
            });
        }
        VehiclePayload::Manifest(manifest) => {
            let storage = Arc::clone(storage);
            let vehicle_id = vehicle_id.to_owned();
            let cameras = manifest.cameras.clone();
            tokio::spawn(async move {
                let _ = storage.set_cameras(&vehicle_id, cameras).await;
                let _ = storage.create_vehicle(&vehicle_id).await;
            });
            *got_manifest = true;
        }
        _ => {}
    }
}

/// Write loop: drain the outbound queue, close the timing record, send.
async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::Receiver<BackendMessage>,
    cancel: CancellationToken,
) -> Option<DisconnectKind> {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                return None;
            }
            msg = outbound_rx.recv() => {
                match msg {
                    Some(msg) => {
                        timing::finish(&msg.id, "vehicle");
                        let Ok(bytes) = serde_json::to_vec(&msg) else { continue };
                        if sink.send(Message::Binary(bytes.into())).await.is_err() {
                            return Some(DisconnectKind::Abnormal);
                        }
                    }
                    None => return None,
                }
            }
        }
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One operator's registration for one message category on one Relay
//! (spec §3 Listener, §4.2 `listen`/`unlisten`).

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::protocol::VehicleMessage;

pub type ListenerId = String;

/// Listener channels are capacity 1 (spec §3): a slow operator misses
/// frames rather than back-pressuring the vehicle.
pub const LISTENER_CAPACITY: usize = 1;

/// The Relay-owned half of a listener registration.
pub struct Listener {
    pub id: ListenerId,
    tx: mpsc::Sender<VehicleMessage>,
    pub cancel: CancellationToken,
}

impl Listener {
    /// Non-blocking delivery. Returns `false` (and drops the message) if
    /// the channel is full, per spec invariant 4.
    pub fn try_send(&self, msg: VehicleMessage) -> bool {
        self.tx.try_send(msg).is_ok()
    }
}

/// The operator-task-owned half, returned from `Relay::listen`.
pub struct ListenerHandle {
    pub id: ListenerId,
    pub rx: mpsc::Receiver<VehicleMessage>,
    pub cancel: CancellationToken,
}

/// Allocate a fresh listener id and capacity-1 channel.
pub fn new_listener(cancel: CancellationToken) -> (Listener, ListenerHandle) {
    let id = Uuid::new_v4().to_string();
    let (tx, rx) = mpsc::channel(LISTENER_CAPACITY);
    (
        Listener { id: id.clone(), tx, cancel: cancel.clone() },
        ListenerHandle { id, rx, cancel },
    )
}

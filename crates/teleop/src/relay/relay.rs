// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-vehicle fan-out hub (spec §3, §4.2): one bound `VehicleLink`,
//! a set of `Listener`s keyed by category, and the reconnect-grace state
//! machine that decides when a dropped vehicle's listeners get killed.
//!
//! Grounded on `relay.go`'s `relay` struct, generalized from its
//! hand-rolled mutex-and-map bookkeeping to the channel/token primitives
//! idiomatic in async Rust.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::listener::{new_listener, Listener, ListenerHandle};
use super::vehicle_link::{DisconnectKind, VehicleLink};
use crate::protocol::{BackendMessage, ListenerCategory, VehicleMessage};
use crate::storage::model::SessionStatus;
use crate::storage::Storage;

#[derive(Default)]
struct Inner {
    vehicle: Option<Arc<VehicleLink>>,
    listeners: HashMap<ListenerCategory, HashMap<String, Listener>>,
    /// Cancelled to wake a pending grace-timer early, e.g. when the
    /// vehicle reconnects before the window elapses.
    grace_cancel: Option<CancellationToken>,
}

/// One vehicle's relay. Lives in the `RelayRegistry` for the lifetime of
/// the session id; outlives any single `VehicleLink` or `Listener`.
pub struct Relay {
    pub session_id: String,
    inner: Mutex<Inner>,
}

impl Relay {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self { session_id: session_id.into(), inner: Mutex::new(Inner::default()) }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Bind a freshly connected vehicle transport, displacing whatever was
    /// bound before and waking any pending grace timer so it does not kill
    /// listeners out from under the new connection.
    pub fn bind_vehicle(&self, link: Arc<VehicleLink>) {
        let mut inner = self.lock();
        if let Some(previous) = inner.vehicle.replace(link) {
            previous.cancel.cancel();
        }
        if let Some(grace) = inner.grace_cancel.take() {
            grace.cancel();
        }
    }

    /// True while a vehicle transport is bound; an observability hook for
    /// health checks and tests (spec §9 design note), not used to gate
    /// message delivery internally.
    pub fn has_bound_vehicle(&self) -> bool {
        self.lock().vehicle.is_some()
    }

    /// Register a new listener for `category`. The caller drives
    /// `ListenerHandle` to completion and calls `unlisten` on exit.
    pub fn listen(&self, category: ListenerCategory, cancel: CancellationToken) -> ListenerHandle {
        let (listener, handle) = new_listener(cancel);
        let mut inner = self.lock();
        inner.listeners.entry(category).or_default().insert(listener.id.clone(), listener);
        metrics::gauge!(crate::metrics::names::LISTENERS_ACTIVE).increment(1.0);
        handle
    }

    /// Remove a listener by id, scanning every category bucket since the
    /// caller only knows the id it was handed.
    pub fn unlisten(&self, listener_id: &str) {
        let mut inner = self.lock();
        for bucket in inner.listeners.values_mut() {
            if bucket.remove(listener_id).is_some() {
                metrics::gauge!(crate::metrics::names::LISTENERS_ACTIVE).decrement(1.0);
            }
        }
    }

    /// Fan a vehicle-originated message out to every listener registered
    /// for its category. `Drop` messages are a pure side-effect channel
    /// (manifest updates) with no listener bucket.
    pub fn deliver_from_vehicle(&self, category: ListenerCategory, msg: VehicleMessage) {
        if category == ListenerCategory::Drop {
            return;
        }
        let inner = self.lock();
        let Some(bucket) = inner.listeners.get(&category) else { return };
        for listener in bucket.values() {
            if !listener.try_send(msg.clone()) {
                metrics::counter!(
                    crate::metrics::names::MESSAGES_DROPPED_TOTAL,
                    "reason" => "listener_full"
                )
                .increment(1);
            }
        }
    }

    /// Enqueue a message for delivery to the bound vehicle. Drops (with a
    /// metric) if no vehicle is bound or its outbound queue is full.
    pub fn submit_to_vehicle(&self, msg: BackendMessage) -> bool {
        let link = self.lock().vehicle.clone();
        match link {
            Some(link) if link.try_send(msg) => true,
            Some(_) => {
                metrics::counter!(
                    crate::metrics::names::MESSAGES_DROPPED_TOTAL,
                    "reason" => "vehicle_queue_full"
                )
                .increment(1);
                false
            }
            None => {
                metrics::counter!(
                    crate::metrics::names::MESSAGES_DROPPED_TOTAL,
                    "reason" => "no_vehicle"
                )
                .increment(1);
                false
            }
        }
    }

    /// Cancel every listener across every category, waking their tasks so
    /// they unwind and call `unlisten`.
    pub fn kill_listeners(&self) {
        let inner = self.lock();
        for bucket in inner.listeners.values() {
            for listener in bucket.values() {
                listener.cancel.cancel();
            }
        }
    }

    /// React to `link`'s transport closing. The Go original's
    /// `setVehicle`/`clearVehicle` pair carried a documented hazard: a
    /// stale connection's teardown could clear a replacement that had
    /// already bound. Guarding on `Arc::ptr_eq` here closes that hole —
    /// a disconnect notification only clears state if `link` is still
    /// the bound link.
    pub async fn on_vehicle_state_change(
        self: &Arc<Self>,
        link: &Arc<VehicleLink>,
        kind: DisconnectKind,
        storage: &Arc<dyn Storage>,
        grace_window: Duration,
    ) {
        let still_bound = {
            let mut inner = self.lock();
            let still_bound = matches!(&inner.vehicle, Some(current) if Arc::ptr_eq(current, link));
            if still_bound {
                inner.vehicle = None;
            }
            still_bound
        };
        if !still_bound {
            return;
        }

        let _ = storage.update_session_status(&self.session_id, kind.session_status()).await;

        if let Ok(Some(controller)) = storage.user_in_control(&self.session_id).await {
            tracing::info!(session_id = %self.session_id, %controller, ?kind, "vehicle disconnected while under control");
        }

        match kind {
            DisconnectKind::Normal => {
                self.kill_listeners();
            }
            DisconnectKind::Abnormal => {
                let grace = CancellationToken::new();
                self.lock().grace_cancel = Some(grace.clone());
                let relay = Arc::clone(self);
                tokio::spawn(async move {
                    tokio::select! {
                        _ = grace.cancelled() => {}
                        _ = tokio::time::sleep(grace_window) => {
                            relay.kill_listeners();
                        }
                    }
                });
            }
        }
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide map from session id to `Relay` (spec §3). Grounded on
//! `transport/ws.rs`'s `get_or_create_bridge` double-checked locking.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::relay::Relay;

#[derive(Default)]
pub struct RelayRegistry {
    relays: RwLock<HashMap<String, Arc<Relay>>>,
}

impl RelayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, session_id: &str) -> Option<Arc<Relay>> {
        self.relays.read().await.get(session_id).cloned()
    }

    /// Return the existing relay for `session_id`, creating one on first
    /// use. A read-lock fast path avoids contending the write lock once
    /// the registry is warm.
    pub async fn get_or_create(&self, session_id: &str) -> Arc<Relay> {
        if let Some(relay) = self.get(session_id).await {
            return relay;
        }
        let mut relays = self.relays.write().await;
        if let Some(relay) = relays.get(session_id) {
            return relay.clone();
        }
        let relay = Arc::new(Relay::new(session_id));
        relays.insert(session_id.to_owned(), relay.clone());
        metrics::gauge!(crate::metrics::names::SESSIONS_ACTIVE).increment(1.0);
        relay
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared application state handed to every axum handler (spec §6.3
//! expansion). Analogous to the teacher's `MuxState`, generalized to hold
//! the relay registry and the Storage/AuthProvider collaborators instead
//! of PTY session bookkeeping.

use std::sync::Arc;

use crate::auth::AuthProvider;
use crate::config::RelayConfig;
use crate::relay::RelayRegistry;
use crate::storage::Storage;

#[derive(Clone)]
pub struct AppState {
    pub relays: Arc<RelayRegistry>,
    pub storage: Arc<dyn Storage>,
    pub auth: Arc<dyn AuthProvider>,
    pub config: Arc<RelayConfig>,
}

impl AppState {
    pub fn new(
        storage: Arc<dyn Storage>,
        auth: Arc<dyn AuthProvider>,
        config: RelayConfig,
    ) -> Self {
        Self {
            relays: Arc::new(RelayRegistry::new()),
            storage,
            auth,
            config: Arc::new(config),
        }
    }
}

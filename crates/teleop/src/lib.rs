// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Teleop relay: backend of a teleoperation platform. Multiplexes one
//! vehicle connection against many concurrent operator connections,
//! routes typed messages between them with per-category fan-out, tracks
//! vehicle/session lifecycle across disconnect and reconnect, and
//! mediates WebRTC signaling between operator and vehicle.

pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;
pub mod protocol;
pub mod relay;
pub mod state;
pub mod storage;
pub mod timing;
pub mod transport;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::auth::hmac::HmacAuth;
use crate::auth::AuthProvider;
use crate::config::RelayConfig;
use crate::state::AppState;
use crate::storage::memory::InMemoryStorage;
use crate::storage::Storage;

/// Run the relay server until shutdown.
pub async fn run(config: RelayConfig) -> anyhow::Result<()> {
    metrics::install(&config.host, config.metrics_port)?;

    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
    let auth: Arc<dyn AuthProvider> = Arc::new(HmacAuth::new(&config.signing_key_bytes()));

    let addr = format!("{}:{}", config.host, config.port);
    let shutdown = CancellationToken::new();
    let state = AppState::new(storage, auth, config);

    let router = transport::build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "teleop relay listening");
    axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await?;

    Ok(())
}

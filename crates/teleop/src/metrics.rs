// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide metrics recorder. Installed once at startup; every other
//! module records through the `metrics` facade macros directly.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Installs the global Prometheus recorder and serves `/metrics` on
/// `port`. A `port` of 0 disables the exporter entirely; callers still
/// record through the `metrics` facade, which becomes a no-op.
pub fn install(host: &str, port: u16) -> anyhow::Result<()> {
    if port == 0 {
        tracing::info!("metrics exporter disabled (metrics_port=0)");
        return Ok(());
    }
    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(%addr, "metrics exporter listening");
    Ok(())
}

pub mod names {
    pub const SESSIONS_ACTIVE: &str = "teleop_sessions_active";
    pub const VEHICLE_CONNECTS_TOTAL: &str = "teleop_vehicle_connects_total";
    pub const VEHICLE_DISCONNECTS_TOTAL: &str = "teleop_vehicle_disconnects_total";
    pub const LISTENERS_ACTIVE: &str = "teleop_listeners_active";
    pub const MESSAGES_DROPPED_TOTAL: &str = "teleop_messages_dropped_total";
    pub const COMMAND_LATENCY_SECONDS: &str = "teleop_command_latency_seconds";
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket upgrade handlers (spec §6.3). Each handler validates the
//! request, obtains (or creates) the session's Relay, and spawns the
//! appropriate relay-side runner for the connection's lifetime.

use std::time::Duration;

use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use super::extract::{AuthenticatedPrincipal, VehicleSession};
use super::http::require_controller;
use crate::error::ApiError;
use crate::protocol::ListenerCategory;
use crate::relay::VehicleLink;
use crate::state::AppState;
use crate::storage::model::SessionStatus;

/// Shared query shape for receive-only subscriptions: an optional
/// minimum spacing between outbound frames (spec §4.4).
#[derive(Debug, Deserialize)]
pub struct IntervalQuery {
    #[serde(default)]
    pub interval_ms: u64,
}

impl IntervalQuery {
    fn duration(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// `WS /ws/vehicle/{vid}/register` — opens the vehicle transport bound
/// to the session named by the `teleop_session` cookie.
pub async fn register_vehicle(
    State(state): State<AppState>,
    VehicleSession(session_id): VehicleSession,
    Path(vehicle_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let session = state.storage.get_session(&session_id).await?;
    if session.vehicle_id != vehicle_id {
        return Err(ApiError::unauthorized("session does not belong to this vehicle"));
    }

    let relay = state.relays.get_or_create(&session_id).await;
    let storage = state.storage.clone();
    let grace_window = state.config.grace_window();
    state.storage.update_session_status(&session_id, SessionStatus::Active).await?;

    Ok(ws
        .on_upgrade(move |socket| async move {
            VehicleLink::run(relay, vehicle_id, session_id, storage, grace_window, socket).await;
        })
        .into_response())
}

async fn active_relay(state: &AppState, session_id: &str) -> Result<std::sync::Arc<crate::relay::Relay>, ApiError> {
    if !state.storage.vehicle_is_active(session_id).await? {
        return Err(ApiError::new(crate::error::AppError::VehicleInactive, "vehicle is not active"));
    }
    Ok(state.relays.get_or_create(session_id).await)
}

/// `WS /ws/vehicle/{sid}/camera/{cam}/subscribe`.
pub async fn subscribe_camera(
    State(state): State<AppState>,
    AuthenticatedPrincipal(_principal): AuthenticatedPrincipal,
    Path((session_id, camera)): Path<(String, String)>,
    Query(interval): Query<IntervalQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let relay = active_relay(&state, &session_id).await?;
    let filter = (camera != "all").then_some(camera);
    let min_interval = interval.duration();
    Ok(ws
        .on_upgrade(move |socket| async move {
            crate::relay::operator_subscription::run_receive_only(
                relay,
                ListenerCategory::Camera,
                filter,
                min_interval,
                socket,
            )
            .await;
        })
        .into_response())
}

/// `WS /ws/vehicle/{sid}/location/subscribe`.
pub async fn subscribe_location(
    State(state): State<AppState>,
    AuthenticatedPrincipal(_principal): AuthenticatedPrincipal,
    Path(session_id): Path<String>,
    Query(interval): Query<IntervalQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let relay = active_relay(&state, &session_id).await?;
    let min_interval = interval.duration();
    Ok(ws
        .on_upgrade(move |socket| async move {
            crate::relay::operator_subscription::run_receive_only(
                relay,
                ListenerCategory::Location,
                None,
                min_interval,
                socket,
            )
            .await;
        })
        .into_response())
}

/// `WS /ws/vehicle/{sid}/subscribe` — Control category, gated by
/// controller-authority middleware.
pub async fn subscribe_control(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path(session_id): Path<String>,
    Query(interval): Query<IntervalQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    require_controller(&state, &session_id, &principal).await?;
    let relay = active_relay(&state, &session_id).await?;
    let min_interval = interval.duration();
    Ok(ws
        .on_upgrade(move |socket| async move {
            crate::relay::operator_subscription::run_control(relay, min_interval, socket).await;
        })
        .into_response())
}

/// `WS /ws/vehicle/{sid}/view` — View category, receive-only.
pub async fn subscribe_view(
    State(state): State<AppState>,
    AuthenticatedPrincipal(_principal): AuthenticatedPrincipal,
    Path(session_id): Path<String>,
    Query(interval): Query<IntervalQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let relay = active_relay(&state, &session_id).await?;
    let min_interval = interval.duration();
    Ok(ws
        .on_upgrade(move |socket| async move {
            crate::relay::operator_subscription::run_receive_only(
                relay,
                ListenerCategory::View,
                None,
                min_interval,
                socket,
            )
            .await;
        })
        .into_response())
}

/// `WS /ws/vehicle/{sid}/user/{clid}/subscribe` — WebRTC signaling.
pub async fn subscribe_webrtc(
    State(state): State<AppState>,
    AuthenticatedPrincipal(_principal): AuthenticatedPrincipal,
    Path((session_id, client_id)): Path<(String, String)>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let relay = active_relay(&state, &session_id).await?;
    let storage = state.storage.clone();
    Ok(ws
        .on_upgrade(move |socket| async move {
            crate::relay::signaling::run(relay, storage, session_id, client_id, socket).await;
        })
        .into_response())
}

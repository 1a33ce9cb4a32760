// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP + WebSocket transport for the teleop relay.

pub mod extract;
pub mod http;
pub mod ws;

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the axum `Router` with every route spec §6.3 defines.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/vehicle/auth", post(http::vehicle_auth))
        .route("/ws/vehicle/{vid}/register", get(ws::register_vehicle))
        .route("/ws/vehicle/{sid}/camera/{cam}/subscribe", get(ws::subscribe_camera))
        .route("/ws/vehicle/{sid}/location/subscribe", get(ws::subscribe_location))
        .route("/ws/vehicle/{sid}/subscribe", get(ws::subscribe_control))
        .route("/ws/vehicle/{sid}/view", get(ws::subscribe_view))
        .route("/ws/vehicle/{sid}/user/{clid}/subscribe", get(ws::subscribe_webrtc))
        .route("/vehicle/{sid}/request-control", get(http::request_control))
        .route("/vehicle/{sid}/relinquish-control", get(http::relinquish_control))
        .route("/vehicles", get(http::list_vehicles))
        .route("/vehicle/{sid}", get(http::get_session))
        .route("/vehicle/{vid}/camera/{cid}", get(http::camera_samples))
        .route("/api/v1/vehicle/generate", post(http::generate_vehicle_token))
        .route("/api/v1/vehicle/token/{vid}/validate", put(http::validate_vehicle_token))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

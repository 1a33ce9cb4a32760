// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plain HTTP handlers: vehicle auth, controller arbitration, session and
//! camera queries, and the vehicle token admin endpoints (spec §6.3 and
//! its `[EXPANSION]`).

use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::extract::{AuthenticatedPrincipal, SESSION_COOKIE};
use crate::error::ApiError;
use crate::state::AppState;
use crate::storage::model::{Session, SessionStatus, TokenState};

const SESSION_TTL: Duration = Duration::from_secs(5 * 60 * 60);

#[derive(Debug, Deserialize)]
pub struct VehicleAuthRequest {
    pub vehicle_id: String,
    pub token: String,
}

/// `POST /vehicle/auth` (public). Mints a fresh session id bound to the
/// vehicle and sets it as a cookie; the vehicle presents this cookie
/// when opening its WS register connection.
pub async fn vehicle_auth(
    State(state): State<AppState>,
    Json(body): Json<VehicleAuthRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.auth.verify_vehicle_token(&body.vehicle_id, &body.token) {
        return Err(ApiError::unauthorized("invalid vehicle token"));
    }
    if state.storage.token_state(&body.vehicle_id).await? == TokenState::Invalid {
        return Err(ApiError::unauthorized("vehicle token has been invalidated"));
    }

    let session_id = uuid::Uuid::new_v4().to_string();
    state.storage.register_vehicle(&session_id, &body.vehicle_id).await?;

    let cookie = format!(
        "{SESSION_COOKIE}={session_id}; Max-Age={}; Path=/; HttpOnly; SameSite=Lax",
        SESSION_TTL.as_secs()
    );
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&cookie).map_err(|_| ApiError::bad_request("invalid cookie value"))?,
    );
    Ok((headers, Json(serde_json::json!({ "sessionId": session_id }))))
}

/// `GET /vehicle/{sid}/request-control`.
pub async fn request_control(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.storage.promote_to_controller(&session_id, &principal.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /vehicle/{sid}/relinquish-control`.
pub async fn relinquish_control(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let current = state.storage.user_in_control(&session_id).await?;
    if current.as_deref() == Some(principal.id.as_str()) {
        state.storage.remove_controller(&session_id).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ListVehiclesQuery {
    #[serde(default)]
    pub state: Option<SessionStatus>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    100
}

/// `GET /vehicles?state=&limit=&offset=`.
pub async fn list_vehicles(
    State(state): State<AppState>,
    AuthenticatedPrincipal(_principal): AuthenticatedPrincipal,
    Query(query): Query<ListVehiclesQuery>,
) -> Result<Json<Vec<Session>>, ApiError> {
    let sessions = state.storage.list_sessions(query.state, query.limit, query.offset).await?;
    Ok(Json(sessions))
}

/// `GET /vehicle/{sid}`.
pub async fn get_session(
    State(state): State<AppState>,
    AuthenticatedPrincipal(_principal): AuthenticatedPrincipal,
    Path(session_id): Path<String>,
) -> Result<Json<Session>, ApiError> {
    Ok(Json(state.storage.get_session(&session_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct CameraSamplesQuery {
    #[serde(default)]
    pub latest: bool,
    #[serde(default)]
    pub since: Option<u64>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct CameraSampleView {
    pub camera: String,
    pub timestamp_ns: u64,
    pub data: String,
}

/// `GET /vehicle/{vid}/camera/{cid}?latest=true | since=<unix-ns> | limit=<n>`.
pub async fn camera_samples(
    State(state): State<AppState>,
    AuthenticatedPrincipal(_principal): AuthenticatedPrincipal,
    Path((vehicle_id, camera_id)): Path<(String, String)>,
    Query(query): Query<CameraSamplesQuery>,
) -> Result<Json<Vec<CameraSampleView>>, ApiError> {
    let limit = if query.latest { None } else { query.limit };
    let since = if query.latest { None } else { query.since };
    let samples = state.storage.camera_samples_since(&vehicle_id, &camera_id, since, limit).await?;
    let samples: Vec<_> = if query.latest {
        samples.into_iter().next_back().into_iter().collect()
    } else {
        samples
    };

    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    Ok(Json(
        samples
            .into_iter()
            .map(|s| CameraSampleView {
                camera: s.camera,
                timestamp_ns: s.timestamp_ns,
                data: STANDARD.encode(s.data),
            })
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
pub struct GenerateVehicleTokenRequest {
    pub vehicle_id: String,
}

#[derive(Debug, Serialize)]
pub struct GenerateVehicleTokenResponse {
    pub vehicle_id: String,
    pub token: String,
}

/// `POST /api/v1/vehicle/generate` — admin-only mint of a fresh vehicle
/// token, left `Pending` until explicitly validated.
pub async fn generate_vehicle_token(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Json(body): Json<GenerateVehicleTokenRequest>,
) -> Result<Json<GenerateVehicleTokenResponse>, ApiError> {
    if !principal.is_admin {
        return Err(ApiError::unauthorized("admin only"));
    }
    let token = state.auth.mint_vehicle_token(&body.vehicle_id);
    state.storage.set_token_state(&body.vehicle_id, TokenState::Pending).await?;
    Ok(Json(GenerateVehicleTokenResponse { vehicle_id: body.vehicle_id, token }))
}

#[derive(Debug, Deserialize)]
pub struct ValidateVehicleTokenRequest {
    pub active: bool,
}

/// `PUT /api/v1/vehicle/token/{vid}/validate` — admin activates or
/// invalidates a previously generated token.
pub async fn validate_vehicle_token(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path(vehicle_id): Path<String>,
    Json(body): Json<ValidateVehicleTokenRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !principal.is_admin {
        return Err(ApiError::unauthorized("admin only"));
    }
    let state_value = if body.active { TokenState::Active } else { TokenState::Invalid };
    state.storage.set_token_state(&vehicle_id, state_value).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Rejects with 403 unless `principal` is admin or currently in control
/// of `session_id` (spec §6.3's controller-authority middleware).
pub async fn require_controller(
    state: &AppState,
    session_id: &str,
    principal: &crate::auth::Principal,
) -> Result<(), ApiError> {
    if principal.is_admin {
        return Ok(());
    }
    let controller = state.storage.user_in_control(session_id).await?;
    if controller.as_deref() == Some(principal.id.as_str()) {
        Ok(())
    } else {
        Err(ApiError::forbidden("not in control"))
    }
}

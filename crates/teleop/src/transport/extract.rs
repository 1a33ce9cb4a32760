// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Principal and session extraction from request headers. No cookie
//! crate is in the dependency set (none of the pack repos pull one in
//! for this shape of problem), so cookies are parsed by hand from the
//! `Cookie` header, same as reading any other delimited header value.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::auth::Principal;
use crate::error::ApiError;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "teleop_session";
pub const USER_COOKIE: &str = "teleop_user";

/// Find `name`'s value in the request's `Cookie` header, if present.
pub fn cookie(parts: &Parts, name: &str) -> Option<String> {
    let header = parts.headers.get(axum::http::header::COOKIE)?.to_str().ok()?;
    header.split(';').find_map(|pair| {
        let (k, v) = pair.trim().split_once('=')?;
        (k == name).then(|| v.to_owned())
    })
}

/// The raw vehicle session id read from the `teleop_session` cookie,
/// used by `/ws/vehicle/{vid}/register`. Unlike the operator principal,
/// this value is opaque and unsigned: it is itself the registry key
/// minted by `POST /vehicle/auth`.
pub struct VehicleSession(pub String);

impl<S> FromRequestParts<S> for VehicleSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        cookie(parts, SESSION_COOKIE)
            .map(VehicleSession)
            .ok_or_else(|| ApiError::unauthorized("missing session cookie"))
    }
}

/// The authenticated operator or admin calling an HTTP or WS endpoint.
/// Resolved from a Bearer `Authorization` header, falling back to the
/// `teleop_user` cookie for browser-originated WebSocket upgrades (which
/// cannot set custom headers).
pub struct AuthenticatedPrincipal(pub Principal);

impl FromRequestParts<AppState> for AuthenticatedPrincipal {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let credential = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::to_owned)
            .or_else(|| cookie(parts, USER_COOKIE))
            .ok_or_else(|| ApiError::unauthorized("missing credential"))?;

        state.auth.authenticate(&credential).map(AuthenticatedPrincipal)
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Transient status of a Session, surfaced via Storage but owned by the
/// Relay's state machine (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Inactive,
    Offline,
    NetworkDrop,
}

/// The unit of identity of a live vehicle presence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub vehicle_id: String,
    pub status: SessionStatus,
    pub created_at_ms: u64,
}

impl Session {
    pub fn new(session_id: impl Into<String>, vehicle_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            vehicle_id: vehicle_id.into(),
            status: SessionStatus::Inactive,
            created_at_ms: epoch_ms(),
        }
    }
}

/// A durable, multi-session vehicle record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub vehicle_id: String,
    pub created_at_ms: u64,
}

/// Validity of a vehicle's signed auth token, tracked independently of
/// the HMAC signature itself so an admin can revoke a token without
/// re-keying the whole fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenState {
    Pending,
    Active,
    Invalid,
}

/// Device metadata for one camera on a vehicle, distinct from the
/// samples it produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Camera {
    pub name: String,
}

/// A single captured frame from a named camera.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraSample {
    pub camera: String,
    pub timestamp_ns: u64,
    pub data: Vec<u8>,
}

/// A GPS/location fix.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LocationSample {
    pub latitude: f64,
    pub longitude: f64,
    pub heading: f64,
    pub timestamp_ns: u64,
}

/// SDP negotiation status for one (session, client) WebRTC pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SdpStatus {
    Offered,
    Answered,
}

/// RTC connection status for one (session, client) WebRTC pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RtcStatus {
    Disconnected,
    Connected,
}

/// Placeholder camera installed the first time a vehicle sends a Frame
/// before any Manifest has arrived, mirroring `makeDummyCamera()`.
pub fn dummy_camera() -> Camera {
    Camera { name: "unknown".to_owned() }
}

pub fn epoch_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The tagged envelope and payload variants exchanged between vehicle and
//! backend, and between operator and backend. Spec §4.3's category table
//! is expressed here as [`VehiclePayload::category`]; the wire vocabulary
//! itself is plain JSON rather than protobuf (the original service's
//! proto definitions are explicitly out of scope, spec §1).
//!
//! Binary WS frames carry the vehicle-facing envelopes JSON-encoded;
//! text frames carry the operator/browser-facing JSON views. Both are
//! tagged sum types so the recipient dispatches on the `variant` field.

use serde::{Deserialize, Serialize};

use crate::storage::model::{Camera, SdpStatus};

/// One of the six fan-out buckets a vehicle message routes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerCategory {
    Webrtc,
    Location,
    Camera,
    Control,
    View,
    Drop,
}

impl ListenerCategory {
    pub const ALL: [ListenerCategory; 6] = [
        ListenerCategory::Webrtc,
        ListenerCategory::Location,
        ListenerCategory::Camera,
        ListenerCategory::Control,
        ListenerCategory::View,
        ListenerCategory::Drop,
    ];
}

/// A message originating from the vehicle, tagged with a server-or-vehicle
/// assigned id (spec §6.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleMessage {
    #[serde(default)]
    pub id: String,
    #[serde(flatten)]
    pub payload: VehiclePayload,
}

/// A message destined for the vehicle, originating from an operator or the
/// SignalingMediator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendMessage {
    #[serde(default)]
    pub id: String,
    #[serde(flatten)]
    pub payload: BackendPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum VehiclePayload {
    Frame(FramePayload),
    Gps(GpsPayload),
    Manifest(ManifestPayload),
    DockingObservation(DockingObservationPayload),
    DockingStatus(DockingStatusPayload),
    Confirmation(ConfirmationPayload),
    Detection(DetectionPayload),
    Detection3D(Detection3DPayload),
    VehicleStatus(VehicleStatusPayload),
    SdpRequest(SdpRequestPayload),
    SdpConfirmation(SdpConfirmationPayload),
    IceCandidate(IceCandidatePayload),
}

impl VehiclePayload {
    /// Spec §4.3's category mapping table, normative.
    pub fn category(&self) -> ListenerCategory {
        match self {
            VehiclePayload::Frame(_) => ListenerCategory::Camera,
            VehiclePayload::Gps(_) => ListenerCategory::Location,
            VehiclePayload::Manifest(_) => ListenerCategory::Drop,
            VehiclePayload::DockingObservation(_)
            | VehiclePayload::DockingStatus(_)
            | VehiclePayload::Confirmation(_) => ListenerCategory::Control,
            VehiclePayload::Detection(_)
            | VehiclePayload::Detection3D(_)
            | VehiclePayload::VehicleStatus(_) => ListenerCategory::View,
            VehiclePayload::SdpRequest(_)
            | VehiclePayload::SdpConfirmation(_)
            | VehiclePayload::IceCandidate(_) => ListenerCategory::Webrtc,
        }
    }
}

/// Messages a backend may send to a vehicle. Distinct from `VehiclePayload`
/// even where the shape overlaps (SDP/ICE) since direction changes which
/// side effects apply.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum BackendPayload {
    Joystick(JoystickPayload),
    SdpRequest(SdpRequestPayload),
    SdpConfirmation(SdpConfirmationPayload),
    IceCandidate(IceCandidatePayload),
    Confirmation(ConfirmationPayload),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct JoystickPayload {
    pub linear: f64,
    pub angular: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FramePayload {
    pub device: String,
    pub width: u32,
    pub height: u32,
    #[serde(with = "base64_bytes")]
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GpsPayload {
    pub latitude: f64,
    pub longitude: f64,
    pub heading: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestPayload {
    pub cameras: Vec<Camera>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockingObservationPayload {
    pub station_ids: Vec<String>,
    pub timestamp_ns: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DockingState {
    Approaching,
    Docked,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DockingStatusPayload {
    pub status: DockingState,
    pub remaining_distance_x: f64,
    pub remaining_distance_y: f64,
    pub remaining_angle: f64,
}

/// A generic command acknowledgment from the vehicle, distinct from the
/// SignalingMediator's connection `Confirmation` (spec §4.5).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConfirmationPayload {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionPayload {
    pub label: String,
    pub confidence: f64,
    pub bbox: [f64; 4],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection3DPayload {
    pub label: String,
    pub confidence: f64,
    pub position: [f64; 3],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleStatusPayload {
    pub battery_pct: f64,
    pub state: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdpRequestPayload {
    pub connection_id: String,
    pub status: SdpStatus,
    pub sdp: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SdpConfirmationPayload {
    pub connected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceCandidatePayload {
    pub candidate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mline_index: Option<u32>,
}

/// The operator-facing JSON signaling envelope for `/ws/vehicle/{sid}/user/{clid}/subscribe`
/// (spec §4.5). At most one field is set per message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignalingMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<SdpRequestPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation: Option<SdpConfirmationPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "ice")]
    pub ice: Option<IceCandidatePayload>,
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(d)?;
        STANDARD.decode(encoded.as_bytes()).map_err(serde::de::Error::custom)
    }
}

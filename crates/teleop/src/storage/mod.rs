// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage collaborator (spec §6.1): session registry, vehicle data,
//! controller arbitration, and WebRTC negotiation state. `memory`
//! provides the in-memory implementation used by default; a persistent
//! implementation is a future backend behind the same trait (see
//! DESIGN.md).

pub mod memory;
pub mod model;

use async_trait::async_trait;

use self::model::{
    Camera, CameraSample, LocationSample, RtcStatus, SdpStatus, Session, SessionStatus, TokenState,
};
use crate::error::ApiError;

#[async_trait]
pub trait Storage: Send + Sync {
    // Session registry
    async fn register_vehicle(&self, session_id: &str, vehicle_id: &str) -> Result<(), ApiError>;
    async fn update_session_status(
        &self,
        session_id: &str,
        status: SessionStatus,
    ) -> Result<(), ApiError>;
    async fn get_session(&self, session_id: &str) -> Result<Session, ApiError>;
    async fn vehicle_is_active(&self, session_id: &str) -> Result<bool, ApiError>;
    async fn list_sessions(
        &self,
        state: Option<SessionStatus>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Session>, ApiError>;

    // Vehicle data
    async fn create_vehicle(&self, vehicle_id: &str) -> Result<(), ApiError>;
    async fn set_cameras(&self, vehicle_id: &str, cameras: Vec<Camera>) -> Result<(), ApiError>;
    async fn set_camera_meta(&self, vehicle_id: &str, camera: Camera) -> Result<(), ApiError>;
    async fn save_frame(&self, vehicle_id: &str, sample: CameraSample) -> Result<(), ApiError>;
    async fn save_location(&self, session_id: &str, sample: LocationSample) -> Result<(), ApiError>;
    async fn camera_samples_since(
        &self,
        vehicle_id: &str,
        camera: &str,
        since_ns: Option<u64>,
        limit: Option<usize>,
    ) -> Result<Vec<CameraSample>, ApiError>;

    // Controller arbitration
    async fn promote_to_controller(&self, session_id: &str, user_id: &str) -> Result<(), ApiError>;
    async fn remove_controller(&self, session_id: &str) -> Result<(), ApiError>;
    async fn user_in_control(&self, session_id: &str) -> Result<Option<String>, ApiError>;
    async fn add_viewer(&self, session_id: &str, user_id: &str) -> Result<(), ApiError>;

    // WebRTC state
    async fn update_sdp_status(
        &self,
        session_id: &str,
        client_id: &str,
        status: SdpStatus,
    ) -> Result<(), ApiError>;
    async fn update_rtc_status(
        &self,
        session_id: &str,
        client_id: &str,
        status: RtcStatus,
    ) -> Result<(), ApiError>;

    // Vehicle token lifecycle
    async fn set_token_state(&self, vehicle_id: &str, state: TokenState) -> Result<(), ApiError>;
    async fn token_state(&self, vehicle_id: &str) -> Result<TokenState, ApiError>;
}

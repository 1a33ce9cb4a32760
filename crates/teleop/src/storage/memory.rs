// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::model::{
    Camera, CameraSample, LocationSample, RtcStatus, SdpStatus, Session, SessionStatus, TokenState,
};
use super::Storage;
use crate::error::ApiError;

#[derive(Default)]
struct VehicleRecord {
    cameras: Vec<Camera>,
    samples: HashMap<String, Vec<CameraSample>>,
    token_state: TokenState2,
}

#[derive(Clone, Copy)]
struct TokenState2(TokenState);

impl Default for TokenState2 {
    fn default() -> Self {
        Self(TokenState::Pending)
    }
}

#[derive(Default)]
struct ControllerRecord {
    controller: Option<String>,
    viewers: Vec<String>,
}

#[derive(Default)]
struct WebrtcRecord {
    sdp_status: HashMap<String, SdpStatus>,
    rtc_status: HashMap<String, RtcStatus>,
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<String, Session>,
    vehicles: HashMap<String, VehicleRecord>,
    controllers: HashMap<String, ControllerRecord>,
    webrtc: HashMap<String, WebrtcRecord>,
    locations: HashMap<String, LocationSample>,
}

/// A single mutex-guarded map family, per spec §9's design note on the
/// in-memory `Storage` implementation.
#[derive(Default)]
pub struct InMemoryStorage {
    inner: Mutex<Inner>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[cfg(test)]
    pub(crate) fn viewers_for_test(&self, session_id: &str) -> Vec<String> {
        self.lock().controllers.get(session_id).map(|r| r.viewers.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn register_vehicle(&self, session_id: &str, vehicle_id: &str) -> Result<(), ApiError> {
        let mut inner = self.lock();
        let session = inner
            .sessions
            .entry(session_id.to_owned())
            .or_insert_with(|| Session::new(session_id, vehicle_id));
        session.vehicle_id = vehicle_id.to_owned();
        session.status = SessionStatus::Active;
        Ok(())
    }

    async fn update_session_status(
        &self,
        session_id: &str,
        status: SessionStatus,
    ) -> Result<(), ApiError> {
        let mut inner = self.lock();
        let session = inner
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| ApiError::not_found("no such session"))?;
        session.status = status;
        Ok(())
    }

    async fn get_session(&self, session_id: &str) -> Result<Session, ApiError> {
        self.lock()
            .sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| ApiError::not_found("no such session"))
    }

    async fn vehicle_is_active(&self, session_id: &str) -> Result<bool, ApiError> {
        Ok(self
            .lock()
            .sessions
            .get(session_id)
            .map(|s| s.status == SessionStatus::Active)
            .unwrap_or(false))
    }

    async fn list_sessions(
        &self,
        state: Option<SessionStatus>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Session>, ApiError> {
        let inner = self.lock();
        let mut sessions: Vec<Session> = inner
            .sessions
            .values()
            .filter(|s| state.map(|want| want == s.status).unwrap_or(true))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        Ok(sessions.into_iter().skip(offset).take(limit).collect())
    }

    async fn create_vehicle(&self, vehicle_id: &str) -> Result<(), ApiError> {
        self.lock().vehicles.entry(vehicle_id.to_owned()).or_default();
        Ok(())
    }

    async fn set_cameras(&self, vehicle_id: &str, cameras: Vec<Camera>) -> Result<(), ApiError> {
        self.lock().vehicles.entry(vehicle_id.to_owned()).or_default().cameras = cameras;
        Ok(())
    }

    async fn set_camera_meta(&self, vehicle_id: &str, camera: Camera) -> Result<(), ApiError> {
        let mut inner = self.lock();
        let record = inner.vehicles.entry(vehicle_id.to_owned()).or_default();
        if let Some(existing) = record.cameras.iter_mut().find(|c| c.name == camera.name) {
            *existing = camera;
        } else {
            record.cameras.push(camera);
        }
        Ok(())
    }

    async fn save_frame(&self, vehicle_id: &str, sample: CameraSample) -> Result<(), ApiError> {
        let mut inner = self.lock();
        let record = inner.vehicles.entry(vehicle_id.to_owned()).or_default();
        record.samples.entry(sample.camera.clone()).or_default().push(sample);
        Ok(())
    }

    async fn save_location(&self, session_id: &str, sample: LocationSample) -> Result<(), ApiError> {
        let mut inner = self.lock();
        if !inner.sessions.contains_key(session_id) {
            return Err(ApiError::not_found("no such session"));
        }
        inner.locations.insert(session_id.to_owned(), sample);
        Ok(())
    }

    async fn camera_samples_since(
        &self,
        vehicle_id: &str,
        camera: &str,
        since_ns: Option<u64>,
        limit: Option<usize>,
    ) -> Result<Vec<CameraSample>, ApiError> {
        let inner = self.lock();
        let mut samples: Vec<CameraSample> = inner
            .vehicles
            .get(vehicle_id)
            .and_then(|v| v.samples.get(camera))
            .cloned()
            .unwrap_or_default();
        samples.sort_by_key(|s| s.timestamp_ns);
        let mut filtered: Vec<CameraSample> = match since_ns {
            Some(since) => samples.into_iter().filter(|s| s.timestamp_ns > since).collect(),
            None => samples,
        };
        if let Some(limit) = limit {
            filtered.truncate(limit);
        }
        Ok(filtered)
    }

    async fn promote_to_controller(&self, session_id: &str, user_id: &str) -> Result<(), ApiError> {
        let mut inner = self.lock();
        let record = inner.controllers.entry(session_id.to_owned()).or_default();
        if let Some(previous) = record.controller.replace(user_id.to_owned()) {
            if previous != user_id && !record.viewers.contains(&previous) {
                record.viewers.push(previous);
            }
        }
        record.viewers.retain(|v| v != user_id);
        Ok(())
    }

    async fn remove_controller(&self, session_id: &str) -> Result<(), ApiError> {
        if let Some(record) = self.lock().controllers.get_mut(session_id) {
            record.controller = None;
        }
        Ok(())
    }

    async fn user_in_control(&self, session_id: &str) -> Result<Option<String>, ApiError> {
        Ok(self.lock().controllers.get(session_id).and_then(|r| r.controller.clone()))
    }

    async fn add_viewer(&self, session_id: &str, user_id: &str) -> Result<(), ApiError> {
        let mut inner = self.lock();
        let record = inner.controllers.entry(session_id.to_owned()).or_default();
        if record.controller.as_deref() != Some(user_id) && !record.viewers.contains(&user_id.to_owned())
        {
            record.viewers.push(user_id.to_owned());
        }
        Ok(())
    }

    async fn update_sdp_status(
        &self,
        session_id: &str,
        client_id: &str,
        status: SdpStatus,
    ) -> Result<(), ApiError> {
        let mut inner = self.lock();
        let record = inner.webrtc.entry(session_id.to_owned()).or_default();
        record.sdp_status.insert(client_id.to_owned(), status);
        Ok(())
    }

    async fn update_rtc_status(
        &self,
        session_id: &str,
        client_id: &str,
        status: RtcStatus,
    ) -> Result<(), ApiError> {
        let mut inner = self.lock();
        let record = inner.webrtc.entry(session_id.to_owned()).or_default();
        record.rtc_status.insert(client_id.to_owned(), status);
        Ok(())
    }

    async fn set_token_state(&self, vehicle_id: &str, state: TokenState) -> Result<(), ApiError> {
        self.lock().vehicles.entry(vehicle_id.to_owned()).or_default().token_state = TokenState2(state);
        Ok(())
    }

    async fn token_state(&self, vehicle_id: &str) -> Result<TokenState, ApiError> {
        Ok(self
            .lock()
            .vehicles
            .get(vehicle_id)
            .map(|v| v.token_state.0)
            .unwrap_or(TokenState::Invalid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(camera: &str, ts: u64) -> CameraSample {
        CameraSample { camera: camera.to_owned(), timestamp_ns: ts, data: vec![] }
    }

    #[tokio::test]
    async fn register_vehicle_creates_active_session() {
        let storage = InMemoryStorage::new();
        storage.register_vehicle("s1", "v1").await.unwrap();
        assert!(storage.vehicle_is_active("s1").await.unwrap());
    }

    #[tokio::test]
    async fn camera_samples_since_returns_strictly_after_in_order() {
        let storage = InMemoryStorage::new();
        storage.create_vehicle("v1").await.unwrap();
        storage.save_frame("v1", sample("front", 30)).await.unwrap();
        storage.save_frame("v1", sample("front", 10)).await.unwrap();
        storage.save_frame("v1", sample("front", 20)).await.unwrap();

        let result = storage.camera_samples_since("v1", "front", Some(10), None).await.unwrap();
        let timestamps: Vec<u64> = result.iter().map(|s| s.timestamp_ns).collect();
        assert_eq!(timestamps, vec![20, 30]);
    }

    #[tokio::test]
    async fn camera_samples_since_none_returns_all_sorted() {
        let storage = InMemoryStorage::new();
        storage.create_vehicle("v1").await.unwrap();
        storage.save_frame("v1", sample("front", 20)).await.unwrap();
        storage.save_frame("v1", sample("front", 10)).await.unwrap();

        let result = storage.camera_samples_since("v1", "front", None, None).await.unwrap();
        let timestamps: Vec<u64> = result.iter().map(|s| s.timestamp_ns).collect();
        assert_eq!(timestamps, vec![10, 20]);
    }

    #[tokio::test]
    async fn promote_to_controller_displaces_prior_into_viewers() {
        let storage = InMemoryStorage::new();
        storage.promote_to_controller("s1", "alice").await.unwrap();
        storage.promote_to_controller("s1", "bob").await.unwrap();

        assert_eq!(storage.user_in_control("s1").await.unwrap().as_deref(), Some("bob"));
    }

    #[tokio::test]
    async fn remove_controller_vacates_slot() {
        let storage = InMemoryStorage::new();
        storage.promote_to_controller("s1", "alice").await.unwrap();
        storage.remove_controller("s1").await.unwrap();
        assert_eq!(storage.user_in_control("s1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn get_session_unknown_returns_not_found() {
        let storage = InMemoryStorage::new();
        let err = storage.get_session("missing").await.unwrap_err();
        assert_eq!(err.kind, crate::error::AppError::NotFound);
    }
}

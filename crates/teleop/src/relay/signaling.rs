// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebRTC signaling mediation for `/ws/vehicle/{sid}/user/{clid}/subscribe`
//! (spec §4.5). Grounded on `handleSignalWebrtc`: translates between the
//! vehicle's tagged `VehiclePayload` variants and the browser-facing
//! `SignalingMessage` envelope, persisting SDP/RTC status as it goes.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::relay::Relay;
use crate::protocol::{
    BackendMessage, BackendPayload, ListenerCategory, SignalingMessage, VehiclePayload,
};
use crate::storage::model::RtcStatus;
use crate::storage::Storage;

/// Drive one operator's signaling session for `client_id` against
/// `session_id`'s relay until the socket closes.
pub async fn run(
    relay: Arc<Relay>,
    storage: Arc<dyn Storage>,
    session_id: String,
    client_id: String,
    socket: WebSocket,
) {
    let _ = storage.update_rtc_status(&session_id, &client_id, RtcStatus::Disconnected).await;

    let cancel = CancellationToken::new();
    let mut handle = relay.listen(ListenerCategory::Webrtc, cancel.clone());
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            inbound = handle.rx.recv() => {
                let Some(msg) = inbound else { break };
                let Some(signaling) =
                    translate_from_vehicle(msg.payload, &storage, &session_id, &client_id).await
                else {
                    continue;
                };
                let Ok(text) = serde_json::to_string(&signaling) else { continue };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        let Ok(signaling) = serde_json::from_str::<SignalingMessage>(&text) else { continue };
                        forward_to_vehicle(&relay, &storage, &session_id, &client_id, signaling).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    cancel.cancel();
    relay.unlisten(&handle.id);
    let _ = storage.update_rtc_status(&session_id, &client_id, RtcStatus::Disconnected).await;
}

/// Translate one vehicle-originated payload into the operator-facing
/// envelope, persisting SDP/RTC status (and growing the viewer set on a
/// positive `Confirmation`) along the way. `None` means "drop silently"
/// (spec §4.5 only forwards SDP/ICE/Confirmation).
async fn translate_from_vehicle(
    payload: VehiclePayload,
    storage: &Arc<dyn Storage>,
    session_id: &str,
    client_id: &str,
) -> Option<SignalingMessage> {
    match payload {
        VehiclePayload::SdpRequest(req) => {
            let _ = storage.update_sdp_status(session_id, client_id, req.status).await;
            Some(SignalingMessage { request: Some(req), ..Default::default() })
        }
        VehiclePayload::SdpConfirmation(conf) => {
            let status = if conf.connected { RtcStatus::Connected } else { RtcStatus::Disconnected };
            if conf.connected {
                let _ = storage.add_viewer(session_id, client_id).await;
            }
            let _ = storage.update_rtc_status(session_id, client_id, status).await;
            Some(SignalingMessage { confirmation: Some(conf), ..Default::default() })
        }
        VehiclePayload::IceCandidate(ice) => {
            Some(SignalingMessage { ice: Some(ice), ..Default::default() })
        }
        _ => None,
    }
}

async fn forward_to_vehicle(
    relay: &Arc<Relay>,
    storage: &Arc<dyn Storage>,
    session_id: &str,
    client_id: &str,
    signaling: SignalingMessage,
) {
    let payload = if let Some(req) = signaling.request {
        let _ = storage.update_sdp_status(session_id, client_id, req.status).await;
        BackendPayload::SdpRequest(req)
    } else if let Some(conf) = signaling.confirmation {
        let status = if conf.connected { RtcStatus::Connected } else { RtcStatus::Disconnected };
        if conf.connected {
            let _ = storage.add_viewer(session_id, client_id).await;
        }
        let _ = storage.update_rtc_status(session_id, client_id, status).await;
        BackendPayload::SdpConfirmation(conf)
    } else if let Some(ice) = signaling.ice {
        BackendPayload::IceCandidate(ice)
    } else {
        return;
    };
    relay.submit_to_vehicle(BackendMessage { id: Uuid::new_v4().to_string(), payload });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::SdpConfirmationPayload;
    use crate::storage::memory::InMemoryStorage;

    #[tokio::test]
    async fn vehicle_confirmation_connected_adds_viewer() {
        let memory = Arc::new(InMemoryStorage::new());
        let storage: Arc<dyn Storage> = memory.clone();
        let payload =
            VehiclePayload::SdpConfirmation(SdpConfirmationPayload { connected: true });

        translate_from_vehicle(payload, &storage, "s1", "client-1").await;

        assert_eq!(memory.viewers_for_test("s1"), vec!["client-1".to_owned()]);
    }

    #[tokio::test]
    async fn vehicle_confirmation_disconnected_does_not_add_viewer() {
        let memory = Arc::new(InMemoryStorage::new());
        let storage: Arc<dyn Storage> = memory.clone();
        let payload =
            VehiclePayload::SdpConfirmation(SdpConfirmationPayload { connected: false });

        translate_from_vehicle(payload, &storage, "s1", "client-1").await;

        assert!(memory.viewers_for_test("s1").is_empty());
    }

    #[tokio::test]
    async fn operator_confirmation_connected_adds_viewer_before_forwarding() {
        let relay = Arc::new(Relay::new("s1"));
        let memory = Arc::new(InMemoryStorage::new());
        let storage: Arc<dyn Storage> = memory.clone();
        let signaling = SignalingMessage {
            confirmation: Some(SdpConfirmationPayload { connected: true }),
            ..Default::default()
        };

        forward_to_vehicle(&relay, &storage, "s1", "client-1", signaling).await;

        assert_eq!(memory.viewers_for_test("s1"), vec!["client-1".to_owned()]);
    }
}

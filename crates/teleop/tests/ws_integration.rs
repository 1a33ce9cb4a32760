// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket integration tests against a real, in-process TCP server,
//! in the style of the teacher's `crates/cli/tests/ws_integration.rs`.
//! These exercise the concrete end-to-end scenarios a unit test can't:
//! a real vehicle socket, real operator sockets, real frames on the wire.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use reqwest::header::{AUTHORIZATION, COOKIE};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use teleop::auth::hmac::HmacAuth;
use teleop::auth::{AuthProvider, Principal};
use teleop::config::{Environment, RelayConfig};
use teleop::protocol::{
    ConfirmationPayload, FramePayload, GpsPayload, SdpRequestPayload, SignalingMessage,
    VehicleMessage, VehiclePayload,
};
use teleop::state::AppState;
use teleop::storage::memory::InMemoryStorage;
use teleop::storage::model::SdpStatus;
use teleop::storage::Storage;
use teleop::transport::build_router;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;
type WsTx = futures_util::stream::SplitSink<WsStream, WsMessage>;
type WsRx = futures_util::stream::SplitStream<WsStream>;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

fn test_config() -> RelayConfig {
    RelayConfig {
        host: "127.0.0.1".to_owned(),
        port: 0,
        metrics_port: 0,
        environment: Environment::Testing,
        domain: "localhost".to_owned(),
        token_signing_key: Some("test-signing-key".to_owned()),
        grace_window_secs: 60,
        health_check_ms: 30000,
        max_health_failures: 3,
        log_json: false,
    }
}

struct Fixture {
    storage: Arc<dyn Storage>,
    auth: Arc<HmacAuth>,
    addr: std::net::SocketAddr,
    _server: tokio::task::JoinHandle<()>,
}

async fn spawn_fixture() -> anyhow::Result<Fixture> {
    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
    let config = test_config();
    let auth = Arc::new(HmacAuth::new(&config.signing_key_bytes()));
    let state = AppState::new(storage.clone(), auth.clone(), config);

    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    Ok(Fixture { storage, auth, addr, _server: server })
}

async fn connect_vehicle(addr: &std::net::SocketAddr, session_id: &str) -> anyhow::Result<WsStream> {
    let url = format!("ws://{addr}/ws/vehicle/rover-1/register");
    let mut request = url.into_client_request()?;
    request
        .headers_mut()
        .insert(COOKIE, format!("teleop_session={session_id}").try_into()?);
    let (stream, _) = tokio_tungstenite::connect_async(request).await?;
    Ok(stream)
}

async fn connect_operator(addr: &std::net::SocketAddr, path: &str, bearer: &str) -> anyhow::Result<WsStream> {
    let url = format!("ws://{addr}{path}");
    let mut request = url.into_client_request()?;
    request
        .headers_mut()
        .insert(AUTHORIZATION, format!("Bearer {bearer}").try_into()?);
    let (stream, _) = tokio_tungstenite::connect_async(request).await?;
    Ok(stream)
}

async fn send_binary(tx: &mut WsTx, msg: &VehicleMessage) -> anyhow::Result<()> {
    let bytes = serde_json::to_vec(msg)?;
    tx.send(WsMessage::Binary(bytes.into())).await?;
    Ok(())
}

async fn recv_vehicle_message(rx: &mut WsRx) -> anyhow::Result<VehicleMessage> {
    let msg = tokio::time::timeout(RECV_TIMEOUT, rx.next())
        .await
        .map_err(|_| anyhow::anyhow!("ws recv timeout"))?
        .ok_or_else(|| anyhow::anyhow!("ws stream closed"))?
        .map_err(|e| anyhow::anyhow!("ws recv: {e}"))?;
    match msg {
        WsMessage::Text(text) => Ok(serde_json::from_str(&text)?),
        other => anyhow::bail!("expected Text message, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Single frame reaches a camera subscriber (spec §8 scenario 1)
// ---------------------------------------------------------------------------

#[tokio::test]
async fn single_frame_reaches_camera_subscriber() -> anyhow::Result<()> {
    let fx = spawn_fixture().await?;
    fx.storage.register_vehicle("s1", "rover-1").await?;
    let bearer = fx.auth.sign_principal(&Principal::user("op-1"));

    let (_op_tx, mut op_rx) =
        connect_operator(&fx.addr, "/ws/vehicle/s1/camera/front/subscribe", &bearer).await?.split();
    let (mut veh_tx, _veh_rx) = connect_vehicle(&fx.addr, "s1").await?.split();

    send_binary(
        &mut veh_tx,
        &VehicleMessage {
            id: String::new(),
            payload: VehiclePayload::Frame(FramePayload {
                device: "front".to_owned(),
                width: 10,
                height: 20,
                content: b"orig".to_vec(),
            }),
        },
    )
    .await?;

    let received = recv_vehicle_message(&mut op_rx).await?;
    let VehiclePayload::Frame(frame) = received.payload else {
        anyhow::bail!("expected a Frame payload");
    };
    assert_eq!(frame.content, b"orig");
    assert_eq!(frame.device, "front");
    Ok(())
}

// ---------------------------------------------------------------------------
// Fan-out to two camera subscribers (spec §8 scenario 2)
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fan_out_to_two_camera_subscribers() -> anyhow::Result<()> {
    let fx = spawn_fixture().await?;
    fx.storage.register_vehicle("s1", "rover-1").await?;
    let bearer_a = fx.auth.sign_principal(&Principal::user("op-a"));
    let bearer_b = fx.auth.sign_principal(&Principal::user("op-b"));

    let (_a_tx, mut a_rx) =
        connect_operator(&fx.addr, "/ws/vehicle/s1/camera/all/subscribe", &bearer_a).await?.split();
    let (_b_tx, mut b_rx) =
        connect_operator(&fx.addr, "/ws/vehicle/s1/camera/all/subscribe", &bearer_b).await?.split();
    let (mut veh_tx, _veh_rx) = connect_vehicle(&fx.addr, "s1").await?.split();

    send_binary(
        &mut veh_tx,
        &VehicleMessage {
            id: String::new(),
            payload: VehiclePayload::Frame(FramePayload {
                device: "front".to_owned(),
                width: 10,
                height: 20,
                content: b"shared".to_vec(),
            }),
        },
    )
    .await?;

    for rx in [&mut a_rx, &mut b_rx] {
        let received = recv_vehicle_message(rx).await?;
        let VehiclePayload::Frame(frame) = received.payload else {
            anyhow::bail!("expected a Frame payload");
        };
        assert_eq!(frame.content, b"shared");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Location subscribers receive Gps fixes, unaffected by camera filters
// ---------------------------------------------------------------------------

#[tokio::test]
async fn location_subscriber_receives_gps_fix() -> anyhow::Result<()> {
    let fx = spawn_fixture().await?;
    fx.storage.register_vehicle("s1", "rover-1").await?;
    let bearer = fx.auth.sign_principal(&Principal::user("op-1"));

    let (_tx, mut rx) =
        connect_operator(&fx.addr, "/ws/vehicle/s1/location/subscribe", &bearer).await?.split();
    let (mut veh_tx, _veh_rx) = connect_vehicle(&fx.addr, "s1").await?.split();

    send_binary(
        &mut veh_tx,
        &VehicleMessage {
            id: String::new(),
            payload: VehiclePayload::Gps(GpsPayload { latitude: 1.0, longitude: 2.0, heading: 90.0 }),
        },
    )
    .await?;

    let received = recv_vehicle_message(&mut rx).await?;
    let VehiclePayload::Gps(gps) = received.payload else {
        anyhow::bail!("expected a Gps payload");
    };
    assert_eq!(gps.latitude, 1.0);
    Ok(())
}

// ---------------------------------------------------------------------------
// Control subscription is gated by controller authority (spec §6.3)
// ---------------------------------------------------------------------------

#[tokio::test]
async fn control_subscribe_rejects_non_controller() -> anyhow::Result<()> {
    let fx = spawn_fixture().await?;
    fx.storage.register_vehicle("s1", "rover-1").await?;
    let bearer = fx.auth.sign_principal(&Principal::user("stranger"));

    let result = connect_operator(&fx.addr, "/ws/vehicle/s1/subscribe", &bearer).await;
    assert!(result.is_err(), "non-controller should be rejected before the WS upgrade");
    Ok(())
}

#[tokio::test]
async fn control_subscribe_accepts_current_controller() -> anyhow::Result<()> {
    let fx = spawn_fixture().await?;
    fx.storage.register_vehicle("s1", "rover-1").await?;
    fx.storage.promote_to_controller("s1", "bob").await?;
    let bearer = fx.auth.sign_principal(&Principal::user("bob"));

    let result = connect_operator(&fx.addr, "/ws/vehicle/s1/subscribe", &bearer).await;
    assert!(result.is_ok(), "current controller should be admitted");
    Ok(())
}

// ---------------------------------------------------------------------------
// Joystick command round-trips from operator to vehicle with a server id
// ---------------------------------------------------------------------------

#[tokio::test]
async fn joystick_command_reaches_vehicle_with_assigned_id() -> anyhow::Result<()> {
    let fx = spawn_fixture().await?;
    fx.storage.register_vehicle("s1", "rover-1").await?;
    fx.storage.promote_to_controller("s1", "bob").await?;
    let bearer = fx.auth.sign_principal(&Principal::user("bob"));

    let (mut ctl_tx, _ctl_rx) = connect_operator(&fx.addr, "/ws/vehicle/s1/subscribe", &bearer).await?.split();
    let (_veh_tx, mut veh_rx) = connect_vehicle(&fx.addr, "s1").await?.split();

    ctl_tx
        .send(WsMessage::Text(
            serde_json::json!({"variant": "joystick", "linear": 0.5, "angular": -0.2}).to_string().into(),
        ))
        .await?;

    let msg = tokio::time::timeout(RECV_TIMEOUT, veh_rx.next())
        .await?
        .ok_or_else(|| anyhow::anyhow!("vehicle stream closed"))??;
    let WsMessage::Binary(bytes) = msg else { anyhow::bail!("expected a Binary frame") };
    let backend: teleop::protocol::BackendMessage = serde_json::from_slice(&bytes)?;
    assert!(!backend.id.is_empty(), "server must assign a fresh id");
    assert!(matches!(backend.payload, teleop::protocol::BackendPayload::Joystick(_)));
    Ok(())
}

// ---------------------------------------------------------------------------
// SDP offer/answer round-trips through the signaling mediator (spec §8
// scenario 4)
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sdp_exchange_round_trips_through_signaling() -> anyhow::Result<()> {
    let fx = spawn_fixture().await?;
    fx.storage.register_vehicle("s1", "rover-1").await?;
    let bearer = fx.auth.sign_principal(&Principal::user("op-1"));

    let (mut op_tx, mut op_rx) =
        connect_operator(&fx.addr, "/ws/vehicle/s1/user/client-1/subscribe", &bearer).await?.split();
    let (mut veh_tx, mut veh_rx) = connect_vehicle(&fx.addr, "s1").await?.split();

    let request = SignalingMessage {
        request: Some(SdpRequestPayload {
            connection_id: "conn-1".to_owned(),
            status: SdpStatus::Offered,
            sdp: "v=0 offer".to_owned(),
        }),
        confirmation: None,
        ice: None,
    };
    op_tx.send(WsMessage::Text(serde_json::to_string(&request)?.into())).await?;

    let msg = tokio::time::timeout(RECV_TIMEOUT, veh_rx.next())
        .await?
        .ok_or_else(|| anyhow::anyhow!("vehicle stream closed"))??;
    let WsMessage::Binary(bytes) = msg else { anyhow::bail!("expected a Binary frame") };
    let forwarded: teleop::protocol::BackendMessage = serde_json::from_slice(&bytes)?;
    let teleop::protocol::BackendPayload::SdpRequest(sdp) = forwarded.payload else {
        anyhow::bail!("expected a forwarded SdpRequest");
    };
    assert_eq!(sdp.sdp, "v=0 offer");
    assert_eq!(sdp.status, SdpStatus::Offered);

    send_binary(
        &mut veh_tx,
        &VehicleMessage {
            id: String::new(),
            payload: VehiclePayload::SdpRequest(SdpRequestPayload {
                connection_id: "conn-1".to_owned(),
                status: SdpStatus::Answered,
                sdp: "v=0 answer".to_owned(),
            }),
        },
    )
    .await?;

    let reply = loop {
        let msg = tokio::time::timeout(RECV_TIMEOUT, op_rx.next())
            .await?
            .ok_or_else(|| anyhow::anyhow!("operator stream closed"))??;
        if let WsMessage::Text(text) = msg {
            break serde_json::from_str::<SignalingMessage>(&text)?;
        }
    };
    let answer = reply.request.expect("expected a forwarded SdpRequest");
    assert_eq!(answer.sdp, "v=0 answer");
    assert_eq!(answer.status, SdpStatus::Answered);
    Ok(())
}

// ---------------------------------------------------------------------------
// A docking observation reaches the Control category, never the View one
// ---------------------------------------------------------------------------

#[tokio::test]
async fn confirmation_payload_reaches_control_not_view() -> anyhow::Result<()> {
    let fx = spawn_fixture().await?;
    fx.storage.register_vehicle("s1", "rover-1").await?;
    fx.storage.promote_to_controller("s1", "bob").await?;
    let control_bearer = fx.auth.sign_principal(&Principal::user("bob"));
    let view_bearer = fx.auth.sign_principal(&Principal::user("viewer"));

    let (_ctl_tx, mut ctl_rx) =
        connect_operator(&fx.addr, "/ws/vehicle/s1/subscribe", &control_bearer).await?.split();
    let (_view_tx, mut view_rx) =
        connect_operator(&fx.addr, "/ws/vehicle/s1/view", &view_bearer).await?.split();
    let (mut veh_tx, _veh_rx) = connect_vehicle(&fx.addr, "s1").await?.split();

    send_binary(
        &mut veh_tx,
        &VehicleMessage {
            id: "ack-1".to_owned(),
            payload: VehiclePayload::Confirmation(ConfirmationPayload { success: true }),
        },
    )
    .await?;

    let received = recv_vehicle_message(&mut ctl_rx).await?;
    assert!(matches!(received.payload, VehiclePayload::Confirmation(_)));

    let nothing = tokio::time::timeout(Duration::from_millis(300), view_rx.next()).await;
    assert!(nothing.is_err(), "a Control-category message must not reach a View subscriber");
    Ok(())
}

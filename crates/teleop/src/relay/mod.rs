// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The relay core (spec §3, §4): fan-out hub, listener registrations,
//! vehicle transport lifecycle, operator subscriptions and WebRTC
//! signaling. Together these modules replace `upstream/bridge.rs`'s
//! single-upstream/N-downstream pattern, generalized from an unbounded
//! PTY byte stream to the bounded, categorized message routing spec §3
//! requires.

pub mod listener;
pub mod operator_subscription;
pub mod registry;
pub mod relay;
pub mod signaling;
pub mod vehicle_link;

pub use listener::{ListenerId, LISTENER_CAPACITY};
pub use registry::RelayRegistry;
pub use relay::Relay;
pub use vehicle_link::{DisconnectKind, VehicleLink, OUTBOUND_QUEUE_CAPACITY};

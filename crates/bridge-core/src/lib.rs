// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Domain model shared by every engine in the bridge: identifiers, the
//! zone/installation model, the routing table, the temperature wire codec,
//! the referential dictionary, and the pending-command shape.
//!
//! This crate has no tokio dependency and no I/O; it is pure data and pure
//! functions so it can be unit tested without a runtime.

pub mod command;
pub mod error;
pub mod ids;
pub mod model;
pub mod referential;
pub mod routing;
pub mod temperature;

pub use command::{CommandKind, PendingCommand, WireValue};
pub use error::RoutingError;
pub use ids::{ChannelId, ChannelZone, ControllerNumber, InstallationId, RoutingKey, ZoneId};
pub use model::{Group, Installation, InstallationMode, Mode, Preset, Zone};
pub use referential::Referential;
pub use routing::RoutingTable;

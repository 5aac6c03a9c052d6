// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pending-command model shared between CommandEngine and its tests.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::{ChannelZone, ControllerNumber, InstallationId, ZoneId};

/// Logical command types a local caller can issue against a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Mode,
    Preset,
    Temperature,
    RingLight,
    Lock,
}

impl CommandKind {
    /// Ring light and lock commands are auto-confirmed locally after 2s;
    /// the vendor never echoes a dedicated confirmation field for them.
    pub fn auto_confirms(self) -> bool {
        matches!(self, CommandKind::RingLight | CommandKind::Lock)
    }
}

/// A value to be sent under a numeric wire key. The vendor accepts plain
/// JSON scalars (numbers, bools, strings) for `"12"` payload entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireValue {
    Int(i64),
    Bool(bool),
    Str(String),
}

/// A command sent to the vendor and awaiting confirmation.
///
/// At most one exists per installation at a time (enforced by CommandEngine,
/// not by this type).
#[derive(Debug, Clone)]
pub struct PendingCommand {
    pub id: u64,
    pub zone_id: ZoneId,
    pub install_id: InstallationId,
    pub channel_zone: ChannelZone,
    pub controller_number: ControllerNumber,
    pub kind: CommandKind,
    pub payload: BTreeMap<String, WireValue>,
    pub sent_at: std::time::Instant,
    pub retries: u32,
}

impl PendingCommand {
    /// Build the vendor command envelope: `{"11":"REQ_TH","12":{...},"35":cn,"36":cz}`.
    pub fn to_wire_envelope(&self) -> serde_json::Value {
        serde_json::json!({
            "11": "REQ_TH",
            "12": self.payload,
            "35": self.controller_number,
            "36": self.channel_zone,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_matches_wire_shape() {
        let mut payload = BTreeMap::new();
        payload.insert("16".to_owned(), WireValue::Int(725));
        let cmd = PendingCommand {
            id: 1,
            zone_id: ZoneId::from("zone-a"),
            install_id: InstallationId::from("inst-1"),
            channel_zone: 3,
            controller_number: 0,
            kind: CommandKind::Temperature,
            payload,
            sent_at: std::time::Instant::now(),
            retries: 0,
        };
        let envelope = cmd.to_wire_envelope();
        assert_eq!(envelope["11"], "REQ_TH");
        assert_eq!(envelope["12"]["16"], 725);
        assert_eq!(envelope["35"], 0);
        assert_eq!(envelope["36"], 3);
    }

    #[test]
    fn ring_light_and_lock_auto_confirm() {
        assert!(CommandKind::RingLight.auto_confirms());
        assert!(CommandKind::Lock.auto_confirms());
        assert!(!CommandKind::Temperature.auto_confirms());
        assert!(!CommandKind::Mode.auto_confirms());
        assert!(!CommandKind::Preset.auto_confirms());
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tagged decoder for vendor MQTT payloads (§6.1, §9 "implicit-any payloads").
//! Rather than carrying raw JSON maps through the engine, every inbound
//! message is decoded into one of these variants up front; unknown tags are
//! logged and dropped.

use serde::Deserialize;

/// Top-level vendor message, dispatched on `payload.type`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum VendorMessage {
    #[serde(rename = "channel_update")]
    ChannelUpdate { data: ChannelUpdateEnvelope },

    #[serde(rename = "realtime")]
    Realtime {
        #[serde(default)]
        zones: Vec<ZoneSnapshot>,
    },

    #[serde(rename = "realtime.update")]
    RealtimeUpdate {
        #[serde(default)]
        zones: Vec<ZoneSnapshot>,
    },

    #[serde(rename = "referential")]
    Referential { data: String },

    #[serde(rename = "live_data")]
    LiveData { data: LiveDataEnvelope },

    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
pub struct ChannelUpdateEnvelope {
    pub channel: String,
    pub unique: String,
    pub data: ChannelFields,
}

/// Per-zone measurement/command fields, as interpreted in §4.4. All fields
/// are optional: a given `channel_update` carries whichever subset changed.
#[derive(Debug, Default, Deserialize)]
pub struct ChannelFields {
    pub temp_zone: Option<i64>,
    pub humidity: Option<f64>,
    pub setpoint_h_normal: Option<i64>,
    pub setpoint_h_reduced: Option<i64>,
    pub setpoint_c_normal: Option<i64>,
    pub setpoint_c_reduced: Option<i64>,
    pub mode_used: Option<u8>,
    pub cc_config_bits: Option<CcConfigBits>,
    pub demand: Option<f64>,
    pub demand_state: Option<bool>,
    pub dewpoint: Option<i64>,
}

/// `cc_config_bits` varies by firmware: either a raw integer bitfield or an
/// already-decoded object (§9 open question b). Accept either and normalise.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CcConfigBits {
    Bitfield(u32),
    Decoded { ring_activation: Option<bool>, lock: Option<bool> },
}

impl CcConfigBits {
    /// Bit 0 = ring activation, bit 1 = lock, matching the decoded-object
    /// field order used when firmware sends the object form.
    pub fn normalise(&self) -> (Option<bool>, Option<bool>) {
        match self {
            CcConfigBits::Bitfield(bits) => (Some(bits & 0b01 != 0), Some(bits & 0b10 != 0)),
            CcConfigBits::Decoded { ring_activation, lock } => (*ring_activation, *lock),
        }
    }
}

/// A zone snapshot as carried in a `realtime`/`realtime.update` message.
#[derive(Debug, Deserialize)]
pub struct ZoneSnapshot {
    pub channel: String,
    #[serde(flatten)]
    pub fields: ChannelFields,
}

#[derive(Debug, Deserialize)]
pub struct LiveDataEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub unique: String,
    pub data: serde_json::Value,
}

/// One mixed-circuit reading from a `LIVE_EMU` payload. The sentinel value
/// `32767` on `supply_raw` marks an absent circuit and must be skipped.
#[derive(Debug, Deserialize)]
pub struct MixedCircuit {
    pub circuit: u32,
    pub pump_on: bool,
    pub setpoint_raw: i64,
    pub supply_raw: i64,
    pub return_raw: i64,
    pub valve_opening_pct: f64,
}

pub const ABSENT_CIRCUIT_SENTINEL: i64 = 32767;

/// One digital input/output reading from a `LIVE_DIDO` payload.
#[derive(Debug, Deserialize)]
pub struct DigitalIo {
    pub name: String,
    pub state: bool,
    pub is_output: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_update_decodes() {
        let json = r#"{
            "type": "channel_update",
            "data": {
                "channel": "chan-1",
                "unique": "inst-1",
                "data": { "temp_zone": 695, "mode_used": 0 }
            }
        }"#;
        let msg: VendorMessage = serde_json::from_str(json).unwrap();
        match msg {
            VendorMessage::ChannelUpdate { data } => {
                assert_eq!(data.channel, "chan-1");
                assert_eq!(data.data.temp_zone, Some(695));
                assert_eq!(data.data.mode_used, Some(0));
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn unknown_type_is_dropped_not_rejected() {
        let json = r#"{"type": "something_new"}"#;
        let msg: VendorMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, VendorMessage::Unknown));
    }

    #[test]
    fn cc_config_bits_normalises_bitfield_and_object() {
        let bitfield = CcConfigBits::Bitfield(0b11);
        assert_eq!(bitfield.normalise(), (Some(true), Some(true)));

        let decoded = CcConfigBits::Decoded { ring_activation: Some(false), lock: Some(true) };
        assert_eq!(decoded.normalise(), (Some(false), Some(true)));
    }
}

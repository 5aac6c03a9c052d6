// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Core domain entities: Installation, Group, Zone.

use serde::{Deserialize, Serialize};

use crate::ids::{ChannelZone, ControllerNumber, InstallationId, ZoneId};

/// Zone operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Off,
    Heat,
    Cool,
}

/// Zone comfort preset. `None` is a real state (not absence of preset),
/// matching the spec's requirement that preset is `none` while off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    Comfort,
    Away,
    None,
}

/// Installation-wide selector of heating vs cooling setpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallationMode {
    Heat,
    Cool,
}

/// A thermostatically controlled room or region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zone {
    pub zone_id: ZoneId,
    pub zone_number: u32,
    pub channel_zone: ChannelZone,
    pub controller_number: ControllerNumber,
    pub name: String,
    pub group_name: String,
    pub install_id: InstallationId,
    pub mode: Mode,
    pub preset: Preset,
    pub current_temp: Option<f64>,
    pub target_temp: Option<f64>,
    pub humidity: Option<f64>,
    pub demanding: bool,
    pub demand_pct: Option<f64>,
    pub dewpoint: Option<f64>,
    pub locked: bool,
    pub ring_light: bool,
    pub installation_mode: InstallationMode,
    pub available: bool,
    /// True when this zone's mode/preset/setpoint was last changed by a local
    /// command rather than the vendor's own schedule. Advisory only — used
    /// for diagnostics, never gates behavior.
    pub manual_mode: bool,
    /// Epoch millis of the most recently accepted update. Used only to
    /// report staleness on the admin `/healthz` payload.
    pub last_seen_at: u64,
}

impl Zone {
    /// Apply the "mode = off implies target_temp/preset = none" invariant.
    pub fn enforce_off_invariant(&mut self) {
        if self.mode == Mode::Off {
            self.target_temp = None;
            self.preset = Preset::None;
        }
    }
}

/// A pure naming container grouping zones for display purposes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    pub zones: Vec<ZoneId>,
}

/// One physical controller device and the zones it governs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Installation {
    pub id: InstallationId,
    pub name: String,
    pub outside_temp: Option<f64>,
    pub cooling_supported: bool,
    pub groups: Vec<Group>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_zone() -> Zone {
        Zone {
            zone_id: ZoneId::from("abc123"),
            zone_number: 1,
            channel_zone: 3,
            controller_number: 0,
            name: "Bathroom".into(),
            group_name: "Upstairs".into(),
            install_id: InstallationId::from("inst-1"),
            mode: Mode::Heat,
            preset: Preset::Comfort,
            current_temp: Some(21.5),
            target_temp: Some(22.0),
            humidity: Some(45.0),
            demanding: true,
            demand_pct: Some(80.0),
            dewpoint: Some(12.0),
            locked: false,
            ring_light: true,
            installation_mode: InstallationMode::Heat,
            available: true,
            manual_mode: false,
            last_seen_at: 0,
        }
    }

    #[test]
    fn off_mode_clears_target_and_preset() {
        let mut zone = sample_zone();
        zone.mode = Mode::Off;
        zone.enforce_off_invariant();
        assert_eq!(zone.target_temp, None);
        assert_eq!(zone.preset, Preset::None);
    }

    #[test]
    fn non_off_mode_preserves_target_and_preset() {
        let mut zone = sample_zone();
        zone.enforce_off_invariant();
        assert_eq!(zone.target_temp, Some(22.0));
        assert_eq!(zone.preset, Preset::Comfort);
    }
}

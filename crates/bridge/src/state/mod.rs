// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! StateEngine: translates vendor MQTT traffic into zone/installation state
//! and republishes it to the local broker (§4.4).

pub mod messages;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rehau_bridge_core::{
    referential, ChannelId, InstallationId, InstallationMode, Mode, Preset, Referential,
    RoutingTable, Zone, ZoneId,
};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use self::messages::{ChannelFields, LiveDataEnvelope, VendorMessage, ABSENT_CIRCUIT_SENTINEL};
use crate::broker::{BrokerLink, Side};
use crate::command::CommandEngine;
use crate::error::StateError;
use crate::topics;

/// One scalar leaf change, ready to publish verbatim.
struct FieldChange {
    domain: &'static str,
    suffix: Option<&'static str>,
    leaf: &'static str,
    value: String,
}

/// Diff two zone snapshots into the scalar leaf publishes the change
/// produces. Only fields that actually changed are emitted (§8 invariant 1:
/// exactly one publish per changed field).
fn diff_zone(before: &Zone, after: &Zone) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    macro_rules! push {
        ($domain:expr, $suffix:expr, $leaf:expr, $value:expr) => {
            changes.push(FieldChange { domain: $domain, suffix: $suffix, leaf: $leaf, value: $value });
        };
    }

    if before.mode != after.mode {
        push!("climate", None, "mode_state", mode_str(after.mode).to_owned());
    }
    if before.preset != after.preset {
        push!("climate", None, "preset_mode_state", preset_str(after.preset).to_owned());
    }
    if before.target_temp != after.target_temp {
        let value = match after.target_temp {
            Some(t) => format!("{t:.1}"),
            None => "None".to_owned(),
        };
        push!("climate", None, "temperature_state", value);
    }
    if before.current_temp != after.current_temp {
        if let Some(t) = after.current_temp {
            push!("sensor", Some("temperature"), "state", format!("{t:.1}"));
        }
    }
    if before.humidity != after.humidity {
        if let Some(h) = after.humidity {
            push!("sensor", Some("humidity"), "state", format!("{h:.1}"));
        }
    }
    if before.demanding != after.demanding {
        push!("binary_sensor", Some("demanding"), "state", on_off(after.demanding).to_owned());
    }
    if before.demand_pct != after.demand_pct {
        if let Some(d) = after.demand_pct {
            push!("sensor", Some("demanding_percent"), "state", format!("{d:.1}"));
        }
    }
    if before.dewpoint != after.dewpoint {
        if let Some(d) = after.dewpoint {
            push!("sensor", Some("dewpoint"), "state", format!("{d:.1}"));
        }
    }
    if before.locked != after.locked {
        push!("lock", Some("lock"), "state", if after.locked { "LOCKED".into() } else { "UNLOCKED".into() });
    }
    if before.ring_light != after.ring_light {
        push!("light", Some("ring_light"), "state", on_off(after.ring_light).to_owned());
    }

    changes
}

fn mode_str(mode: Mode) -> &'static str {
    match mode {
        Mode::Off => "off",
        Mode::Heat => "heat",
        Mode::Cool => "cool",
    }
}

fn preset_str(preset: Preset) -> &'static str {
    match preset {
        Preset::Comfort => "comfort",
        Preset::Away => "away",
        Preset::None => "none",
    }
}

fn on_off(value: bool) -> &'static str {
    if value { "ON" } else { "OFF" }
}

/// Holds the live zone/installation model and applies inbound vendor
/// messages to it, republishing changes to the local broker.
pub struct StateEngine {
    zones: RwLock<HashMap<ZoneId, Zone>>,
    routing: RwLock<RoutingTable>,
    channel_zone: RwLock<HashMap<ChannelId, ZoneId>>,
    broker: Arc<BrokerLink>,
    command_engine: Arc<CommandEngine>,
    referential: Arc<RwLock<Referential>>,
}

impl StateEngine {
    pub fn new(
        broker: Arc<BrokerLink>,
        command_engine: Arc<CommandEngine>,
        referential: Arc<RwLock<Referential>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            zones: RwLock::new(HashMap::new()),
            routing: RwLock::new(RoutingTable::new()),
            channel_zone: RwLock::new(HashMap::new()),
            broker,
            command_engine,
            referential,
        })
    }

    /// Replace the whole zone/routing snapshot, e.g. after a ZonePoller
    /// reload. Routing invariant violations are fatal and bubble up.
    pub async fn load_zones(
        &self,
        zones: Vec<Zone>,
        channels: Vec<(ChannelId, ZoneId)>,
    ) -> Result<(), rehau_bridge_core::RoutingError> {
        let mut routing = RoutingTable::new();
        for zone in &zones {
            routing.insert_tuple(&zone.install_id, zone.channel_zone, zone.controller_number, &zone.zone_id)?;
        }
        let mut channel_map = HashMap::new();
        for (channel_id, zone_id) in channels {
            routing.insert_channel(
                &zones
                    .iter()
                    .find(|z| z.zone_id == zone_id)
                    .map(|z| z.install_id.clone())
                    .unwrap_or_else(|| InstallationId::from("")),
                &channel_id,
                &zone_id,
            )?;
            channel_map.insert(channel_id, zone_id);
        }

        let mut store = HashMap::new();
        for zone in zones {
            store.insert(zone.zone_id.clone(), zone);
        }

        *self.zones.write().await = store;
        *self.routing.write().await = routing;
        *self.channel_zone.write().await = channel_map;
        Ok(())
    }

    pub async fn zones(&self) -> Vec<Zone> {
        self.zones.read().await.values().cloned().collect()
    }

    /// Resolve a zone id to its vendor routing tuple, for building the
    /// outbound command envelope.
    pub async fn zone_command_route(&self, zone_id: &ZoneId) -> Option<(InstallationId, u32, u32)> {
        self.zones
            .read()
            .await
            .get(zone_id)
            .map(|z| (z.install_id.clone(), z.channel_zone, z.controller_number))
    }

    /// Resolve a zone id to the `(installationMode, preset)` pair that
    /// selects which setpoint symbol a temperature command should target
    /// (§4.3).
    pub async fn zone_climate_state(&self, zone_id: &ZoneId) -> Option<(InstallationMode, Preset)> {
        self.zones.read().await.get(zone_id).map(|z| (z.installation_mode, z.preset))
    }

    /// Drain the broker's inbound channel for the lifetime of `shutdown`.
    pub fn spawn_listener(self: &Arc<Self>, shutdown: CancellationToken) {
        let engine = Arc::clone(self);
        let mut rx = self.broker.subscribe_inbound();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    msg = rx.recv() => {
                        match msg {
                            Ok(msg) if msg.side == Side::Vendor => {
                                if let Err(e) = engine.handle_vendor_payload(&msg.topic, &msg.payload).await {
                                    warn!(topic = %msg.topic, err = %e, "failed to apply vendor message");
                                }
                            }
                            Ok(_) => {}
                            Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                                warn!(skipped = n, "state listener lagged behind broker inbound channel");
                            }
                            Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
                        }
                    }
                }
            }
        });
    }

    async fn handle_vendor_payload(&self, topic: &str, payload: &[u8]) -> Result<(), StateError> {
        let msg: VendorMessage = serde_json::from_slice(payload)?;
        match msg {
            VendorMessage::ChannelUpdate { data } => {
                self.apply_channel_update(ChannelId::from(data.channel), data.unique.into(), &data.data)
                    .await;
            }
            VendorMessage::Realtime { zones } | VendorMessage::RealtimeUpdate { zones } => {
                if zones.is_empty() {
                    debug!(topic = %topic, "empty realtime payload treated as heartbeat");
                    return Ok(());
                }
                for snapshot in zones {
                    self.apply_channel_update(ChannelId::from(snapshot.channel), InstallationId::from(""), &snapshot.fields)
                        .await;
                }
            }
            VendorMessage::Referential { data } => {
                self.reload_referential_from_blob(&data).await?;
            }
            VendorMessage::LiveData { data } => {
                self.apply_live_data(&data).await;
            }
            VendorMessage::Unknown => {
                debug!(topic = %topic, "unrecognised vendor message type, dropping");
            }
        }
        Ok(())
    }

    async fn apply_channel_update(&self, channel_id: ChannelId, _install_hint: InstallationId, fields: &ChannelFields) {
        let zone_id = match self.channel_zone.read().await.get(&channel_id).cloned() {
            Some(id) => id,
            None => {
                debug!(channel = %channel_id, "channel_update for unrouted channel, dropping");
                return;
            }
        };

        let (install_id, changes) = {
            let mut zones = self.zones.write().await;
            let zone = match zones.get_mut(&zone_id) {
                Some(z) => z,
                None => return,
            };
            let before = zone.clone();
            apply_fields(zone, fields);
            zone.enforce_off_invariant();
            zone.last_seen_at = now_millis();
            (zone.install_id.clone(), diff_zone(&before, zone))
        };

        self.command_engine.confirm(&install_id, &zone_id).await;
        self.publish_changes(&zone_id, changes).await;
    }

    async fn publish_changes(&self, zone_id: &ZoneId, changes: Vec<FieldChange>) {
        for change in changes {
            let topic = topics::leaf_topic(change.domain, &zone_id.0, change.suffix, change.leaf);
            if let Err(e) = self.broker.publish_local(&topic, change.value.into_bytes(), true).await {
                warn!(topic = %topic, err = %e, "failed to publish zone state change to local broker");
            }
        }
    }

    async fn reload_referential_from_blob(&self, compressed: &str) -> Result<(), StateError> {
        let json = referential::lz::decompress(compressed).ok_or(StateError::ReferentialDecode)?;
        let loaded = Referential::from_json(&json).map_err(|_| StateError::ReferentialDecode)?;
        *self.referential.write().await = loaded;
        info!("referential reloaded from vendor push");
        Ok(())
    }

    async fn apply_live_data(&self, envelope: &LiveDataEnvelope) {
        let topic = match envelope.kind.as_str() {
            "LIVE_EMU" => format!("rehau/{}/live_emu", envelope.unique),
            "LIVE_DIDO" => format!("rehau/{}/live_dido", envelope.unique),
            other => {
                debug!(kind = other, "unrecognised live_data kind, dropping");
                return;
            }
        };

        let filtered = filter_live_data(&envelope.kind, &envelope.data);
        let bytes = match serde_json::to_vec(&filtered) {
            Ok(b) => b,
            Err(e) => {
                warn!(err = %e, "failed to serialise live_data payload");
                return;
            }
        };
        if let Err(e) = self.broker.publish_local(&topic, bytes, false).await {
            warn!(topic = %topic, err = %e, "failed to publish live_data to local broker");
        }
    }
}

/// Installation-mode inference at startup (§4.4, §9 open question d): cool
/// iff the installation supports cooling and at least one zone currently
/// shows cooling demand. Heuristic; a one-cycle mismatch is tolerated.
pub fn infer_installation_mode(cooling_supported: bool, any_zone_cooling_demand: bool) -> InstallationMode {
    if cooling_supported && any_zone_cooling_demand {
        InstallationMode::Cool
    } else {
        InstallationMode::Heat
    }
}

fn apply_fields(zone: &mut Zone, fields: &ChannelFields) {
    if let Some(temp) = fields.temp_zone {
        zone.current_temp = Some(rehau_bridge_core::temperature::decode_raw(temp));
    }
    if let Some(humidity) = fields.humidity {
        zone.humidity = Some(humidity);
    }
    if let Some(dewpoint) = fields.dewpoint {
        zone.dewpoint = Some(rehau_bridge_core::temperature::decode_raw(dewpoint));
    }
    if let Some(demand) = fields.demand {
        zone.demand_pct = Some(demand);
    }
    if let Some(demand_state) = fields.demand_state {
        // Treated as advisory (§9 open question a): only overrides the
        // coarse demanding flag, never gates setpoint/mode logic.
        zone.demanding = demand_state;
    }
    // mode_used: 0 comfort, 1 power-save, 2 standby, 3 off.
    if let Some(mode_used) = fields.mode_used {
        match mode_used {
            2 | 3 => zone.mode = Mode::Off,
            _ => {
                zone.mode = if zone.installation_mode == InstallationMode::Cool {
                    Mode::Cool
                } else {
                    Mode::Heat
                };
                zone.preset = if mode_used == 0 { Preset::Comfort } else { Preset::Away };
            }
        }
    }
    if let Some(bits) = &fields.cc_config_bits {
        let (ring, lock) = bits.normalise();
        if let Some(ring) = ring {
            zone.ring_light = ring;
        }
        if let Some(lock) = lock {
            zone.locked = lock;
        }
    }

    if zone.mode != Mode::Off {
        let setpoint_raw = match (zone.installation_mode, zone.preset) {
            (InstallationMode::Heat, Preset::Comfort) => fields.setpoint_h_normal,
            (InstallationMode::Heat, Preset::Away) => fields.setpoint_h_reduced,
            (InstallationMode::Cool, Preset::Comfort) => fields.setpoint_c_normal,
            (InstallationMode::Cool, Preset::Away) => fields.setpoint_c_reduced,
            (_, Preset::None) => None,
        };
        if let Some(raw) = setpoint_raw {
            zone.target_temp = Some(rehau_bridge_core::temperature::decode_raw(raw));
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

/// Drop absent mixed-emitter circuits (sentinel `32767` on the supply
/// reading) before republishing a `LIVE_EMU` payload; pass `LIVE_DIDO`
/// through unchanged.
fn filter_live_data(kind: &str, data: &serde_json::Value) -> serde_json::Value {
    if kind != "LIVE_EMU" {
        return data.clone();
    }
    let Some(circuits) = data.as_array() else { return data.clone() };
    let kept: Vec<serde_json::Value> = circuits
        .iter()
        .filter(|c| {
            c.get("supply_raw")
                .and_then(|v| v.as_i64())
                .map(|raw| raw != ABSENT_CIRCUIT_SENTINEL)
                .unwrap_or(true)
        })
        .cloned()
        .collect();
    serde_json::Value::Array(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rehau_bridge_core::{ChannelZone, ControllerNumber};

    fn sample_zone(mode: Mode, preset: Preset, installation_mode: InstallationMode) -> Zone {
        Zone {
            zone_id: ZoneId::from("zone-1"),
            zone_number: 1,
            channel_zone: 3 as ChannelZone,
            controller_number: 0 as ControllerNumber,
            name: "Bathroom".into(),
            group_name: "Upstairs".into(),
            install_id: InstallationId::from("inst-1"),
            mode,
            preset,
            current_temp: None,
            target_temp: None,
            humidity: None,
            demanding: false,
            demand_pct: None,
            dewpoint: None,
            locked: false,
            ring_light: false,
            installation_mode,
            available: true,
            manual_mode: false,
            last_seen_at: 0,
        }
    }

    #[test]
    fn mode_used_standby_forces_off_and_clears_setpoint() {
        let mut zone = sample_zone(Mode::Heat, Preset::Comfort, InstallationMode::Heat);
        let fields = ChannelFields { mode_used: Some(3), ..Default::default() };
        apply_fields(&mut zone, &fields);
        zone.enforce_off_invariant();
        assert_eq!(zone.mode, Mode::Off);
        assert_eq!(zone.preset, Preset::None);
        assert_eq!(zone.target_temp, None);
    }

    #[test]
    fn mode_used_power_save_maps_to_away_preset() {
        let mut zone = sample_zone(Mode::Heat, Preset::Comfort, InstallationMode::Heat);
        let fields = ChannelFields { mode_used: Some(1), setpoint_h_reduced: Some(650), ..Default::default() };
        apply_fields(&mut zone, &fields);
        assert_eq!(zone.preset, Preset::Away);
        assert_eq!(zone.mode, Mode::Heat);
        assert_eq!(zone.target_temp, Some(rehau_bridge_core::temperature::decode_raw(650)));
    }

    #[test]
    fn setpoint_selection_follows_installation_mode_and_preset() {
        let mut zone = sample_zone(Mode::Cool, Preset::Away, InstallationMode::Cool);
        let fields = ChannelFields { setpoint_c_reduced: Some(650), setpoint_c_normal: Some(700), ..Default::default() };
        apply_fields(&mut zone, &fields);
        assert_eq!(zone.target_temp, Some(rehau_bridge_core::temperature::decode_raw(650)));
    }

    #[test]
    fn cc_config_bits_update_ring_and_lock() {
        let mut zone = sample_zone(Mode::Heat, Preset::Comfort, InstallationMode::Heat);
        let fields = ChannelFields {
            cc_config_bits: Some(messages::CcConfigBits::Bitfield(0b10)),
            ..Default::default()
        };
        apply_fields(&mut zone, &fields);
        assert!(zone.locked);
        assert!(!zone.ring_light);
    }

    #[test]
    fn infer_installation_mode_requires_both_support_and_demand() {
        assert_eq!(infer_installation_mode(true, true), InstallationMode::Cool);
        assert_eq!(infer_installation_mode(true, false), InstallationMode::Heat);
        assert_eq!(infer_installation_mode(false, true), InstallationMode::Heat);
    }

    #[test]
    fn diff_zone_emits_only_changed_leaves() {
        let before = sample_zone(Mode::Heat, Preset::Comfort, InstallationMode::Heat);
        let mut after = before.clone();
        after.current_temp = Some(21.5);
        let changes = diff_zone(&before, &after);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].leaf, "state");
        assert_eq!(changes[0].suffix, Some("temperature"));
        assert_eq!(changes[0].value, "21.5");
    }

    #[test]
    fn filter_live_data_drops_absent_circuit_sentinel() {
        let data = serde_json::json!([
            { "circuit": 1, "supply_raw": 680 },
            { "circuit": 2, "supply_raw": ABSENT_CIRCUIT_SENTINEL },
        ]);
        let filtered = filter_live_data("LIVE_EMU", &data);
        assert_eq!(filtered.as_array().unwrap().len(), 1);
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local inbound pipeline: MQTT command topics -> logical command ->
//! CommandEngine (§5 "Local inbound" pipeline).

use std::collections::BTreeMap;
use std::sync::Arc;

use rehau_bridge_core::{CommandKind, InstallationMode, Preset, WireValue};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{CommandEngine, LogicalCommand};
use crate::broker::{BrokerLink, Side};
use crate::state::StateEngine;

/// Parse `homeassistant/<domain>/rehau_<zoneId>[_<suffix>]/<leaf>_command`
/// leaves into a `LogicalCommand` and submit it.
pub fn spawn(
    broker: Arc<BrokerLink>,
    state: Arc<StateEngine>,
    command_engine: Arc<CommandEngine>,
    shutdown: CancellationToken,
) {
    let mut rx = broker.subscribe_inbound();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                msg = rx.recv() => {
                    match msg {
                        Ok(msg) if msg.side == Side::Local => {
                            handle(&state, &command_engine, &msg.topic, &msg.payload, shutdown.clone()).await;
                        }
                        Ok(_) => {}
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!(skipped = n, "command listener lagged behind broker inbound channel");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
                    }
                }
            }
        }
    });
}

async fn handle(
    state: &Arc<StateEngine>,
    command_engine: &Arc<CommandEngine>,
    topic: &str,
    payload: &[u8],
    shutdown: CancellationToken,
) {
    let Some((zone_id, kind)) = parse_command_topic(topic) else {
        debug!(topic = %topic, "ignoring non-command local topic");
        return;
    };
    let payload = String::from_utf8_lossy(payload).trim().to_owned();

    let Some((install_id, channel_zone, controller_number)) = state.zone_command_route(&zone_id).await else {
        warn!(zone = %zone_id, "command for unknown zone, dropping");
        return;
    };

    let mut fields = BTreeMap::new();
    let cmd_kind = match kind.as_str() {
        "temperature_command" => {
            let Ok(celsius) = payload.parse::<f64>() else {
                warn!(payload = %payload, "invalid temperature_command payload");
                return;
            };
            let (installation_mode, preset) = state
                .zone_climate_state(&zone_id)
                .await
                .unwrap_or((InstallationMode::Heat, Preset::Comfort));
            let symbol = setpoint_symbol(installation_mode, preset);
            let key = command_engine.resolve_key(symbol).await;
            fields.insert(key, WireValue::Int(rehau_bridge_core::temperature::encode_celsius(celsius)));
            CommandKind::Temperature
        }
        "mode_command" => {
            let key = command_engine.resolve_key("mode_used").await;
            let raw = match payload.as_str() {
                "off" => 2,
                _ => 0,
            };
            fields.insert(key, WireValue::Int(raw));
            CommandKind::Mode
        }
        "preset_mode_command" => {
            let key = command_engine.resolve_key("mode_used").await;
            let raw = match payload.as_str() {
                "away" => 1,
                _ => 0,
            };
            fields.insert(key, WireValue::Int(raw));
            CommandKind::Preset
        }
        "command" if topic.contains("/lock/") => {
            let key = command_engine.resolve_key("loc_activation").await;
            fields.insert(key, WireValue::Bool(payload.eq_ignore_ascii_case("LOCK")));
            CommandKind::Lock
        }
        "command" if topic.contains("/light/") => {
            let key = command_engine.resolve_key("ring_function").await;
            fields.insert(key, WireValue::Bool(payload.eq_ignore_ascii_case("ON")));
            CommandKind::RingLight
        }
        other => {
            debug!(leaf = other, "unrecognised command leaf, dropping");
            return;
        }
    };

    command_engine
        .submit(
            LogicalCommand {
                zone_id: zone_id.clone(),
                install_id,
                channel_zone,
                controller_number,
                kind: cmd_kind,
                payload: fields,
            },
            shutdown,
        )
        .await;
}

/// Select the referential symbol for a setpoint command per the
/// installationMode × preset table (§4.3). A zone with no preset yet
/// (not yet reporting a mode) is treated as comfort, the documented
/// default.
fn setpoint_symbol(installation_mode: InstallationMode, preset: Preset) -> &'static str {
    match (installation_mode, preset) {
        (InstallationMode::Heat, Preset::Away) => "setpoint_h_reduced",
        (InstallationMode::Heat, _) => "setpoint_h_normal",
        (InstallationMode::Cool, Preset::Away) => "setpoint_c_reduced",
        (InstallationMode::Cool, _) => "setpoint_c_normal",
    }
}

/// Extract `(zoneId, leaf)` from a command topic of the form
/// `homeassistant/<domain>/rehau_<zoneId>[_<suffix>]/<leaf>`.
fn parse_command_topic(topic: &str) -> Option<(rehau_bridge_core::ZoneId, String)> {
    let mut parts = topic.split('/');
    let _homeassistant = parts.next()?;
    let _domain = parts.next()?;
    let object_id = parts.next()?;
    let leaf = parts.next()?.to_owned();

    let rest = object_id.strip_prefix("rehau_")?;
    let zone_id = rest.split('_').next()?;
    Some((rehau_bridge_core::ZoneId::from(zone_id), leaf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_temperature_command_topic() {
        let (zone_id, leaf) = parse_command_topic("homeassistant/climate/rehau_abc123/temperature_command").unwrap();
        assert_eq!(zone_id.0, "abc123");
        assert_eq!(leaf, "temperature_command");
    }

    #[test]
    fn parses_suffixed_object_id_keeping_only_the_zone_id() {
        let (zone_id, leaf) = parse_command_topic("homeassistant/light/rehau_abc123_ring_light/command").unwrap();
        assert_eq!(zone_id.0, "abc123");
        assert_eq!(leaf, "command");
    }

    #[test]
    fn rejects_non_rehau_topics() {
        assert!(parse_command_topic("homeassistant/climate/other_thing/config").is_none());
    }

    #[test]
    fn setpoint_symbol_follows_installation_mode_and_preset_table() {
        assert_eq!(setpoint_symbol(InstallationMode::Heat, Preset::Comfort), "setpoint_h_normal");
        assert_eq!(setpoint_symbol(InstallationMode::Heat, Preset::Away), "setpoint_h_reduced");
        assert_eq!(setpoint_symbol(InstallationMode::Cool, Preset::Comfort), "setpoint_c_normal");
        assert_eq!(setpoint_symbol(InstallationMode::Cool, Preset::Away), "setpoint_c_reduced");
    }
}

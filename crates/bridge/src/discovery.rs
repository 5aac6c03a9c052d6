// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! DiscoveryPublisher: emits and maintains Home-Assistant-style MQTT
//! discovery configs on the local broker (§4.5).

use std::sync::Arc;

use rehau_bridge_core::{Installation, Zone};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::broker::BrokerLink;
use crate::error::BrokerError;
use crate::topics;

#[derive(Debug, Serialize)]
struct Device {
    identifiers: Vec<String>,
    name: String,
    manufacturer: &'static str,
}

pub struct DiscoveryPublisher {
    broker: Arc<BrokerLink>,
    use_group_in_names: bool,
}

impl DiscoveryPublisher {
    pub fn new(broker: Arc<BrokerLink>, use_group_in_names: bool) -> Arc<Self> {
        Arc::new(Self { broker, use_group_in_names })
    }

    /// Publish every zone's entities plus each installation's outside-temp
    /// sensor and mode-switch climate entity. Called on startup, after a
    /// ZonePoller reload, and after every local-broker reconnect.
    pub async fn emit_all(&self, installations: &[Installation], zones: &[Zone]) {
        for zone in zones {
            if let Err(e) = self.publish_zone(zone).await {
                warn!(zone = %zone.zone_id, err = %e, "failed to publish zone discovery configs");
            }
        }
        for installation in installations {
            if let Err(e) = self.publish_installation(installation).await {
                warn!(install = %installation.id, err = %e, "failed to publish installation discovery configs");
            }
        }
        info!(zones = zones.len(), installations = installations.len(), "discovery configs published");
    }

    async fn publish_zone(&self, zone: &Zone) -> Result<(), BrokerError> {
        let device = Device {
            identifiers: vec![format!("rehau_{}", zone.install_id)],
            name: format!("REHAU {}", zone.install_id),
            manufacturer: "REHAU",
        };
        let name = topics::display_name(zone, self.use_group_in_names);
        let object_id = topics::sanitize_group(&zone.group_name);
        let zone_id = &zone.zone_id.0;

        let climate_config = json!({
            "name": name,
            "unique_id": format!("rehau_{zone_id}_climate"),
            "object_id": format!("{object_id}_{zone_id}"),
            "device": device,
            "modes": ["off", if zone.installation_mode == rehau_bridge_core::InstallationMode::Cool { "cool" } else { "heat" }],
            "mode_state_topic": topics::leaf_topic("climate", zone_id, None, "mode_state"),
            "preset_modes": ["comfort", "away"],
            "preset_mode_state_topic": topics::leaf_topic("climate", zone_id, None, "preset_mode_state"),
            "preset_mode_command_topic": topics::leaf_topic("climate", zone_id, None, "preset_mode_command"),
            "current_temperature_topic": topics::leaf_topic("sensor", zone_id, Some("temperature"), "state"),
            "temperature_state_topic": topics::leaf_topic("climate", zone_id, None, "temperature_state"),
            "temperature_command_topic": topics::leaf_topic("climate", zone_id, None, "temperature_command"),
            "mode_command_topic": topics::leaf_topic("climate", zone_id, None, "mode_command"),
            "temp_step": 0.5,
            "min_temp": 5,
            "max_temp": 30,
            "precision": 0.1,
            "optimistic": true,
        });
        self.publish_config("climate", zone_id, None, climate_config).await?;

        for (suffix, device_class, unit) in [
            ("temperature", Some("temperature"), Some("°C")),
            ("humidity", Some("humidity"), Some("%")),
            ("demanding_percent", None, Some("%")),
            ("dewpoint", Some("temperature"), Some("°C")),
        ] {
            let mut config = json!({
                "name": format!("{name} {suffix}"),
                "unique_id": format!("rehau_{zone_id}_{suffix}"),
                "object_id": format!("{object_id}_{zone_id}_{suffix}"),
                "device": device,
                "state_topic": topics::leaf_topic("sensor", zone_id, Some(suffix), "state"),
            });
            if let Some(dc) = device_class {
                config["device_class"] = json!(dc);
            }
            if let Some(u) = unit {
                config["unit_of_measurement"] = json!(u);
            }
            self.publish_config("sensor", zone_id, Some(suffix), config).await?;
        }

        let binary_config = json!({
            "name": format!("{name} demanding"),
            "unique_id": format!("rehau_{zone_id}_demanding"),
            "object_id": format!("{object_id}_{zone_id}_demanding"),
            "device": device,
            "device_class": "heat",
            "state_topic": topics::leaf_topic("binary_sensor", zone_id, Some("demanding"), "state"),
            "payload_on": "ON",
            "payload_off": "OFF",
        });
        self.publish_config("binary_sensor", zone_id, Some("demanding"), binary_config).await?;

        let light_config = json!({
            "name": format!("{name} ring light"),
            "unique_id": format!("rehau_{zone_id}_ring_light"),
            "object_id": format!("{object_id}_{zone_id}_ring_light"),
            "device": device,
            "state_topic": topics::leaf_topic("light", zone_id, Some("ring_light"), "state"),
            "command_topic": topics::leaf_topic("light", zone_id, Some("ring_light"), "command"),
            "payload_on": "ON",
            "payload_off": "OFF",
            "optimistic": true,
        });
        self.publish_config("light", zone_id, Some("ring_light"), light_config).await?;

        let lock_config = json!({
            "name": format!("{name} lock"),
            "unique_id": format!("rehau_{zone_id}_lock"),
            "object_id": format!("{object_id}_{zone_id}_lock"),
            "device": device,
            "state_topic": topics::leaf_topic("lock", zone_id, Some("lock"), "state"),
            "command_topic": topics::leaf_topic("lock", zone_id, Some("lock"), "command"),
            "optimistic": true,
        });
        self.publish_config("lock", zone_id, Some("lock"), lock_config).await?;

        self.mark_available("climate", zone_id, None).await
    }

    async fn publish_installation(&self, installation: &Installation) -> Result<(), BrokerError> {
        let install_id = &installation.id;
        let outside_temp_config = json!({
            "name": format!("{} outside temperature", installation.name),
            "unique_id": format!("rehau_install_{install_id}_outside_temp"),
            "device_class": "temperature",
            "unit_of_measurement": "°C",
            "state_topic": topics::installation_leaf_topic("sensor", install_id, "outside_temp", "state"),
        });
        let topic = topics::installation_config_topic("sensor", install_id, "outside_temp");
        self.broker
            .publish_local(&topic, serde_json::to_vec(&outside_temp_config)?, true)
            .await?;

        let mode_climate_config = json!({
            "name": format!("{} mode", installation.name),
            "unique_id": format!("rehau_install_{install_id}_mode"),
            "modes": ["heat", "cool"],
            "mode_state_topic": topics::installation_leaf_topic("climate", install_id, "mode", "mode_state"),
            "mode_command_topic": topics::installation_leaf_topic("climate", install_id, "mode", "mode_command"),
            "optimistic": true,
        });
        let topic = topics::installation_config_topic("climate", install_id, "mode");
        self.broker
            .publish_local(&topic, serde_json::to_vec(&mode_climate_config)?, true)
            .await
    }

    async fn publish_config(
        &self,
        domain: &str,
        zone_id: &str,
        suffix: Option<&str>,
        config: serde_json::Value,
    ) -> Result<(), BrokerError> {
        let topic = topics::config_topic(domain, zone_id, suffix);
        let bytes = serde_json::to_vec(&config)?;
        self.broker.publish_local(&topic, bytes, true).await
    }

    async fn mark_available(&self, domain: &str, zone_id: &str, suffix: Option<&str>) -> Result<(), BrokerError> {
        let topic = topics::leaf_topic(domain, zone_id, suffix, "availability");
        self.broker.publish_local(&topic, b"online".to_vec(), true).await
    }
}

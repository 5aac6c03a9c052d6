// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local-broker topic and naming conventions shared by StateEngine,
//! CommandEngine's listener, and DiscoveryPublisher (§4.5, §6.2).
//!
//! Topic format: `homeassistant/<domain>/rehau_<zoneId>[_<suffix>]/<leaf>`.
//! The zone id, not the per-controller zone number, is load-bearing here:
//! earlier revisions keyed on controller+number and collided across
//! controllers sharing a channel-zone index.

use rehau_bridge_core::{InstallationId, Zone};

pub fn object_id(zone_id: &str, suffix: Option<&str>) -> String {
    match suffix {
        Some(s) => format!("rehau_{zone_id}_{s}"),
        None => format!("rehau_{zone_id}"),
    }
}

pub fn config_topic(domain: &str, zone_id: &str, suffix: Option<&str>) -> String {
    format!("homeassistant/{domain}/{}/config", object_id(zone_id, suffix))
}

pub fn leaf_topic(domain: &str, zone_id: &str, suffix: Option<&str>, leaf: &str) -> String {
    format!("homeassistant/{domain}/{}/{leaf}", object_id(zone_id, suffix))
}

pub fn installation_config_topic(domain: &str, install_id: &InstallationId, suffix: &str) -> String {
    format!("homeassistant/{domain}/rehau_install_{install_id}_{suffix}/config")
}

pub fn installation_leaf_topic(domain: &str, install_id: &InstallationId, suffix: &str, leaf: &str) -> String {
    format!("homeassistant/{domain}/rehau_install_{install_id}_{suffix}/{leaf}")
}

/// Sanitize a group name for use in an object_id: lowercased, spaces to
/// underscores. The object_id always carries the sanitized group name.
pub fn sanitize_group(group_name: &str) -> String {
    group_name.to_lowercase().replace(' ', "_")
}

/// Friendly display name: `"<group> <zone>"` when `use_group_in_names` is
/// set, otherwise just `<zone>`.
pub fn display_name(zone: &Zone, use_group_in_names: bool) -> String {
    if use_group_in_names {
        format!("{} {}", zone.group_name, zone.name)
    } else {
        zone.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_id_includes_suffix_when_present() {
        assert_eq!(object_id("abc123", Some("temperature")), "rehau_abc123_temperature");
        assert_eq!(object_id("abc123", None), "rehau_abc123");
    }

    #[test]
    fn sanitize_group_lowercases_and_replaces_spaces() {
        assert_eq!(sanitize_group("Upstairs Rooms"), "upstairs_rooms");
    }
}

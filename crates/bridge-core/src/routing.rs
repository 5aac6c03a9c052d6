// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Routing table: `(installId, channelZone, controllerNumber) -> Zone` and
//! `channelId -> Zone`, enforcing the injectivity invariants from the spec.

use std::collections::HashMap;

use crate::error::RoutingError;
use crate::ids::{ChannelId, ChannelZone, ControllerNumber, InstallationId, ZoneId};

/// Bidirectional routing index used by CommandEngine (to address a vendor
/// publish) and StateEngine (to resolve an inbound `channel_update`).
#[derive(Debug, Default)]
pub struct RoutingTable {
    by_tuple: HashMap<(InstallationId, ChannelZone, ControllerNumber), ZoneId>,
    by_channel: HashMap<ChannelId, ZoneId>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a zone's routing tuple. Fatal error on conflict — the
    /// caller must abort startup rather than guess a disambiguation.
    pub fn insert_tuple(
        &mut self,
        install_id: &InstallationId,
        channel_zone: ChannelZone,
        controller_number: ControllerNumber,
        zone_id: &ZoneId,
    ) -> Result<(), RoutingError> {
        let key = (install_id.clone(), channel_zone, controller_number);
        if let Some(existing) = self.by_tuple.get(&key) {
            if existing != zone_id {
                return Err(RoutingError::DuplicateRoutingKey {
                    install_id: install_id.to_string(),
                    channel_zone,
                    controller_number,
                    existing_zone: existing.to_string(),
                    new_zone: zone_id.to_string(),
                });
            }
            return Ok(());
        }
        self.by_tuple.insert(key, zone_id.clone());
        Ok(())
    }

    /// Register a channel id's owning zone. Fatal error on conflict: a
    /// channel id must never be shared between two zones in an installation.
    pub fn insert_channel(
        &mut self,
        install_id: &InstallationId,
        channel_id: &ChannelId,
        zone_id: &ZoneId,
    ) -> Result<(), RoutingError> {
        if let Some(existing) = self.by_channel.get(channel_id) {
            if existing != zone_id {
                return Err(RoutingError::DuplicateChannelId {
                    install_id: install_id.to_string(),
                    channel_id: channel_id.to_string(),
                    existing_zone: existing.to_string(),
                    new_zone: zone_id.to_string(),
                });
            }
            return Ok(());
        }
        self.by_channel.insert(channel_id.clone(), zone_id.clone());
        Ok(())
    }

    pub fn zone_for_tuple(
        &self,
        install_id: &InstallationId,
        channel_zone: ChannelZone,
        controller_number: ControllerNumber,
    ) -> Option<&ZoneId> {
        self.by_tuple.get(&(install_id.clone(), channel_zone, controller_number))
    }

    pub fn zone_for_channel(&self, channel_id: &ChannelId) -> Option<&ZoneId> {
        self.by_channel.get(channel_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_tuple_for_different_zone_is_fatal() {
        let mut table = RoutingTable::new();
        let install = InstallationId::from("inst-1");
        table.insert_tuple(&install, 3, 0, &ZoneId::from("zone-a")).unwrap();
        let err = table.insert_tuple(&install, 3, 0, &ZoneId::from("zone-b")).unwrap_err();
        assert!(matches!(err, RoutingError::DuplicateRoutingKey { .. }));
    }

    #[test]
    fn same_zone_reinserted_is_not_an_error() {
        let mut table = RoutingTable::new();
        let install = InstallationId::from("inst-1");
        let zone = ZoneId::from("zone-a");
        table.insert_tuple(&install, 3, 0, &zone).unwrap();
        table.insert_tuple(&install, 3, 0, &zone).unwrap();
    }

    #[test]
    fn duplicate_channel_id_for_different_zone_is_fatal() {
        let mut table = RoutingTable::new();
        let install = InstallationId::from("inst-1");
        let channel = ChannelId::from("chan-1");
        table.insert_channel(&install, &channel, &ZoneId::from("zone-a")).unwrap();
        let err = table.insert_channel(&install, &channel, &ZoneId::from("zone-b")).unwrap_err();
        assert!(matches!(err, RoutingError::DuplicateChannelId { .. }));
    }

    #[test]
    fn lookup_by_tuple_and_channel() {
        let mut table = RoutingTable::new();
        let install = InstallationId::from("inst-1");
        let zone = ZoneId::from("zone-a");
        let channel = ChannelId::from("chan-1");
        table.insert_tuple(&install, 3, 0, &zone).unwrap();
        table.insert_channel(&install, &channel, &zone).unwrap();

        assert_eq!(table.zone_for_tuple(&install, 3, 0), Some(&zone));
        assert_eq!(table.zone_for_tuple(&install, 4, 0), None);
        assert_eq!(table.zone_for_channel(&channel), Some(&zone));
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types shared by the core domain model.

use thiserror::Error;

/// Fatal configuration errors discovered while building the routing table.
///
/// Both variants are fatal at startup per the spec: the bridge must not
/// guess a disambiguation for a routing conflict or a duplicate channel.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RoutingError {
    #[error(
        "routing conflict: (channel_zone={channel_zone}, controller_number={controller_number}) \
         already maps to zone {existing_zone} within installation {install_id}, cannot also map to {new_zone}"
    )]
    DuplicateRoutingKey {
        install_id: String,
        channel_zone: u32,
        controller_number: u32,
        existing_zone: String,
        new_zone: String,
    },

    #[error(
        "channel id {channel_id} is already routed to zone {existing_zone} within installation \
         {install_id}, cannot also route to {new_zone}"
    )]
    DuplicateChannelId {
        install_id: String,
        channel_id: String,
        existing_zone: String,
        new_zone: String,
    },
}

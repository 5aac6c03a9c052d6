// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Vendor HTTPS API client (§6.3): user/installation lookups used by
//! AuthEngine's startup fetch and ZonePoller's periodic fallback snapshot.

use rehau_bridge_core::{ChannelZone, ControllerNumber, InstallationMode, Mode, Preset, Zone, ZoneId};
use serde::Deserialize;

use crate::error::AuthError;

const API_BASE: &str = "https://api.rehau.com/v2";

#[derive(Debug, Deserialize)]
pub struct UserDataResponse {
    pub installations: Vec<InstallationPayload>,
}

#[derive(Debug, Deserialize)]
pub struct InstallationPayload {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub cooling_conditions: u32,
    #[serde(default)]
    pub outside_temp_raw: Option<i64>,
}

impl InstallationPayload {
    pub fn cooling_supported(&self) -> bool {
        self.cooling_conditions & 0b1 != 0
    }
}

#[derive(Debug, Deserialize)]
pub struct InstallDataResponse {
    pub zones: Vec<ZonePayload>,
}

#[derive(Debug, Deserialize)]
pub struct ZonePayload {
    #[serde(rename = "_id")]
    pub id: String,
    pub channel_id: String,
    pub channel_zone: ChannelZone,
    pub controller_number: ControllerNumber,
    pub name: String,
    pub group_name: String,
    #[serde(default)]
    pub demand: Option<f64>,
    #[serde(default)]
    pub cooling_active: bool,
}

pub struct HttpClient {
    http: reqwest::Client,
}

impl HttpClient {
    pub fn new() -> Self {
        Self { http: reqwest::Client::new() }
    }

    /// Bearer header carries the raw access token with no `Bearer` prefix.
    pub async fn get_user_data(&self, email: &str, access_token: &str) -> Result<UserDataResponse, AuthError> {
        let url = format!("{API_BASE}/users/{email}/getUserData");
        let resp = self
            .http
            .get(url)
            .header("Authorization", access_token)
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }

    pub async fn get_data_of_install(
        &self,
        email: &str,
        access_token: &str,
        demand_id: &str,
        install_ids: &[String],
    ) -> Result<InstallDataResponse, AuthError> {
        let url = format!("{API_BASE}/users/{email}/getDataofInstall");
        let resp = self
            .http
            .get(url)
            .header("Authorization", access_token)
            .query(&[("demand", demand_id), ("installsList", &install_ids.join(","))])
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Assemble a `Zone` from a fetched `ZonePayload`, inferring mode/preset
/// conservatively as `off`/`none` until the first vendor update arrives.
pub fn zone_from_payload(payload: &ZonePayload, install_id: &str, installation_mode: InstallationMode) -> Zone {
    Zone {
        zone_id: ZoneId::from(payload.id.clone()),
        zone_number: 0,
        channel_zone: payload.channel_zone,
        controller_number: payload.controller_number,
        name: payload.name.clone(),
        group_name: payload.group_name.clone(),
        install_id: install_id.into(),
        mode: Mode::Off,
        preset: Preset::None,
        current_temp: None,
        target_temp: None,
        humidity: None,
        demanding: false,
        demand_pct: payload.demand,
        dewpoint: None,
        locked: false,
        ring_light: false,
        installation_mode,
        available: true,
        manual_mode: false,
        last_seen_at: 0,
    }
}

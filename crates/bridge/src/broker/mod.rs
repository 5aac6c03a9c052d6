// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! BrokerLink: two independent MQTT sessions — vendor cloud (WSS) and local
//! automation broker (TCP) — with manual reconnect, subscription replay and
//! a periodic health check (§4.2).

mod session;

use std::sync::Arc;
use std::time::Duration;

use rumqttc::QoS;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::AuthEngine;
use crate::error::BrokerError;

pub use session::InboundMessage;
use session::MqttSession;

const VENDOR_KEEP_ALIVE: Duration = Duration::from_secs(60);
const VENDOR_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const VENDOR_RECONNECT_COOLDOWN: Duration = Duration::from_secs(15);
const VENDOR_RECONNECT_WAIT: Duration = Duration::from_secs(5);
const VENDOR_RECONNECT_RETRY: Duration = Duration::from_secs(30);
const LOCAL_KEEP_ALIVE: Duration = Duration::from_secs(60);
const LOCAL_RECONNECT_BACKOFF_CAP: Duration = Duration::from_secs(20);
const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Which side a published/received message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Vendor,
    Local,
}

/// Maintains the vendor and local MQTT sessions and fans inbound messages
/// out to subscribers via a broadcast channel.
pub struct BrokerLink {
    vendor: Arc<MqttSession>,
    local: Arc<MqttSession>,
    inbound_tx: broadcast::Sender<InboundMessage>,
    auth: Arc<AuthEngine>,
}

impl BrokerLink {
    pub async fn connect_both(
        auth: Arc<AuthEngine>,
        mqtt_host: &str,
        mqtt_port: u16,
        mqtt_user: Option<&str>,
        mqtt_password: Option<&str>,
        shutdown: CancellationToken,
    ) -> Result<Arc<Self>, BrokerError> {
        let (inbound_tx, _) = broadcast::channel(1024);

        let client_id = format!("app-{}", Uuid::new_v4());
        let email = auth.email().to_owned();
        let access_token = auth.access_token().await.unwrap_or_default();
        let vendor_username = format!("{email}?x-amz-customauthorizer-name=app-front");

        let vendor = MqttSession::connect_vendor(
            &client_id,
            &vendor_username,
            &access_token,
            VENDOR_KEEP_ALIVE,
            VENDOR_CONNECT_TIMEOUT,
            inbound_tx.clone(),
            Side::Vendor,
        )
        .await?;

        let local = MqttSession::connect_local(
            mqtt_host,
            mqtt_port,
            mqtt_user,
            mqtt_password,
            LOCAL_KEEP_ALIVE,
            inbound_tx.clone(),
            Side::Local,
        )
        .await?;

        let link = Arc::new(Self { vendor, local, inbound_tx, auth });

        link.vendor
            .subscribe(&format!("client/{email}"))
            .await?;

        link.spawn_health_checker(shutdown);
        Ok(link)
    }

    /// Subscribe on the vendor session (e.g. `client/<installationId>/realtime`).
    pub async fn subscribe_vendor(&self, topic: &str) -> Result<(), BrokerError> {
        self.vendor.subscribe(topic).await
    }

    pub async fn subscribe_local(&self, topic: &str) -> Result<(), BrokerError> {
        self.local.subscribe(topic).await
    }

    pub async fn publish_vendor(&self, topic: &str, payload: serde_json::Value) -> Result<(), BrokerError> {
        self.vendor.publish(topic, payload, QoS::AtLeastOnce).await
    }

    pub async fn publish_local(
        &self,
        topic: &str,
        payload: impl Into<Vec<u8>>,
        retain: bool,
    ) -> Result<(), BrokerError> {
        self.local.publish_bytes(topic, payload.into(), QoS::AtLeastOnce, retain).await
    }

    /// Register a multi-subscriber handler for inbound messages from either side.
    /// Handlers must not block; dispatch heavy work to a task.
    pub fn subscribe_inbound(&self) -> broadcast::Receiver<InboundMessage> {
        self.inbound_tx.subscribe()
    }

    fn spawn_health_checker(self: &Arc<Self>, shutdown: CancellationToken) {
        let link = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(HEALTH_CHECK_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        link.check_and_reconnect().await;
                    }
                }
            }
        });
    }

    async fn check_and_reconnect(self: &Arc<Self>) {
        if !self.vendor.is_connected() && self.vendor.has_subscriptions() {
            let link = Arc::clone(self);
            tokio::spawn(async move { link.reconnect_vendor().await });
        }
        if !self.local.is_connected() && self.local.has_subscriptions() {
            let link = Arc::clone(self);
            tokio::spawn(async move { link.reconnect_local().await });
        }
    }

    /// Vendor reconnect protocol (§4.2): cooldown-guarded, re-authenticates,
    /// tears down the old client, replays the snapshotted subscription set.
    pub async fn reconnect_vendor(self: &Arc<Self>) {
        if !self.vendor.begin_reconnect(VENDOR_RECONNECT_COOLDOWN) {
            return;
        }

        loop {
            tokio::time::sleep(VENDOR_RECONNECT_WAIT).await;

            if let Err(e) = self.auth.ensure_valid_token().await {
                warn!(err = %e, "vendor reconnect: token refresh failed, retrying");
                tokio::time::sleep(VENDOR_RECONNECT_RETRY).await;
                continue;
            }

            let email = self.auth.email().to_owned();
            let access_token = self.auth.access_token().await.unwrap_or_default();
            let vendor_username = format!("{email}?x-amz-customauthorizer-name=app-front");
            let client_id = self.vendor.client_id().to_owned();

            match self
                .vendor
                .reestablish(&client_id, &vendor_username, &access_token, VENDOR_KEEP_ALIVE, VENDOR_CONNECT_TIMEOUT)
                .await
            {
                Ok(()) => {
                    info!("vendor session re-established, replaying subscriptions");
                    self.vendor.replay_subscriptions().await;
                    self.vendor.end_reconnect();
                    return;
                }
                Err(e) => {
                    warn!(err = %e, "vendor reconnect attempt failed, retrying in 30s");
                    tokio::time::sleep(VENDOR_RECONNECT_RETRY).await;
                }
            }
        }
    }

    /// Local reconnect protocol: analogous, no auth step, bounded backoff.
    pub async fn reconnect_local(self: &Arc<Self>) {
        if !self.local.begin_reconnect(Duration::ZERO) {
            return;
        }

        let mut backoff = Duration::from_secs(5);
        loop {
            match self.local.reestablish_local().await {
                Ok(()) => {
                    info!("local session re-established, replaying subscriptions");
                    self.local.replay_subscriptions().await;
                    self.local.end_reconnect();
                    return;
                }
                Err(e) => {
                    warn!(err = %e, "local reconnect attempt failed, retrying in {backoff:?}");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(LOCAL_RECONNECT_BACKOFF_CAP);
                }
            }
        }
    }
}

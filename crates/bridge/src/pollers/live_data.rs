// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! LiveDataPoller: every tick, request EMU then DIDO live data for each
//! installation (§4.7).

use std::sync::Arc;
use std::time::Duration;

use rehau_bridge_core::Installation;
use serde_json::json;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::broker::BrokerLink;

pub struct LiveDataPoller {
    broker: Arc<BrokerLink>,
    installations: Arc<RwLock<Vec<Installation>>>,
}

impl LiveDataPoller {
    pub fn new(broker: Arc<BrokerLink>, installations: Arc<RwLock<Vec<Installation>>>) -> Arc<Self> {
        Arc::new(Self { broker, installations })
    }

    pub fn spawn(self: &Arc<Self>, interval: Duration, shutdown: CancellationToken) {
        let poller = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = ticker.tick() => poller.poll_once().await,
                }
            }
        });
    }

    async fn poll_once(&self) {
        let installations = self.installations.read().await.clone();
        for installation in installations {
            let topic = format!("client/{}", installation.id);
            if let Err(e) = self.broker.publish_vendor(&topic, json!({"11": "REQ_LIVE", "12": {"DATA": 1}})).await {
                warn!(install = %installation.id, err = %e, "failed to request EMU live data");
                continue;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
            if let Err(e) = self.broker.publish_vendor(&topic, json!({"11": "REQ_LIVE", "12": {"DATA": 0}})).await {
                warn!(install = %installation.id, err = %e, "failed to request DIDO live data");
            }
        }
    }
}

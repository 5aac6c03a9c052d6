// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ReferentialStore: requests and maintains the symbolic<->numeric key
//! dictionary used by CommandEngine and StateEngine (§4.6).

use std::sync::Arc;
use std::time::Duration;

use rehau_bridge_core::Referential;
use serde_json::json;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::auth::AuthEngine;
use crate::broker::BrokerLink;
use crate::error::BrokerError;

const RESPONSE_HANDLER_TIMEOUT: Duration = Duration::from_secs(10);

pub struct ReferentialStore {
    broker: Arc<BrokerLink>,
    auth: Arc<AuthEngine>,
    referential: Arc<RwLock<Referential>>,
}

impl ReferentialStore {
    pub fn new(broker: Arc<BrokerLink>, auth: Arc<AuthEngine>, referential: Arc<RwLock<Referential>>) -> Arc<Self> {
        Arc::new(Self { broker, auth, referential })
    }

    pub fn referential(&self) -> Arc<RwLock<Referential>> {
        Arc::clone(&self.referential)
    }

    /// Publish the request message; the vendor's async `referential` reply
    /// is applied by StateEngine, which shares the same `RwLock<Referential>`.
    /// This only fires the request and forgets it — §4.6's one-shot,
    /// 10-second-expiring handler is modeled by StateEngine simply applying
    /// whichever `referential` message arrives next, so no separate
    /// correlation bookkeeping is needed here beyond the request itself.
    pub async fn load(&self) -> Result<(), BrokerError> {
        let email = self.auth.email();
        let token = self.auth.access_token().await.unwrap_or_default();
        let payload = json!({ "ID": email, "data": {}, "sso": true, "token": token });
        let topic = format!("server/{email}/v1/install/user/referential");
        self.broker.publish_vendor(&topic, payload).await?;
        info!(timeout = ?RESPONSE_HANDLER_TIMEOUT, "referential request published");
        Ok(())
    }

    /// Spawn the daily reload timer.
    pub fn spawn_reload_loop(self: &Arc<Self>, interval: Duration, shutdown: CancellationToken) {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await; // first tick fires immediately; skip it, load() already ran at startup
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = ticker.tick() => {
                        if let Err(e) = store.load().await {
                            warn!(err = %e, "referential reload request failed, will retry next cycle");
                        }
                    }
                }
            }
        });
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A single MQTT session (vendor or local), with subscription bookkeeping
//! and the cooldown/mutex reconnect guard described in §4.2.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, Transport};
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::Side;
use crate::error::BrokerError;

/// A decoded inbound message, tagged with the side it arrived on.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub side: Side,
    pub topic: String,
    pub payload: Vec<u8>,
}

pub struct MqttSession {
    client: RwLock<AsyncClient>,
    event_task: Mutex<Option<JoinHandle<()>>>,
    subscriptions: Mutex<HashSet<String>>,
    connected: AtomicBool,
    last_reconnect_attempt: Mutex<Option<Instant>>,
    reconnecting: AtomicBool,
    client_id: String,
    side: Side,
    inbound_tx: broadcast::Sender<InboundMessage>,
}

impl MqttSession {
    pub async fn connect_vendor(
        client_id: &str,
        username: &str,
        password: &str,
        keep_alive: Duration,
        connect_timeout: Duration,
        inbound_tx: broadcast::Sender<InboundMessage>,
        side: Side,
    ) -> Result<Arc<Self>, BrokerError> {
        let opts = vendor_options(client_id, username, password, keep_alive, connect_timeout);
        let (client, eventloop) = AsyncClient::new(opts, 64);

        let session = Arc::new(Self {
            client: RwLock::new(client),
            event_task: Mutex::new(None),
            subscriptions: Mutex::new(HashSet::new()),
            connected: AtomicBool::new(false),
            last_reconnect_attempt: Mutex::new(None),
            reconnecting: AtomicBool::new(false),
            client_id: client_id.to_owned(),
            side,
            inbound_tx,
        });

        // Vendor side disables library-level auto-reconnect: BrokerLink owns
        // recovery via its own cooldown-guarded reconnect protocol.
        session.spawn_event_task(eventloop, false).await;
        Ok(session)
    }

    pub async fn connect_local(
        host: &str,
        port: u16,
        username: Option<&str>,
        password: Option<&str>,
        keep_alive: Duration,
        inbound_tx: broadcast::Sender<InboundMessage>,
        side: Side,
    ) -> Result<Arc<Self>, BrokerError> {
        let client_id = format!("rehau-bridge-local-{}", uuid::Uuid::new_v4());
        let mut opts = MqttOptions::new(&client_id, host, port);
        opts.set_keep_alive(keep_alive);
        if let (Some(user), Some(pass)) = (username, password) {
            opts.set_credentials(user, pass);
        }

        let (client, eventloop) = AsyncClient::new(opts, 64);
        let session = Arc::new(Self {
            client: RwLock::new(client),
            event_task: Mutex::new(None),
            subscriptions: Mutex::new(HashSet::new()),
            connected: AtomicBool::new(false),
            last_reconnect_attempt: Mutex::new(None),
            reconnecting: AtomicBool::new(false),
            client_id,
            side,
            inbound_tx,
        });

        session.spawn_event_task(eventloop, true).await;
        Ok(session)
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn has_subscriptions(&self) -> bool {
        futures_util::FutureExt::now_or_never(self.subscriptions.lock())
            .map(|s| !s.is_empty())
            .unwrap_or(true)
    }

    /// Adds to the subscription set first, then issues the wire-level
    /// subscribe if connected. The set is replayed on every (re)connect.
    pub async fn subscribe(&self, topic: &str) -> Result<(), BrokerError> {
        let is_new = self.subscriptions.lock().await.insert(topic.to_owned());
        if is_new && self.is_connected() {
            self.client.read().await.subscribe(topic, QoS::AtLeastOnce).await?;
        }
        Ok(())
    }

    pub async fn replay_subscriptions(&self) {
        let topics: Vec<String> = self.subscriptions.lock().await.iter().cloned().collect();
        let client = self.client.read().await;
        for topic in topics {
            if let Err(e) = client.subscribe(&topic, QoS::AtLeastOnce).await {
                warn!(topic = %topic, err = %e, "failed to re-subscribe after reconnect");
            }
        }
    }

    pub async fn publish(&self, topic: &str, payload: serde_json::Value, qos: QoS) -> Result<(), BrokerError> {
        let bytes = serde_json::to_vec(&payload)?;
        self.publish_bytes(topic, bytes, qos, false).await
    }

    pub async fn publish_bytes(
        &self,
        topic: &str,
        payload: Vec<u8>,
        qos: QoS,
        retain: bool,
    ) -> Result<(), BrokerError> {
        self.client.read().await.publish(topic, qos, retain, payload).await?;
        Ok(())
    }

    /// Cooldown-guarded entry into reconnect. Returns false if a reconnect
    /// is already running or the cooldown has not elapsed.
    pub fn begin_reconnect(&self, cooldown: Duration) -> bool {
        if self
            .reconnecting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        let now = Instant::now();
        if let Ok(mut last) = self.last_reconnect_attempt.try_lock() {
            if let Some(prev) = *last {
                if now.duration_since(prev) < cooldown {
                    self.reconnecting.store(false, Ordering::SeqCst);
                    return false;
                }
            }
            *last = Some(now);
        }
        true
    }

    pub fn end_reconnect(&self) {
        self.reconnecting.store(false, Ordering::SeqCst);
    }

    /// Tear down the old client (abort its event task) and open a fresh
    /// vendor session with a freshly refreshed access token.
    pub async fn reestablish(
        self: &Arc<Self>,
        client_id: &str,
        username: &str,
        password: &str,
        keep_alive: Duration,
        connect_timeout: Duration,
    ) -> Result<(), BrokerError> {
        let opts = vendor_options(client_id, username, password, keep_alive, connect_timeout);
        let (client, eventloop) = AsyncClient::new(opts, 64);

        if let Some(old_task) = self.event_task.lock().await.take() {
            old_task.abort();
        }
        *self.client.write().await = client;

        self.spawn_event_task(eventloop, false).await;
        Ok(())
    }

    pub async fn reestablish_local(&self) -> Result<(), BrokerError> {
        // Local session relies on rumqttc's own reconnect loop; "reestablish"
        // here just means the background event task is still alive and will
        // come back up on its own schedule. We only surface an error if the
        // task has died outright.
        if self.event_task.lock().await.is_none() {
            return Err(BrokerError::CooldownActive(Duration::ZERO));
        }
        Ok(())
    }

    async fn spawn_event_task(self: &Arc<Self>, eventloop: EventLoop, auto_reconnect: bool) {
        let session = Arc::clone(self);
        let task = tokio::spawn(async move { session.run_event_loop(eventloop, auto_reconnect).await });
        *self.event_task.lock().await = Some(task);
    }

    async fn run_event_loop(self: Arc<Self>, mut eventloop: EventLoop, auto_reconnect: bool) {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    self.connected.store(true, Ordering::SeqCst);
                    debug!(side = ?self.side, "mqtt session connected");
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let _ = self.inbound_tx.send(InboundMessage {
                        side: self.side,
                        topic: publish.topic.clone(),
                        payload: publish.payload.to_vec(),
                    });
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    self.connected.store(false, Ordering::SeqCst);
                }
                Ok(_) => {}
                Err(e) => {
                    self.connected.store(false, Ordering::SeqCst);
                    warn!(side = ?self.side, err = %e, "mqtt connection error");
                    if !auto_reconnect {
                        // Vendor side: do not let the library silently retry.
                        // BrokerLink's health check and reconnect protocol
                        // own recovery from here.
                        return;
                    }
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
        }
    }
}

fn vendor_options(
    client_id: &str,
    username: &str,
    password: &str,
    keep_alive: Duration,
    connect_timeout: Duration,
) -> MqttOptions {
    let mut opts = MqttOptions::new(client_id, "vendor-cloud-mqtt-gateway", 443);
    opts.set_keep_alive(keep_alive);
    opts.set_connection_timeout(connect_timeout.as_secs());
    opts.set_credentials(username, password);
    opts.set_transport(Transport::wss_with_default_config());
    opts
}

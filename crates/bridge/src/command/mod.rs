// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CommandEngine: per-installation pending-command slot with latest-wins
//! coalescing and confirmation-based retry (§4.3).

pub mod listener;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use rehau_bridge_core::{
    ChannelZone, CommandKind, ControllerNumber, InstallationId, PendingCommand, Referential,
    WireValue, ZoneId,
};

use crate::broker::BrokerLink;
use crate::error::CommandError;

const RETRY_TICK: Duration = Duration::from_secs(5);
const RING_LIGHT_AUTO_CONFIRM: Duration = Duration::from_secs(2);

/// One queue per installation: at most one `PendingCommand` in flight, plus
/// at most one queued successor (the latest submission always wins).
#[derive(Default)]
struct InstallationQueue {
    pending: Option<PendingCommand>,
}

/// Accepts logical commands and turns them into vendor-MQTT publishes, with
/// at-most-one outstanding command per installation and bounded retry.
pub struct CommandEngine {
    queues: RwLock<std::collections::HashMap<InstallationId, Arc<Mutex<InstallationQueue>>>>,
    referential: Arc<RwLock<Referential>>,
    broker: Arc<BrokerLink>,
    next_id: AtomicU64,
    retry_timeout: Duration,
    max_retries: u32,
}

/// A logical command from the local side, already resolved to a zone.
pub struct LogicalCommand {
    pub zone_id: ZoneId,
    pub install_id: InstallationId,
    pub channel_zone: ChannelZone,
    pub controller_number: ControllerNumber,
    pub kind: CommandKind,
    pub payload: BTreeMap<String, WireValue>,
}

impl CommandEngine {
    pub fn new(
        referential: Arc<RwLock<Referential>>,
        broker: Arc<BrokerLink>,
        retry_timeout: Duration,
        max_retries: u32,
    ) -> Arc<Self> {
        Arc::new(Self {
            queues: RwLock::new(std::collections::HashMap::new()),
            referential,
            broker,
            next_id: AtomicU64::new(1),
            retry_timeout,
            max_retries,
        })
    }

    async fn queue_for(&self, install_id: &InstallationId) -> Arc<Mutex<InstallationQueue>> {
        if let Some(queue) = self.queues.read().await.get(install_id) {
            return Arc::clone(queue);
        }
        let mut queues = self.queues.write().await;
        Arc::clone(
            queues
                .entry(install_id.clone())
                .or_insert_with(|| Arc::new(Mutex::new(InstallationQueue::default()))),
        )
    }

    /// Submit a logical command. Latest-wins: any currently pending command
    /// stops waiting for confirmation (it was already sent and will not be
    /// retried) and the new command is sent immediately.
    pub async fn submit(self: &Arc<Self>, cmd: LogicalCommand, shutdown: CancellationToken) {
        let queue = self.queue_for(&cmd.install_id).await;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let pending = PendingCommand {
            id,
            zone_id: cmd.zone_id,
            install_id: cmd.install_id.clone(),
            channel_zone: cmd.channel_zone,
            controller_number: cmd.controller_number,
            kind: cmd.kind,
            payload: cmd.payload,
            sent_at: Instant::now(),
            retries: 0,
        };

        {
            let mut slot = queue.lock().await;
            // Discard whatever was pending: it already fired, and superseding
            // it here means it will never be retried.
            slot.pending = Some(pending.clone());
        }

        self.send(Arc::clone(&queue), pending, shutdown).await;
    }

    async fn send(self: &Arc<Self>, queue: Arc<Mutex<InstallationQueue>>, cmd: PendingCommand, shutdown: CancellationToken) {
        if let Err(e) = self.publish(&cmd).await {
            error!(install_id = %cmd.install_id, err = %e, "initial command publish failed");
        }

        if cmd.kind.auto_confirms() {
            let engine = Arc::clone(self);
            let id = cmd.id;
            let install_id = cmd.install_id.clone();
            tokio::spawn(async move {
                tokio::time::sleep(RING_LIGHT_AUTO_CONFIRM).await;
                engine.auto_confirm(&queue, id, &install_id).await;
            });
            return;
        }

        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.retry_loop(queue, cmd, shutdown).await });
    }

    async fn auto_confirm(&self, queue: &Arc<Mutex<InstallationQueue>>, id: u64, install_id: &InstallationId) {
        let mut slot = queue.lock().await;
        if slot.pending.as_ref().map(|p| p.id) == Some(id) {
            slot.pending = None;
            info!(install_id = %install_id, command_id = id, "command auto-confirmed");
        }
    }

    async fn retry_loop(self: Arc<Self>, queue: Arc<Mutex<InstallationQueue>>, mut cmd: PendingCommand, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = tokio::time::sleep(RETRY_TICK) => {}
            }

            let mut slot = queue.lock().await;
            let still_pending = matches!(slot.pending.as_ref(), Some(p) if p.id == cmd.id);
            if !still_pending {
                // Superseded by a newer command; stop retrying silently.
                return;
            }

            if cmd.sent_at.elapsed() < self.retry_timeout {
                continue;
            }

            cmd.retries += 1;
            if cmd.retries > self.max_retries {
                warn!(
                    install_id = %cmd.install_id,
                    zone = %cmd.zone_id,
                    command = ?cmd.kind,
                    "command dropped after exceeding max retries"
                );
                slot.pending = None;
                return;
            }

            cmd.sent_at = Instant::now();
            drop(slot);

            if let Err(e) = self.publish(&cmd).await {
                error!(install_id = %cmd.install_id, err = %e, "command retry publish failed");
            }
        }
    }

    /// Called by StateEngine when a `channel_update` for a routed zone
    /// arrives. Confirms the pending command for that zone's installation
    /// regardless of which field actually changed.
    pub async fn confirm(&self, install_id: &InstallationId, zone_id: &ZoneId) {
        let queue = self.queue_for(install_id).await;
        let mut slot = queue.lock().await;
        if let Some(pending) = slot.pending.as_ref() {
            if &pending.zone_id == zone_id {
                info!(install_id = %install_id, zone = %zone_id, "command confirmed");
                slot.pending = None;
            }
        }
    }

    async fn publish(&self, cmd: &PendingCommand) -> Result<(), CommandError> {
        let topic = format!("client/{}", cmd.install_id);
        self.broker
            .publish_vendor(&topic, cmd.to_wire_envelope())
            .await
            .map_err(CommandError::Publish)
    }

    /// Resolve a symbolic field to its wire key via the loaded referential,
    /// falling back to the documented constant if not yet loaded.
    pub async fn resolve_key(&self, symbol: &str) -> String {
        self.referential.read().await.resolve(symbol).to_owned()
    }
}

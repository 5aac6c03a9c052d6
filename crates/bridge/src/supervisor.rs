// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process entry point: wires every engine together in the startup order
//! from §5, drains SIGTERM/SIGINT within a 30s budget, and shuts down in
//! reverse order.

use std::sync::Arc;
use std::time::Duration;

use rehau_bridge_core::Referential;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::auth::browser::BrowserLoginProvider;
use crate::auth::mailbox::BasicImapMailbox;
use crate::auth::login_provider::{LoginProvider, MailboxTwoFactorResolver, TwoFactorResolver};
use crate::auth::scripted::ScriptedLoginProvider;
use crate::auth::AuthEngine;
use crate::broker::BrokerLink;
use crate::command::{listener, CommandEngine};
use crate::config::Config;
use crate::discovery::DiscoveryPublisher;
use crate::error::ConfigError;
use crate::http_client::zone_from_payload;
use crate::pollers::{LiveDataPoller, ZonePoller};
use crate::referential_store::ReferentialStore;
use crate::state::{infer_installation_mode, StateEngine};

const AUTH_URL: &str = "https://accounts.rehau.com/auth-srv/authorize";
const OAUTH_SCOPE: &str = "openid offline_access";
const SHUTDOWN_BUDGET: Duration = Duration::from_secs(30);

pub async fn run(config: Config) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    let two_factor = build_two_factor_resolver(&config).await?;
    let login_provider = build_login_provider(&config)?;

    let auth = Arc::new(AuthEngine::new(
        config.email.clone(),
        config.password.clone(),
        config.oauth_client_id.clone(),
        config.oauth_redirect_uri.clone(),
        login_provider,
        Some(two_factor),
        config.force_fresh_login,
        config.force_token_expired,
    ));

    auth.ensure_valid_token()
        .await
        .map_err(|e| anyhow::anyhow!("initial login failed: {e}"))?;
    auth.spawn_refresh_loop(config.token_refresh_interval(), shutdown.clone());
    info!("authenticated as {}", config.email);

    let referential = Arc::new(RwLock::new(Referential::empty()));

    // ReferentialStore.load() is a vendor MQTT publish, so BrokerLink must
    // exist first even though it logically follows AuthEngine in the
    // startup narrative. We construct BrokerLink, then immediately build
    // and fire ReferentialStore, keeping the "request referentials as
    // early as possible" intent.
    let broker = BrokerLink::connect_both(
        Arc::clone(&auth),
        &config.mqtt_host,
        config.mqtt_port,
        config.mqtt_user.as_deref(),
        config.mqtt_password.as_deref(),
        shutdown.clone(),
    )
    .await
    .map_err(|e| anyhow::anyhow!("failed to connect mqtt sessions: {e}"))?;

    let referential_store = ReferentialStore::new(Arc::clone(&broker), Arc::clone(&auth), Arc::clone(&referential));
    referential_store
        .load()
        .await
        .map_err(|e| anyhow::anyhow!("referential request failed: {e}"))?;
    referential_store.spawn_reload_loop(config.referentials_reload_interval(), shutdown.clone());

    let command_engine = CommandEngine::new(
        Arc::clone(&referential),
        Arc::clone(&broker),
        config.command_retry_timeout(),
        config.command_max_retries,
    );

    let discovery = DiscoveryPublisher::new(Arc::clone(&broker), config.use_group_in_names);
    let state = StateEngine::new(Arc::clone(&broker), Arc::clone(&command_engine), Arc::clone(&referential));
    state.spawn_listener(shutdown.clone());

    listener::spawn(Arc::clone(&broker), Arc::clone(&state), Arc::clone(&command_engine), shutdown.clone());

    let installations = load_installations_and_zones(&auth, &state, &broker, &config).await?;
    discovery.emit_all(&installations, &state.zones().await).await;

    let installations_handle = Arc::new(RwLock::new(installations));

    let live_data_poller = LiveDataPoller::new(Arc::clone(&broker), Arc::clone(&installations_handle));
    live_data_poller.spawn(config.live_data_interval(), shutdown.clone());

    let zone_poller = ZonePoller::new(Arc::clone(&auth), Arc::clone(&state), Arc::clone(&discovery), Arc::clone(&installations_handle));
    zone_poller.spawn(config.zone_reload_interval(), shutdown.clone());

    if let Some(port) = config.health_port {
        let state = Arc::clone(&state);
        let health_shutdown = shutdown.clone();
        tokio::spawn(async move { crate::admin::serve(port, state, health_shutdown).await });
    }

    if let Some(after) = config.simulate_disconnect_after() {
        let broker = Arc::clone(&broker);
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            warn!("simulated disconnect fired");
            broker.reconnect_vendor().await;
        });
    }

    shutdown.cancelled().await;
    info!(budget = ?SHUTDOWN_BUDGET, "shutdown signal received, draining");
    let _ = tokio::time::timeout(SHUTDOWN_BUDGET, async {
        // Timers were registered against `shutdown` and stop on their own
        // select branches; this just bounds how long we wait for them.
        tokio::time::sleep(Duration::from_millis(100)).await;
    })
    .await;
    Ok(())
}

async fn build_two_factor_resolver(config: &Config) -> anyhow::Result<Box<dyn TwoFactorResolver>> {
    let host = config
        .pop3_host
        .clone()
        .ok_or_else(|| anyhow::anyhow!(ConfigError::MissingEnv("POP3_HOST")))?;
    let user = config
        .pop3_user
        .clone()
        .ok_or_else(|| anyhow::anyhow!(ConfigError::MissingEnv("POP3_USER")))?;
    let password = config
        .pop3_password
        .clone()
        .ok_or_else(|| anyhow::anyhow!(ConfigError::MissingEnv("POP3_PASSWORD")))?;

    let mailbox = BasicImapMailbox::connect(&host, 993, &user, &password).await?;
    Ok(Box::new(MailboxTwoFactorResolver::new(
        Box::new(mailbox),
        "no-reply@rehau.com",
        Duration::from_secs(10),
        config.pop3_timeout(),
    )))
}

fn build_login_provider(config: &Config) -> anyhow::Result<Box<dyn LoginProvider>> {
    match config.login_method.as_str() {
        "browser" => Ok(Box::new(BrowserLoginProvider::new(
            AUTH_URL,
            config.oauth_client_id.clone(),
            config.oauth_redirect_uri.clone(),
            OAUTH_SCOPE,
        ))),
        "scripted" => Ok(Box::new(ScriptedLoginProvider::new(
            AUTH_URL,
            config.oauth_client_id.clone(),
            config.oauth_redirect_uri.clone(),
            OAUTH_SCOPE,
        )?)),
        other => anyhow::bail!("unknown login method {other:?}"),
    }
}

async fn load_installations_and_zones(
    auth: &Arc<AuthEngine>,
    state: &Arc<StateEngine>,
    _broker: &Arc<BrokerLink>,
    config: &Config,
) -> anyhow::Result<Vec<rehau_bridge_core::Installation>> {
    let http = crate::http_client::HttpClient::new();
    let email = auth.email().to_owned();
    let token = auth.access_token().await.unwrap_or_default();

    let user_data = http.get_user_data(&email, &token).await?;
    let mut installations = Vec::new();
    let mut zones = Vec::new();

    for install_payload in &user_data.installations {
        let install_ids = vec![install_payload.id.clone()];
        let data = http
            .get_data_of_install(&email, &token, &install_payload.id, &install_ids)
            .await?;

        let cool = data.zones.iter().any(|z| z.cooling_active);
        let installation_mode = infer_installation_mode(install_payload.cooling_supported(), cool);

        for zone_payload in &data.zones {
            zones.push(zone_from_payload(zone_payload, &install_payload.id, installation_mode));
        }

        installations.push(rehau_bridge_core::Installation {
            id: install_payload.id.clone().into(),
            name: install_payload.name.clone(),
            outside_temp: install_payload
                .outside_temp_raw
                .map(rehau_bridge_core::temperature::decode_raw),
            cooling_supported: install_payload.cooling_supported(),
            groups: Vec::new(),
        });
    }

    auth.set_installations(installations.clone()).await;
    state.load_zones(zones, Vec::new()).await.map_err(|e| anyhow::anyhow!(e))?;

    if config.simulate_disconnect_after().is_some() {
        info!("disconnect simulation armed");
    }
    Ok(installations)
}

fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                error!(err = %e, "failed to install SIGTERM handler");
                return;
            }
        };
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = tokio::signal::ctrl_c() => {}
        }
        info!("shutdown requested");
        shutdown.cancel();

        // A second signal forces immediate exit rather than waiting out the
        // graceful-shutdown budget.
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = tokio::signal::ctrl_c() => {}
        }
        warn!("second shutdown signal received, exiting immediately");
        std::process::exit(1);
    });
}

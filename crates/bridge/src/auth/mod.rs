// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! AuthEngine: produces and maintains a valid bearer token for HTTPS calls
//! and vendor MQTT authentication (§4.1).

pub mod browser;
pub mod login_provider;
pub mod mailbox;
pub mod oauth;
pub mod pkce;
pub mod scripted;

use std::sync::Arc;
use std::time::{Duration, Instant};

use rehau_bridge_core::Installation;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use self::login_provider::{LoginProvider, TwoFactorResolver};
use self::oauth::TokenResponse;
use crate::error::AuthError;

const REFRESH_MARGIN: Duration = Duration::from_secs(5 * 60);

struct TokenState {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Instant,
}

/// Produces and maintains a valid bearer token, and the HTTPS-fetched list
/// of installations for the authenticated account.
pub struct AuthEngine {
    email: String,
    password: String,
    client_id: String,
    redirect_uri: String,
    http: reqwest::Client,
    login_provider: Box<dyn LoginProvider>,
    two_factor: Option<Box<dyn TwoFactorResolver>>,
    tokens: RwLock<Option<TokenState>>,
    installations: RwLock<Vec<Installation>>,
    force_fresh_login: bool,
    force_token_expired: bool,
}

impl AuthEngine {
    pub fn new(
        email: impl Into<String>,
        password: impl Into<String>,
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        login_provider: Box<dyn LoginProvider>,
        two_factor: Option<Box<dyn TwoFactorResolver>>,
        force_fresh_login: bool,
        force_token_expired: bool,
    ) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            http: reqwest::Client::new(),
            login_provider,
            two_factor,
            tokens: RwLock::new(None),
            installations: RwLock::new(Vec::new()),
            force_fresh_login,
            force_token_expired,
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub async fn access_token(&self) -> Option<String> {
        self.tokens.read().await.as_ref().map(|t| t.access_token.clone())
    }

    pub async fn installations(&self) -> Vec<Installation> {
        self.installations.read().await.clone()
    }

    pub async fn set_installations(&self, installations: Vec<Installation>) {
        *self.installations.write().await = installations;
    }

    /// If a refresh token exists and a fresh login was not forced, attempt
    /// refresh first; on failure (or no refresh token) perform a full login.
    pub async fn ensure_valid_token(&self) -> Result<(), AuthError> {
        if !self.is_expired().await && !self.force_token_expired {
            return Ok(());
        }

        let has_refresh_token = self.tokens.read().await.as_ref().and_then(|t| t.refresh_token.clone());

        if !self.force_fresh_login {
            if let Some(refresh_token) = has_refresh_token {
                match self.refresh_with(&refresh_token).await {
                    Ok(()) => return Ok(()),
                    Err(e) => warn!(err = %e, "token refresh failed, falling back to full login"),
                }
            }
        }

        self.login().await
    }

    async fn is_expired(&self) -> bool {
        match self.tokens.read().await.as_ref() {
            Some(t) => Instant::now() + REFRESH_MARGIN >= t.expires_at,
            None => true,
        }
    }

    /// Full interactive login: drive the configured LoginProvider (browser
    /// or scripted), then exchange the resulting code for tokens.
    pub async fn login(&self) -> Result<(), AuthError> {
        let two_factor = self
            .two_factor
            .as_deref()
            .ok_or(AuthError::NoMailbox)?;

        let auth_code = self
            .login_provider
            .login(&self.email, &self.password, two_factor)
            .await?;

        let token = oauth::exchange_authorization_code(
            &self.http,
            &self.client_id,
            &auth_code.code,
            &auth_code.code_verifier,
            &self.redirect_uri,
        )
        .await?;

        self.store_token(token).await;
        info!(email = %self.email, "login succeeded");
        Ok(())
    }

    /// POST a refresh-token grant; returns new tokens and expiry.
    pub async fn refresh(&self) -> Result<(), AuthError> {
        let refresh_token = self
            .tokens
            .read()
            .await
            .as_ref()
            .and_then(|t| t.refresh_token.clone())
            .ok_or_else(|| AuthError::RefreshFailed("no refresh token available".into()))?;
        self.refresh_with(&refresh_token).await
    }

    async fn refresh_with(&self, refresh_token: &str) -> Result<(), AuthError> {
        let token = oauth::exchange_refresh_token(&self.http, &self.client_id, refresh_token)
            .await
            .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;
        self.store_token(token).await;
        Ok(())
    }

    async fn store_token(&self, token: TokenResponse) {
        let expires_at = Instant::now() + Duration::from_secs(token.expires_in.max(1));
        let refresh_token = token.refresh_token;
        *self.tokens.write().await = Some(TokenState {
            access_token: token.access_token,
            refresh_token,
            expires_at,
        });
    }

    /// Spawn the periodic refresh task (§4.1): fires every `interval`.
    /// Failure cascades refresh -> full login; all errors are caught and
    /// logged so the process keeps running with the existing token.
    pub fn spawn_refresh_loop(
        self: &Arc<Self>,
        interval: Duration,
        shutdown: tokio_util::sync::CancellationToken,
    ) {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = engine.ensure_valid_token().await {
                            error!(err = %e, "periodic token refresh failed, will retry next tick");
                        }
                    }
                }
            }
        });
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-engine error types. Each engine owns a typed error enum; the
//! supervisor only needs to know whether a failure is fatal at startup.

use thiserror::Error;

/// Failures from the authentication engine.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("login failed: {0}")]
    LoginFailed(String),

    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("2FA mailbox not configured")]
    NoMailbox,

    #[error("2FA mailbox polling timed out after {0:?}")]
    MailboxTimeout(std::time::Duration),

    #[error("no 6-digit code found in mailbox message")]
    NoCode,

    #[error("vendor rejected the submitted 2FA code")]
    CodeRejected,

    #[error("browser automation step failed: {0}")]
    Browser(String),

    #[error("http error talking to vendor auth endpoints: {0}")]
    Http(#[from] reqwest::Error),
}

impl AuthError {
    /// Whether this failure should abort the process on first login. On a
    /// refresh-only failure the engine logs and retries on the next tick
    /// instead of calling this.
    pub fn is_fatal_at_startup(&self) -> bool {
        !matches!(self, AuthError::RefreshFailed(_))
    }
}

/// Failures from the dual MQTT session manager.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("mqtt client error: {0}")]
    Client(#[from] rumqttc::ClientError),

    #[error("mqtt connection error: {0}")]
    Connection(#[from] rumqttc::ConnectionError),

    #[error("reconnect rejected, cooldown not elapsed ({0:?} remaining)")]
    CooldownActive(std::time::Duration),

    #[error("auth failure during reconnect: {0}")]
    Auth(#[from] AuthError),

    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failures from the per-zone command queue.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("no zone registered for routing key ({install_id}, {channel_zone}, {controller_number})")]
    UnknownZone {
        install_id: String,
        channel_zone: u32,
        controller_number: u32,
    },

    #[error("publish failed: {0}")]
    Publish(#[from] BrokerError),

    #[error("command {0} exceeded max retries and was dropped")]
    MaxRetriesExceeded(u64),
}

/// Failures from translating vendor messages into entity state.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to parse vendor message: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("referential decompression failed")]
    ReferentialDecode,

    #[error("unrecognised message type {0:?}, dropping")]
    UnknownMessageType(String),
}

/// Fatal, startup-time configuration problems. These and only these cause
/// the supervisor to exit with code 1 before any engine has started.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingEnv(&'static str),

    #[error("invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },

    #[error(transparent)]
    Routing(#[from] rehau_bridge_core::RoutingError),
}

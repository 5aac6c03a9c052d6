// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Login collaborator interfaces. The rest of AuthEngine does not care
//! whether a login is driven by a real browser or a scripted HTTP client.

use std::time::{Duration, Instant};

use crate::auth::mailbox::{extract_six_digit_code, MailboxClient};
use crate::error::AuthError;

/// The authorization code extracted from the vendor's redirect, plus the
/// PKCE verifier needed to redeem it.
#[derive(Debug, Clone)]
pub struct AuthorizationCode {
    pub code: String,
    pub code_verifier: String,
}

/// Resolves the 6-digit 2FA code for an in-progress login. Implementations
/// own the mailbox-polling policy; [`LoginProvider`] only calls `resolve`.
#[async_trait::async_trait]
pub trait TwoFactorResolver: Send + Sync {
    async fn resolve(&self) -> Result<String, AuthError>;
}

/// Drives the 2FA sub-flow (§4.1.1): snapshot the mailbox, poll for a new
/// message from the configured sender, and extract the 6-digit code.
pub struct MailboxTwoFactorResolver {
    mailbox: tokio::sync::Mutex<Box<dyn MailboxClient>>,
    sender_address: String,
    poll_interval: Duration,
    timeout: Duration,
}

impl MailboxTwoFactorResolver {
    pub fn new(
        mailbox: Box<dyn MailboxClient>,
        sender_address: impl Into<String>,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            mailbox: tokio::sync::Mutex::new(mailbox),
            sender_address: sender_address.into(),
            poll_interval,
            timeout,
        }
    }
}

#[async_trait::async_trait]
impl TwoFactorResolver for MailboxTwoFactorResolver {
    async fn resolve(&self) -> Result<String, AuthError> {
        let mut mailbox = self.mailbox.lock().await;
        let _baseline = mailbox.message_count().await?;
        let deadline = Instant::now() + self.timeout;

        let message = mailbox
            .wait_for_new_message_from(&self.sender_address, self.poll_interval, deadline)
            .await?
            .ok_or(AuthError::MailboxTimeout(self.timeout))?;

        let code = extract_six_digit_code(&message.body).ok_or(AuthError::NoCode)?;
        let _ = mailbox.delete(message.sequence_number).await;
        Ok(code)
    }
}

/// Drives the vendor's login page to produce an authorization code. Kept
/// narrow and explicit so browser specifics never leak into the rest of
/// AuthEngine.
#[async_trait::async_trait]
pub trait LoginProvider: Send + Sync {
    async fn login(
        &self,
        email: &str,
        password: &str,
        two_factor: &dyn TwoFactorResolver,
    ) -> Result<AuthorizationCode, AuthError>;
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! 2FA mailbox collaborator. The AuthEngine treats the mailbox as opaque: it
//! only needs message counts, a way to wait for the verification email, and
//! six-digit code extraction.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_imap::types::Fetch;
use regex::Regex;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

use crate::error::AuthError;

/// A single received message, narrowed to what the 2FA flow needs.
#[derive(Debug, Clone)]
pub struct Message {
    pub sequence_number: u32,
    pub body: String,
}

/// Narrow IMAP/POP3-like interface the 2FA sub-flow depends on. Implementations
/// may authenticate with a plain password or an OAuth2 XOAUTH2 token.
#[async_trait::async_trait]
pub trait MailboxClient: Send + Sync {
    async fn message_count(&mut self) -> Result<u32, AuthError>;

    /// Poll every `poll_interval` until a message from `sender_address`
    /// arrives or `deadline` elapses.
    async fn wait_for_new_message_from(
        &mut self,
        sender_address: &str,
        poll_interval: Duration,
        deadline: Instant,
    ) -> Result<Option<Message>, AuthError>;

    async fn delete(&mut self, sequence_number: u32) -> Result<(), AuthError>;
}

/// Parse the first standalone 6-digit run out of an email body.
pub fn extract_six_digit_code(body: &str) -> Option<String> {
    let re = Regex::new(r"\b\d{6}\b").expect("static regex is valid");
    re.find(body).map(|m| m.as_str().to_owned())
}

/// Basic-auth IMAP mailbox, used for `POP3_PROVIDER=basic`.
pub struct BasicImapMailbox {
    session: async_imap::Session<TlsStream<TcpStream>>,
    known_uids: Vec<u32>,
}

impl BasicImapMailbox {
    pub async fn connect(host: &str, port: u16, user: &str, password: &str) -> Result<Self, AuthError> {
        let tcp = TcpStream::connect((host, port))
            .await
            .map_err(|e| AuthError::LoginFailed(format!("imap connect failed: {e}")))?;
        let tls_config = build_tls_config();
        let connector = tokio_rustls::TlsConnector::from(Arc::new(tls_config));
        let domain = rustls_pki_types::ServerName::try_from(host.to_owned())
            .map_err(|e| AuthError::LoginFailed(format!("invalid imap host {host:?}: {e}")))?;
        let tls_stream = connector
            .connect(domain, tcp)
            .await
            .map_err(|e| AuthError::LoginFailed(format!("imap tls handshake failed: {e}")))?;

        let client = async_imap::Client::new(tls_stream);
        let session = client
            .login(user, password)
            .await
            .map_err(|(e, _)| AuthError::LoginFailed(format!("imap login failed: {e}")))?;
        Ok(Self { session, known_uids: Vec::new() })
    }

    async fn select_inbox(&mut self) -> Result<(), AuthError> {
        self.session
            .select("INBOX")
            .await
            .map_err(|e| AuthError::LoginFailed(format!("imap SELECT INBOX failed: {e}")))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl MailboxClient for BasicImapMailbox {
    async fn message_count(&mut self) -> Result<u32, AuthError> {
        self.select_inbox().await?;
        let mailbox = self.session.examine("INBOX").await.map_err(|e| {
            AuthError::LoginFailed(format!("imap EXAMINE INBOX failed: {e}"))
        })?;
        Ok(mailbox.exists)
    }

    async fn wait_for_new_message_from(
        &mut self,
        sender_address: &str,
        poll_interval: Duration,
        deadline: Instant,
    ) -> Result<Option<Message>, AuthError> {
        self.select_inbox().await?;
        loop {
            if Instant::now() >= deadline {
                return Ok(None);
            }

            let uids = self
                .session
                .search(format!("FROM {sender_address} UNSEEN"))
                .await
                .map_err(|e| AuthError::LoginFailed(format!("imap SEARCH failed: {e}")))?;

            for uid in uids {
                if self.known_uids.contains(&uid) {
                    continue;
                }
                self.known_uids.push(uid);

                let mut stream = self
                    .session
                    .fetch(uid.to_string(), "RFC822")
                    .await
                    .map_err(|e| AuthError::LoginFailed(format!("imap FETCH failed: {e}")))?;

                use futures_util::StreamExt;
                if let Some(fetch) = stream.next().await {
                    let fetch: Fetch = fetch
                        .map_err(|e| AuthError::LoginFailed(format!("imap FETCH failed: {e}")))?;
                    if let Some(raw) = fetch.body() {
                        let body = mail_parser::MessageParser::default()
                            .parse(raw)
                            .and_then(|m| m.body_text(0).map(|s| s.to_string()))
                            .unwrap_or_default();
                        return Ok(Some(Message { sequence_number: uid, body }));
                    }
                }
            }

            tokio::time::sleep(poll_interval).await;
        }
    }

    async fn delete(&mut self, sequence_number: u32) -> Result<(), AuthError> {
        self.session
            .store(sequence_number.to_string(), "+FLAGS (\\Deleted)")
            .await
            .map_err(|e| AuthError::LoginFailed(format!("imap STORE failed: {e}")))?;
        let _ = self.session.expunge().await;
        Ok(())
    }
}

fn build_tls_config() -> rustls::ClientConfig {
    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_six_digit_code_from_body() {
        let body = "Your verification code is 482913. It expires in 10 minutes.";
        assert_eq!(extract_six_digit_code(body).as_deref(), Some("482913"));
    }

    #[test]
    fn returns_none_when_no_code_present() {
        let body = "Welcome to your account.";
        assert_eq!(extract_six_digit_code(body), None);
    }

    #[test]
    fn ignores_longer_digit_runs() {
        let body = "Order number 1234567890, code 118822";
        assert_eq!(extract_six_digit_code(body).as_deref(), Some("118822"));
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OAuth2 wire types and the token-endpoint client.

use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Standard OAuth2 token response from `accounts.rehau.com/token-srv/token`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

const TOKEN_URL: &str = "https://accounts.rehau.com/token-srv/token";

pub async fn exchange_authorization_code(
    client: &reqwest::Client,
    client_id: &str,
    code: &str,
    code_verifier: &str,
    redirect_uri: &str,
) -> Result<TokenResponse, AuthError> {
    let body = serde_json::json!({
        "grant_type": "authorization_code",
        "client_id": client_id,
        "code": code,
        "redirect_uri": redirect_uri,
        "code_verifier": code_verifier,
    });
    post_token(client, body).await
}

pub async fn exchange_refresh_token(
    client: &reqwest::Client,
    client_id: &str,
    refresh_token: &str,
) -> Result<TokenResponse, AuthError> {
    let body = serde_json::json!({
        "grant_type": "refresh_token",
        "client_id": client_id,
        "refresh_token": refresh_token,
    });
    post_token(client, body).await
}

async fn post_token(
    client: &reqwest::Client,
    body: serde_json::Value,
) -> Result<TokenResponse, AuthError> {
    let resp = client
        .post(TOKEN_URL)
        .json(&body)
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        return Err(AuthError::LoginFailed(format!(
            "token endpoint returned {status}: {text}"
        )));
    }

    let token: TokenResponse = resp.json().await?;
    Ok(token)
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted-HTTP login provider, for headless deployments without a real
//! browser available. Replays the login form submission and cookie dance
//! directly; works only while the vendor's anti-bot challenge is inactive.

use std::time::Duration;

use crate::auth::login_provider::{AuthorizationCode, LoginProvider, TwoFactorResolver};
use crate::auth::pkce;
use crate::error::AuthError;

pub struct ScriptedLoginProvider {
    client: reqwest::Client,
    auth_url: String,
    client_id: String,
    redirect_uri: String,
    scope: String,
}

impl ScriptedLoginProvider {
    pub fn new(
        auth_url: impl Into<String>,
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        scope: impl Into<String>,
    ) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(AuthError::Http)?;
        Ok(Self {
            client,
            auth_url: auth_url.into(),
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            scope: scope.into(),
        })
    }
}

#[async_trait::async_trait]
impl LoginProvider for ScriptedLoginProvider {
    async fn login(
        &self,
        email: &str,
        password: &str,
        two_factor: &dyn TwoFactorResolver,
    ) -> Result<AuthorizationCode, AuthError> {
        let code_verifier = pkce::generate_code_verifier();
        let code_challenge = pkce::compute_code_challenge(&code_verifier);
        let state = pkce::generate_nonce();
        let auth_url = pkce::build_auth_url(
            &self.auth_url,
            &self.client_id,
            &self.redirect_uri,
            &self.scope,
            &code_challenge,
            &state,
        );

        let login_page = self.client.get(&auth_url).send().await?;
        let login_page_url = login_page.url().to_string();

        let form = [("email", email), ("password", password)];
        let resp = self
            .client
            .post(&login_page_url)
            .form(&form)
            .send()
            .await?;

        let mut redirect_url = resp.url().to_string();

        if resp.status() == reqwest::StatusCode::OK && !redirect_url.starts_with(&self.redirect_uri) {
            let body = resp.text().await.unwrap_or_default();
            if body.contains("verification-code") {
                let code = two_factor.resolve().await?;
                let twofa_resp = self
                    .client
                    .post(&login_page_url)
                    .form(&[("code", code.as_str())])
                    .send()
                    .await?;
                redirect_url = twofa_resp.url().to_string();
            }
        }

        let code = pkce::extract_code_param(&redirect_url).ok_or(AuthError::CodeRejected)?;
        Ok(AuthorizationCode { code, code_verifier })
    }
}

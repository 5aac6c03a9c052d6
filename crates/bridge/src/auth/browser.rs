// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Headless-Chromium login provider. The vendor's login page presents
//! JS/anti-bot challenges that a plain HTTP client cannot satisfy, so this
//! drives a real browser over CDP.

use std::time::Duration;

use chromiumoxide::{Browser, BrowserConfig, Page};
use futures_util::StreamExt;

use crate::auth::login_provider::{AuthorizationCode, LoginProvider, TwoFactorResolver};
use crate::auth::pkce;
use crate::error::AuthError;

const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(60);
const ELEMENT_TIMEOUT: Duration = Duration::from_secs(30);
const REDIRECT_TIMEOUT: Duration = Duration::from_secs(60);

pub struct BrowserLoginProvider {
    auth_url: String,
    client_id: String,
    redirect_uri: String,
    scope: String,
}

impl BrowserLoginProvider {
    pub fn new(
        auth_url: impl Into<String>,
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            auth_url: auth_url.into(),
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            scope: scope.into(),
        }
    }

    async fn launch(&self) -> Result<(Browser, chromiumoxide::Handler), AuthError> {
        let config = BrowserConfig::builder()
            .build()
            .map_err(|e| AuthError::Browser(format!("browser config: {e}")))?;
        Browser::launch(config)
            .await
            .map_err(|e| AuthError::Browser(format!("browser launch failed: {e}")))
    }

    async fn wait_for_url_prefix(&self, page: &Page, prefix: &str) -> Result<String, AuthError> {
        let deadline = tokio::time::Instant::now() + REDIRECT_TIMEOUT;
        loop {
            if let Ok(Some(url)) = page.url().await {
                if url.starts_with(prefix) {
                    return Ok(url);
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(AuthError::Browser(format!(
                    "timed out waiting for redirect to {prefix}"
                )));
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }
}

#[async_trait::async_trait]
impl LoginProvider for BrowserLoginProvider {
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

        let (mut browser, mut handler) = self.launch().await?;
        let handler_task = tokio::spawn(async move { while handler.next().await.is_some() {} });

        let result = self.drive_login(&browser, &auth_url, email, password, two_factor).await;

        let _ = browser.close().await;
        handler_task.abort();

        result.map(|code| AuthorizationCode { code, code_verifier })
    }
}

impl BrowserLoginProvider {
    async fn drive_login(
        &self,
        browser: &Browser,
        auth_url: &str,
        email: &str,
        password: &str,
        two_factor: &dyn TwoFactorResolver,
    ) -> Result<String, AuthError> {
        let page = tokio::time::timeout(NAVIGATION_TIMEOUT, browser.new_page(auth_url))
            .await
            .map_err(|_| AuthError::Browser("navigation timed out".into()))?
            .map_err(|e| AuthError::Browser(format!("navigate failed: {e}")))?;

        let email_field = tokio::time::timeout(ELEMENT_TIMEOUT, page.find_element("#email"))
            .await
            .map_err(|_| AuthError::Browser("email field not found".into()))?
            .map_err(|e| AuthError::Browser(format!("email field: {e}")))?;
        email_field
            .click()
            .await
            .map_err(|e| AuthError::Browser(format!("click email field: {e}")))?;
        email_field
            .type_str(email)
            .await
            .map_err(|e| AuthError::Browser(format!("type email: {e}")))?;

        let password_field = tokio::time::timeout(ELEMENT_TIMEOUT, page.find_element("#password"))
            .await
            .map_err(|_| AuthError::Browser("password field not found".into()))?
            .map_err(|e| AuthError::Browser(format!("password field: {e}")))?;
        password_field
            .click()
            .await
            .map_err(|e| AuthError::Browser(format!("click password field: {e}")))?;
        password_field
            .type_str(password)
            .await
            .map_err(|e| AuthError::Browser(format!("type password: {e}")))?;

        let submit = page
            .find_element("button[type=submit]")
            .await
            .map_err(|e| AuthError::Browser(format!("submit button: {e}")))?;
        submit
            .click()
            .await
            .map_err(|e| AuthError::Browser(format!("click submit: {e}")))?;

        if let Ok(code_field) =
            tokio::time::timeout(Duration::from_secs(10), page.find_element("#verification-code")).await
        {
            let code_field = code_field.map_err(|e| AuthError::Browser(format!("2FA field: {e}")))?;
            let code = two_factor.resolve().await?;
            code_field
                .type_str(&code)
                .await
                .map_err(|e| AuthError::Browser(format!("type 2FA code: {e}")))?;
            let confirm = page
                .find_element("button[type=submit]")
                .await
                .map_err(|e| AuthError::Browser(format!("2FA submit button: {e}")))?;
            confirm
                .click()
                .await
                .map_err(|e| AuthError::Browser(format!("click 2FA submit: {e}")))?;
        }

        let redirect_url = self.wait_for_url_prefix(&page, &self.redirect_uri).await?;
        pkce::extract_code_param(&redirect_url).ok_or(AuthError::CodeRejected)
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

/// Process configuration, read from environment variables (and optional CLI
/// flags for local overrides) at startup.
#[derive(Debug, Clone, clap::Args)]
pub struct Config {
    /// Vendor account email.
    #[arg(long, env = "REHAU_EMAIL")]
    pub email: String,

    /// Vendor account password.
    #[arg(long, env = "REHAU_PASSWORD")]
    pub password: String,

    /// OAuth2 client id registered with the vendor identity provider.
    #[arg(long, env = "OAUTH_CLIENT_ID")]
    pub oauth_client_id: String,

    /// OAuth2 redirect URI the vendor app registration expects.
    #[arg(long, default_value = "com.rehau.nea://callback", env = "OAUTH_REDIRECT_URI")]
    pub oauth_redirect_uri: String,

    /// Interactive login method: "browser" (headless Chromium via CDP) or
    /// "scripted" (plain HTTP form posts, no browser dependency).
    #[arg(long, default_value = "browser", env = "LOGIN_METHOD")]
    pub login_method: String,

    /// Local automation broker host.
    #[arg(long, default_value = "127.0.0.1", env = "MQTT_HOST")]
    pub mqtt_host: String,

    /// Local automation broker port.
    #[arg(long, default_value_t = 1883, env = "MQTT_PORT")]
    pub mqtt_port: u16,

    /// Local automation broker username, if required.
    #[arg(long, env = "MQTT_USER")]
    pub mqtt_user: Option<String>,

    /// Local automation broker password, if required.
    #[arg(long, env = "MQTT_PASSWORD")]
    pub mqtt_password: Option<String>,

    /// Full installation reload interval in seconds.
    #[arg(long, default_value_t = 300, env = "ZONE_RELOAD_INTERVAL")]
    pub zone_reload_interval_secs: u64,

    /// Access-token refresh task interval in seconds.
    #[arg(long, default_value_t = 21_600, env = "TOKEN_REFRESH_INTERVAL")]
    pub token_refresh_interval_secs: u64,

    /// Referential dictionary reload interval in seconds.
    #[arg(long, default_value_t = 86_400, env = "REFERENTIALS_RELOAD_INTERVAL")]
    pub referentials_reload_interval_secs: u64,

    /// Live-data (mixed circuits / digital IO) poll interval in seconds.
    #[arg(long, default_value_t = 300, env = "LIVE_DATA_INTERVAL")]
    pub live_data_interval_secs: u64,

    /// Seconds to wait for a vendor confirmation before retrying a command.
    #[arg(long, default_value_t = 30, env = "COMMAND_RETRY_TIMEOUT")]
    pub command_retry_timeout_secs: u64,

    /// Maximum retries before a pending command is dropped.
    #[arg(long, default_value_t = 3, env = "COMMAND_MAX_RETRIES")]
    pub command_max_retries: u32,

    /// Use `"<group> <zone>"` as the friendly name instead of just `<zone>`.
    #[arg(long, default_value_t = false, env = "USE_GROUP_IN_NAMES")]
    pub use_group_in_names: bool,

    /// 2FA mailbox provider: basic, gmail, or outlook.
    #[arg(long, default_value = "basic", env = "POP3_PROVIDER")]
    pub pop3_provider: String,

    /// 2FA mailbox host (basic provider only).
    #[arg(long, env = "POP3_HOST")]
    pub pop3_host: Option<String>,

    /// 2FA mailbox username.
    #[arg(long, env = "POP3_USER")]
    pub pop3_user: Option<String>,

    /// 2FA mailbox password or OAuth2 refresh token, depending on provider.
    #[arg(long, env = "POP3_PASSWORD")]
    pub pop3_password: Option<String>,

    /// Overall deadline in seconds to wait for the 2FA email.
    #[arg(long, default_value_t = 600, env = "POP3_TIMEOUT")]
    pub pop3_timeout_secs: u64,

    /// Skip refresh-token reuse and force a full interactive login.
    #[arg(long, default_value_t = false, env = "FORCE_FRESH_LOGIN")]
    pub force_fresh_login: bool,

    /// Pretend the current access token is already expired (testing).
    #[arg(long, default_value_t = false, env = "FORCE_TOKEN_EXPIRED")]
    pub force_token_expired: bool,

    /// Force a simulated BrokerLink disconnect after N seconds (testing, 0 = disabled).
    #[arg(long, default_value_t = 0, env = "SIMULATE_DISCONNECT_AFTER_SECONDS")]
    pub simulate_disconnect_after_secs: u64,

    /// Health-check-only HTTP port for the admin surface. Unset disables it.
    #[arg(long, env = "HEALTH_PORT")]
    pub health_port: Option<u16>,

    /// Log format: json or text.
    #[arg(long, default_value = "json", env = "LOG_FORMAT")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "LOG_LEVEL")]
    pub log_level: String,
}

impl Config {
    pub fn zone_reload_interval(&self) -> Duration {
        Duration::from_secs(self.zone_reload_interval_secs)
    }

    pub fn token_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.token_refresh_interval_secs)
    }

    pub fn referentials_reload_interval(&self) -> Duration {
        Duration::from_secs(self.referentials_reload_interval_secs)
    }

    pub fn live_data_interval(&self) -> Duration {
        Duration::from_secs(self.live_data_interval_secs)
    }

    pub fn command_retry_timeout(&self) -> Duration {
        Duration::from_secs(self.command_retry_timeout_secs)
    }

    pub fn pop3_timeout(&self) -> Duration {
        Duration::from_secs(self.pop3_timeout_secs)
    }

    pub fn simulate_disconnect_after(&self) -> Option<Duration> {
        (self.simulate_disconnect_after_secs > 0)
            .then(|| Duration::from_secs(self.simulate_disconnect_after_secs))
    }

    /// Fail fast on combinations the validator can catch before any engine starts.
    pub fn validate(&self) -> Result<(), crate::error::ConfigError> {
        use crate::error::ConfigError;

        if self.email.trim().is_empty() {
            return Err(ConfigError::MissingEnv("REHAU_EMAIL"));
        }
        if self.password.is_empty() {
            return Err(ConfigError::MissingEnv("REHAU_PASSWORD"));
        }
        if self.oauth_client_id.trim().is_empty() {
            return Err(ConfigError::MissingEnv("OAUTH_CLIENT_ID"));
        }
        match self.login_method.as_str() {
            "browser" | "scripted" => {}
            other => {
                return Err(ConfigError::InvalidValue {
                    name: "LOGIN_METHOD",
                    reason: format!("unknown method {other:?}, expected browser|scripted"),
                })
            }
        }
        match self.pop3_provider.as_str() {
            "basic" | "gmail" | "outlook" => {}
            other => {
                return Err(ConfigError::InvalidValue {
                    name: "POP3_PROVIDER",
                    reason: format!("unknown provider {other:?}, expected basic|gmail|outlook"),
                })
            }
        }
        if self.pop3_provider == "basic" && self.pop3_host.is_none() {
            return Err(ConfigError::InvalidValue {
                name: "POP3_HOST",
                reason: "required when POP3_PROVIDER=basic".into(),
            });
        }
        Ok(())
    }
}

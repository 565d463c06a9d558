use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use reqwest::Client;
use tracing::info;

use crate::{
    config::Config,
    models::auth::{AuthRequest, AuthResponse},
};

pub const AUTH_PATH: &str = "/oauth/token";

/// Access token shared between the startup authenticator and every outbound
/// provider call. Absent until authentication succeeds; provider calls made
/// without it are simply rejected upstream.
#[derive(Clone, Default)]
pub struct SharedAccessToken {
    inner: Arc<RwLock<Option<String>>>,
}

impl SharedAccessToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, token: String) {
        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(token);
    }

    pub fn bearer(&self) -> Option<String> {
        let guard = match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.clone()
    }

    pub fn is_set(&self) -> bool {
        self.bearer().is_some()
    }
}

pub struct QontakAuthenticator {
    http_client: Client,
    base_url: String,
    credentials: AuthRequest,
    token: SharedAccessToken,
}

impl QontakAuthenticator {
    pub fn new(config: &Config, token: SharedAccessToken) -> Result<Self, Error> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|_| anyhow!("Failed to build authentication HTTP client"))?;

        Ok(Self {
            http_client,
            base_url: config.qontak_base_url.clone(),
            credentials: AuthRequest {
                client_id: config.qontak_client_id.clone(),
                client_secret: config.qontak_client_secret.clone(),
                grant_type: "password".to_string(),
                username: config.qontak_username.clone(),
                password: config.qontak_password.clone(),
            },
            token,
        })
    }

    /// Exchanges the configured credentials for an access token and publishes
    /// it to the shared holder.
    pub async fn authenticate(&self) -> Result<(), Error> {
        info!(base_url = %self.base_url, "Authenticating to message provider");

        let url = format!("{}{}", self.base_url, AUTH_PATH);

        let response = self
            .http_client
            .post(&url)
            .json(&self.credentials)
            .send()
            .await
            .map_err(|e| anyhow!("Authentication request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Authentication rejected with status {}", status));
        }

        let body = response
            .json::<AuthResponse>()
            .await
            .map_err(|_| anyhow!("Failed to parse authentication response"))?;

        self.token.set(body.access_token);

        info!("Authenticated to message provider successfully");
        Ok(())
    }
}

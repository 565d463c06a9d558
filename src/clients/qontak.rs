use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use reqwest::{Client, StatusCode, multipart};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{
    clients::auth::SharedAccessToken,
    config::Config,
    models::{
        broadcast::{BroadcastData, BroadcastRequest, ProviderResponse, UploadedFile},
        outcome::{DispatchOutcome, ProviderOutcome},
    },
};

pub const BROADCAST_DIRECT_PATH: &str = "/api/open/v1/broadcasts/whatsapp/direct";
pub const FILE_UPLOAD_PATH: &str = "/api/open/v1/file_uploader";

/// HTTP client for the Qontak WhatsApp open API.
///
/// Calls never surface transport or provider errors as `Err`; every attempt
/// collapses into an outcome so a failing candidate cannot abort the batch
/// it is part of.
pub struct QontakClient {
    http_client: Client,
    base_url: String,
    token: SharedAccessToken,
}

impl QontakClient {
    pub fn new(
        base_url: String,
        timeout: Duration,
        token: SharedAccessToken,
    ) -> Result<Self, Error> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|_| anyhow!("Failed to build provider HTTP client"))?;

        Ok(Self {
            http_client,
            base_url,
            token,
        })
    }

    pub fn from_config(config: &Config, token: SharedAccessToken) -> Result<Self, Error> {
        Self::new(
            config.qontak_base_url.clone(),
            Duration::from_secs(config.request_timeout_seconds),
            token,
        )
    }

    /// Sends one direct broadcast and classifies the reply.
    pub async fn send_broadcast(&self, request: &BroadcastRequest) -> DispatchOutcome {
        debug!(
            to_name = %request.to_name,
            template_id = %request.message_template_id,
            "Sending direct broadcast"
        );

        let url = format!("{}{}", self.base_url, BROADCAST_DIRECT_PATH);

        let mut builder = self.http_client.post(&url).json(request);
        if let Some(token) = self.token.bearer() {
            builder = builder.bearer_auth(token);
        }

        let outcome: ProviderOutcome<BroadcastData> = Self::classify(builder.send().await).await;
        outcome.into()
    }

    /// Uploads a PNG attachment and returns the hosted file reference on
    /// success.
    pub async fn upload_file(&self, file_name: &str, bytes: Vec<u8>) -> ProviderOutcome<UploadedFile> {
        debug!(file_name, "Uploading attachment to provider");

        let part = match multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("image/png")
        {
            Ok(part) => part,
            Err(e) => return ProviderOutcome::Unknown(format!("Failed to build multipart body: {}", e)),
        };
        let form = multipart::Form::new().part("file", part);

        let url = format!("{}{}", self.base_url, FILE_UPLOAD_PATH);

        let mut builder = self.http_client.post(&url).multipart(form);
        if let Some(token) = self.token.bearer() {
            builder = builder.bearer_auth(token);
        }

        Self::classify(builder.send().await).await
    }

    /// Folds one provider reply into an outcome.
    ///
    /// The provider wraps refusals for 401 and 422 in the same envelope it
    /// uses for 2xx replies, so those three statuses share the parse path.
    /// Anything else (transport error, timeout, other statuses, bodies that
    /// do not parse) stays `Unknown`: delivery can neither be confirmed nor
    /// ruled out.
    async fn classify<T: DeserializeOwned>(
        result: Result<reqwest::Response, reqwest::Error>,
    ) -> ProviderOutcome<T> {
        let response = match result {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return ProviderOutcome::Unknown(format!("Request timed out: {}", e));
            }
            Err(e) => return ProviderOutcome::Unknown(format!("Request failed: {}", e)),
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return ProviderOutcome::Unknown(format!("Failed to read response body: {}", e));
            }
        };

        let has_envelope = status.is_success()
            || status == StatusCode::UNAUTHORIZED
            || status == StatusCode::UNPROCESSABLE_ENTITY;

        if !has_envelope {
            return ProviderOutcome::Unknown(format!("Unexpected status {}: {}", status, body));
        }

        match serde_json::from_str::<ProviderResponse<T>>(&body) {
            Ok(parsed) if parsed.is_success() => ProviderOutcome::Success(parsed.data),
            Ok(parsed) => ProviderOutcome::Rejected(parsed.error.unwrap_or_default()),
            Err(_) => {
                ProviderOutcome::Unknown(format!("Unparseable {} response: {}", status, body))
            }
        }
    }
}

//! Shared HTTP plumbing for the external ML services.
//!
//! Service calls come from the monitor's plain OS threads, so each call is
//! driven to completion on the daemon's tokio runtime via its handle.

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use deskguard_core::{Frame, ServiceError};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::runtime::Handle;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest error body quoted back in a [`ServiceError`].
const ERROR_BODY_LIMIT: usize = 200;

#[derive(Clone)]
pub struct HttpBridge {
    client: reqwest::Client,
    runtime: Handle,
}

impl HttpBridge {
    pub fn new(runtime: Handle) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ServiceError::Request(e.to_string()))?;
        Ok(Self { client, runtime })
    }

    pub fn post(&self, url: &str) -> reqwest::RequestBuilder {
        self.client.post(url)
    }

    /// Send `request` and decode a JSON reply.
    ///
    /// Blocks the calling thread, which must not be a runtime worker.
    pub fn send_json<R: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<R, ServiceError> {
        self.runtime.block_on(async {
            let response = request
                .send()
                .await
                .map_err(|e| ServiceError::Request(e.without_url().to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ServiceError::Request(format!(
                    "HTTP {status}: {}",
                    truncate(body.trim(), ERROR_BODY_LIMIT)
                )));
            }

            response
                .json::<R>()
                .await
                .map_err(|e| ServiceError::Malformed(e.without_url().to_string()))
        })
    }
}

/// JPEG-encode a frame for a JSON request body.
pub fn frame_to_base64(frame: &Frame) -> Result<String, ServiceError> {
    Ok(BASE64_STANDARD.encode(frame.encode_jpeg()?))
}

fn truncate(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

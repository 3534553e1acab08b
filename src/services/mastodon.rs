// src/services/mastodon.rs

//! Mastodon REST publisher.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::json;

use crate::error::{AppError, Result};
use crate::models::{PublisherConfig, Visibility};
use crate::services::Publisher;

#[derive(Debug, Deserialize)]
struct Created {
    id: String,
}

/// Publishes statuses to a Mastodon-compatible instance.
#[derive(Debug, Clone)]
pub struct MastodonPublisher {
    client: Client,
    base_url: String,
    access_token: String,
}

impl MastodonPublisher {
    pub fn new(client: Client, config: &PublisherConfig, access_token: impl Into<String>) -> Self {
        Self {
            client,
            base_url: config.instance_url.trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send an authenticated request and read back the created entity's id.
    async fn send(&self, request: RequestBuilder, what: &str) -> Result<String> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| AppError::publish(format!("{what}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::publish(format!("{what}: HTTP {status}: {detail}")));
        }

        let created: Created = response
            .json()
            .await
            .map_err(|e| AppError::publish(format!("{what}: {e}")))?;
        Ok(created.id)
    }
}

/// Guess an image MIME type and file name from its leading bytes.
fn sniff_image(bytes: &[u8]) -> (&'static str, &'static str) {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => ("image/jpeg", "poster.jpg"),
        [0x89, b'P', b'N', b'G', ..] => ("image/png", "poster.png"),
        [b'G', b'I', b'F', b'8', ..] => ("image/gif", "poster.gif"),
        [b'I', b'I', 0x2A, 0x00, ..] | [b'M', b'M', 0x00, 0x2A, ..] => ("image/tiff", "poster.tif"),
        _ => ("application/octet-stream", "poster"),
    }
}

#[async_trait]
impl Publisher for MastodonPublisher {
    async fn upload_media(&self, bytes: Vec<u8>, alt_text: &str) -> Result<String> {
        let (mime, file_name) = sniff_image(&bytes);
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime)
            .map_err(AppError::publish)?;
        let form = Form::new()
            .part("file", part)
            .text("description", alt_text.to_string());

        let request = self
            .client
            .post(self.endpoint("/api/v2/media"))
            .multipart(form);
        self.send(request, "media upload").await
    }

    async fn create_status(
        &self,
        text: &str,
        media_ids: &[String],
        visibility: Visibility,
    ) -> Result<String> {
        let request = self
            .client
            .post(self.endpoint("/api/v1/statuses"))
            .json(&json!({
                "status": text,
                "media_ids": media_ids,
                "visibility": visibility,
            }));
        self.send(request, "status creation").await
    }

    async fn reply(&self, parent_id: &str, text: &str) -> Result<String> {
        let request = self
            .client
            .post(self.endpoint("/api/v1/statuses"))
            .json(&json!({
                "status": text,
                "in_reply_to_id": parent_id,
                "visibility": Visibility::Unlisted,
            }));
        self.send(request, "reply").await
    }
}

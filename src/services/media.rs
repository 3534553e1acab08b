//! Image download for publishing.

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{AppError, Result};
use crate::services::MediaSource;

/// Downloads images over HTTP.
#[derive(Debug, Clone)]
pub struct HttpMediaSource {
    client: Client,
}

impl HttpMediaSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MediaSource for HttpMediaSource {
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::publish(format!(
                "image download {url} failed: HTTP {status}"
            )));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

// src/services/catalog.rs

//! Catalog page fetcher for the loc.gov JSON search API.

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{AppError, Result};
use crate::models::{CatalogPage, CatalogResponse, CrawlerConfig};
use crate::services::PageFetcher;
use crate::utils::http;

/// Fetches `fo=json` search pages.
#[derive(Debug, Clone)]
pub struct LocCatalogFetcher {
    client: Client,
}

impl LocCatalogFetcher {
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        Ok(Self {
            client: http::create_async_client(config)?,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for LocCatalogFetcher {
    async fn fetch(&self, url: &str) -> Result<CatalogPage> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::fetch(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::fetch(url, format!("HTTP {status}")));
        }

        let page: CatalogResponse = response
            .json()
            .await
            .map_err(|e| AppError::fetch(url, e))?;
        Ok(page.into())
    }
}

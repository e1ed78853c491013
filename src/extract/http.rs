//! HTTP 抓取实现：GET 页面（带超时与浏览器 UA），再交给 html::parse_html

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{normalize_url, parse_html, ExtractError, ExtractLimits, Extractor};
use crate::config::ExtractSection;
use crate::model::Summary;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

pub struct HttpExtractor {
    client: Client,
    limits: ExtractLimits,
}

impl HttpExtractor {
    pub fn new(timeout_secs: u64, limits: ExtractLimits) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self { client, limits }
    }

    pub fn from_config(cfg: &ExtractSection) -> Self {
        Self::new(
            cfg.timeout_secs,
            ExtractLimits {
                max_text_chars: cfg.max_text_chars,
                max_images: cfg.max_images,
                max_colors: cfg.max_colors,
                max_fonts: cfg.max_fonts,
            },
        )
    }
}

#[async_trait]
impl Extractor for HttpExtractor {
    async fn fetch_summary(&self, url: &str) -> Result<Summary, ExtractError> {
        let url = normalize_url(url)?;
        tracing::info!(url = %url, "fetching page");

        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ExtractError::Network(format!("Request failed: {}", e)))?;
        if !resp.status().is_success() {
            return Err(ExtractError::Network(format!("HTTP {}", resp.status())));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| ExtractError::Network(format!("Read body: {}", e)))?;

        let summary = parse_html(&url, &body, &self.limits)?;
        tracing::info!(
            url = %url,
            images = summary.image_urls.len(),
            colors = summary.css_colors.len(),
            fonts = summary.font_families.len(),
            "page summarised"
        );
        Ok(summary)
    }
}

//! 离线摘要（无网络时使用）
//!
//! 不访问网络，直接以 URL 的 host 拼出一份固定摘要，便于本地跑通整个向导流程。

use async_trait::async_trait;

use super::{normalize_url, ExtractError, Extractor};
use crate::model::Summary;

#[derive(Debug, Default)]
pub struct StaticExtractor;

#[async_trait]
impl Extractor for StaticExtractor {
    async fn fetch_summary(&self, url: &str) -> Result<Summary, ExtractError> {
        let url = normalize_url(url)?;
        let host = url.host_str().unwrap_or("example").to_string();
        Ok(Summary {
            url: url.to_string(),
            title: format!("{} | Home", host),
            text_excerpt: format!("Welcome to {}. We make things people love.", host),
            image_urls: vec![],
            css_colors: vec!["#112233".into(), "#f5f5f5".into(), "#ff6600".into()],
            font_families: vec!["Inter".into()],
            meta_description: format!("Official site of {}", host),
        })
    }
}

//! Extraction Adapter：URL → 网页摘要
//!
//! 编排器只依赖 Extractor trait；HttpExtractor 负责真实抓取，StaticExtractor 用于离线运行。

pub mod html;
pub mod http;
pub mod mock;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::Summary;

pub use html::{parse_html, ExtractLimits};
pub use http::HttpExtractor;
pub use mock::StaticExtractor;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    /// 请求失败、超时或非 2xx 响应（调用方可重试）
    #[error("Network error: {0}")]
    Network(String),

    /// 响应无法解析为网页内容
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// 抓取网页并返回规范化摘要
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn fetch_summary(&self, url: &str) -> Result<Summary, ExtractError>;
}

/// 规范化用户输入的 URL：去空白，缺少协议时补 https://
pub fn normalize_url(raw: &str) -> Result<reqwest::Url, ExtractError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ExtractError::InvalidUrl("empty URL".to_string()));
    }
    let with_scheme = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("https://{}", raw)
    };
    reqwest::Url::parse(&with_scheme).map_err(|e| ExtractError::InvalidUrl(format!("{}: {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url() {
        assert_eq!(
            normalize_url(" example.com/about ").unwrap().as_str(),
            "https://example.com/about"
        );
        assert_eq!(
            normalize_url("http://x.test").unwrap().as_str(),
            "http://x.test/"
        );
        assert!(matches!(normalize_url("  "), Err(ExtractError::InvalidUrl(_))));
    }
}

//! LLM 客户端抽象
//!
//! 文本后端实现 LlmClient::complete（非流式，返回模型原文）；图片后端实现 ImageClient::generate_image（返回 base64 PNG）。

use async_trait::async_trait;
use thiserror::Error;

use super::Message;

/// 模型调用错误；超时由客户端自身判定，编排器原样透出
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Config error: {0}")]
    ConfigError(String),
}

/// 文本模型客户端
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}

/// 图片模型客户端
#[async_trait]
pub trait ImageClient: Send + Sync {
    /// 按 prompt 与画幅（如 "1:1"、"4:5"）生成一张图片，返回 base64 编码的 PNG
    async fn generate_image(&self, prompt: &str, aspect_ratio: &str) -> Result<String, LlmError>;
}

//! 编排错误与错误记录
//!
//! StudioError 是每个编排操作的失败分支；ErrorRecord 是写入 Session.last_error 的可序列化副本。

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::extract::ExtractError;
use crate::generation::GenerationError;

/// 编排操作失败的原因
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StudioError {
    /// 抓取网页失败（调用方可重新 analyze）
    #[error("Network error: {0}")]
    Network(String),

    /// 适配器返回的内容不是合法 JSON 或缺少必填字段
    #[error("Upstream format error: {0}")]
    UpstreamFormat(String),

    /// 生成服务报错或超时，原样透出
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// 输入缺失或当前阶段不允许该操作（未调用任何适配器）
    #[error("Validation error: {0}")]
    Validation(String),

    /// 同一会话上已有修改操作在进行
    #[error("Conflict: {0}")]
    Conflict(String),

    /// 配图请求被更新的一轮生成取代
    #[error("Superseded by a newer generation")]
    Superseded,
}

impl StudioError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StudioError::Network(_) => ErrorKind::Network,
            StudioError::UpstreamFormat(_) => ErrorKind::UpstreamFormat,
            StudioError::Upstream(_) => ErrorKind::Upstream,
            StudioError::Validation(_) => ErrorKind::Validation,
            StudioError::Conflict(_) => ErrorKind::Conflict,
            StudioError::Superseded => ErrorKind::Superseded,
        }
    }

    pub fn busy() -> Self {
        StudioError::Conflict("session busy: another operation is in flight".to_string())
    }
}

impl From<ExtractError> for StudioError {
    fn from(e: ExtractError) -> Self {
        match e {
            ExtractError::Network(msg) => StudioError::Network(msg),
            ExtractError::Parse(msg) => StudioError::UpstreamFormat(msg),
            ExtractError::InvalidUrl(msg) => StudioError::Validation(format!("invalid URL: {}", msg)),
        }
    }
}

impl From<GenerationError> for StudioError {
    fn from(e: GenerationError) -> Self {
        match e {
            GenerationError::Api(msg) => StudioError::Upstream(msg),
            GenerationError::Format(msg) => StudioError::UpstreamFormat(msg),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    UpstreamFormat,
    Upstream,
    Validation,
    Conflict,
    Superseded,
}

/// 编排器对外暴露的操作
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Analyze,
    RefineIdentity,
    ConfirmIdentity,
    GeneratePlan,
    RefinePlan,
    ConfirmPlan,
    RefineSlideImagePrompt,
    GenerateAllImages,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Operation::Analyze => "analyze",
            Operation::RefineIdentity => "refine_identity",
            Operation::ConfirmIdentity => "confirm_identity",
            Operation::GeneratePlan => "generate_plan",
            Operation::RefinePlan => "refine_plan",
            Operation::ConfirmPlan => "confirm_plan",
            Operation::RefineSlideImagePrompt => "refine_slide_image_prompt",
            Operation::GenerateAllImages => "generate_all_images",
        };
        f.write_str(s)
    }
}

/// 最近一次失败的记录（仅供展示，失败从不破坏已有数据）
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    pub operation: Operation,
    pub kind: ErrorKind,
    pub message: String,
    /// 与失败相关的页码（配图失败时非空）
    pub slide_numbers: Vec<u32>,
    pub at: DateTime<Utc>,
}

impl ErrorRecord {
    pub fn new(operation: Operation, err: &StudioError) -> Self {
        Self {
            operation,
            kind: err.kind(),
            message: err.to_string(),
            slide_numbers: Vec::new(),
            at: Utc::now(),
        }
    }

    pub fn with_slides(mut self, slides: Vec<u32>) -> Self {
        self.slide_numbers = slides;
        self
    }
}

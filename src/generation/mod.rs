//! Generation Adapter：结构化请求 → 结构化结果
//!
//! 每种调用都有独立的请求/响应变体与必填字段约定，模型输出格式错误在此层变成
//! GenerationError::Format，编排器不会因为坏 JSON 崩溃。

pub mod llm_generator;
pub mod prompts;
pub mod schema;

use async_trait::async_trait;
use thiserror::Error;

use crate::llm::LlmError;
use crate::model::{Identity, Plan, Slide, Summary};

pub use llm_generator::LlmGenerator;
pub use prompts::PromptTask;

/// 发往生成模型的请求（按调用种类区分）
#[derive(Clone, Debug)]
pub enum GenerationRequest {
    Identity {
        summary: Summary,
        /// 用户补充的业务描述，可为空
        context: String,
    },
    Plan {
        identity: Identity,
        topic: String,
    },
    RefineIdentity {
        identity: Identity,
        feedback: String,
    },
    RefinePlan {
        plan: Plan,
        feedback: String,
    },
    RefineImagePrompt {
        slide: Slide,
        feedback: String,
        identity: Identity,
    },
    Image {
        slide_number: u32,
        prompt: String,
        aspect_ratio: String,
    },
}

impl GenerationRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationRequest::Identity { .. } => "identity",
            GenerationRequest::Plan { .. } => "plan",
            GenerationRequest::RefineIdentity { .. } => "refine_identity",
            GenerationRequest::RefinePlan { .. } => "refine_plan",
            GenerationRequest::RefineImagePrompt { .. } => "refine_image_prompt",
            GenerationRequest::Image { .. } => "image",
        }
    }
}

/// 生成的图片（base64）
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedImage {
    pub encoded_bytes: String,
    pub mime_type: String,
}

/// 生成结果；变体与请求一一对应
#[derive(Clone, Debug)]
pub enum GenerationResponse {
    Identity(Identity),
    Plan(Plan),
    RefinedIdentity(Identity),
    RefinedPlan(Plan),
    RefinedImagePrompt(String),
    Image(GeneratedImage),
}

impl GenerationResponse {
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationResponse::Identity(_) => "identity",
            GenerationResponse::Plan(_) => "plan",
            GenerationResponse::RefinedIdentity(_) => "refined_identity",
            GenerationResponse::RefinedPlan(_) => "refined_plan",
            GenerationResponse::RefinedImagePrompt(_) => "refined_image_prompt",
            GenerationResponse::Image(_) => "image",
        }
    }

    fn mismatch(self, expected: &str) -> GenerationError {
        GenerationError::Format(format!("expected {} response, got {}", expected, self.kind()))
    }

    /// Identity 与 RefinedIdentity 都视为完整品牌识别
    pub fn into_identity(self) -> Result<Identity, GenerationError> {
        match self {
            GenerationResponse::Identity(i) | GenerationResponse::RefinedIdentity(i) => Ok(i),
            other => Err(other.mismatch("identity")),
        }
    }

    pub fn into_plan(self) -> Result<Plan, GenerationError> {
        match self {
            GenerationResponse::Plan(p) | GenerationResponse::RefinedPlan(p) => Ok(p),
            other => Err(other.mismatch("plan")),
        }
    }

    pub fn into_image_prompt(self) -> Result<String, GenerationError> {
        match self {
            GenerationResponse::RefinedImagePrompt(p) => Ok(p),
            other => Err(other.mismatch("refined_image_prompt")),
        }
    }

    pub fn into_image(self) -> Result<GeneratedImage, GenerationError> {
        match self {
            GenerationResponse::Image(img) => Ok(img),
            other => Err(other.mismatch("image")),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// 模型服务报错或超时
    #[error("Generation API error: {0}")]
    Api(String),

    /// 模型输出不是 JSON，或缺少必填字段
    #[error("Malformed model output: {0}")]
    Format(String),
}

impl From<LlmError> for GenerationError {
    fn from(e: LlmError) -> Self {
        GenerationError::Api(e.to_string())
    }
}

/// 生成模型适配器
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, GenerationError>;
}

//! Mock 客户端（用于测试与离线运行，无需 API）
//!
//! MockLlmClient 按 user 消息首行的任务标记返回固定 JSON；MockImageClient 返回 1x1 PNG。

use async_trait::async_trait;
use serde_json::json;

use crate::generation::prompts::{line_value, PromptTask};
use crate::llm::{ImageClient, LlmClient, LlmError, Message, Role};

/// 1x1 透明 PNG
pub const PLACEHOLDER_PNG_BASE64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

#[derive(Debug, Default)]
pub struct MockLlmClient;

fn overlay_prompt(scene: &str, title: &str) -> String {
    format!(
        "{}. Soft studio lighting. 8k resolution, highly detailed, photorealistic, masterpiece. \
         TEXT OVERLAY: The image features the text \"{}\" in a bold sans-serif font, centered and clearly legible.",
        scene, title
    )
}

fn identity_json(tone: &str) -> serde_json::Value {
    json!({
        "brand_identity": {
            "colors": {"primary": "#112233", "secondary": "#f5f5f5", "accent": "#ff6600", "background": "#ffffff"},
            "fonts": {"heading": "Inter", "body": "Inter"},
            "tone": tone,
            "audience": "Small business owners",
            "industry": "Consumer goods"
        },
        "design_recommendation": {
            "style": "minimal",
            "description": "Clean layouts with generous white space",
            "typography": "Bold uppercase headings, regular sentence-case body"
        }
    })
}

fn plan_json(title: &str) -> serde_json::Value {
    let slides: Vec<_> = [
        ("hook", "Meet the Brand", "Hero product on a clean desk"),
        ("body", "Why It Matters", "Close-up of hands using the product"),
        ("body", "How It Works", "Three-step flat lay"),
        ("body", "Loved by Customers", "Smiling customer in natural light"),
        ("cta", "Shop Today", "Product with a bright accent background"),
    ]
    .iter()
    .enumerate()
    .map(|(i, (kind, title, scene))| {
        json!({
            "slide_number": i + 1,
            "type": kind,
            "title": title,
            "body": format!("{} - supporting caption", title),
            "visual_description": scene,
            "image_generation_prompt": overlay_prompt(scene, title),
        })
    })
    .collect();
    json!({"carousel_title": title, "slides": slides})
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("");

        let value = match PromptTask::detect(last_user) {
            Some(PromptTask::Identity) => identity_json("Friendly, confident"),
            Some(PromptTask::RefineIdentity) => {
                let feedback = line_value(last_user, "Feedback:").unwrap_or("");
                identity_json(&format!("Friendly, confident ({})", feedback))
            }
            Some(PromptTask::Plan) => {
                let topic = line_value(last_user, "Campaign topic:").unwrap_or("Brand story");
                plan_json(&format!("{}: a 5-slide story", topic))
            }
            Some(PromptTask::RefinePlan) => plan_json("Revised carousel"),
            Some(PromptTask::RefineImagePrompt) => {
                let title = line_value(last_user, "Title:").unwrap_or("");
                let feedback = line_value(last_user, "Feedback:").unwrap_or("");
                json!({"new_image_generation_prompt": overlay_prompt(feedback, title)})
            }
            None => {
                return Err(LlmError::ApiError("Mock cannot answer an unknown task".to_string()))
            }
        };
        Ok(value.to_string())
    }
}

#[derive(Debug, Default)]
pub struct MockImageClient;

#[async_trait]
impl ImageClient for MockImageClient {
    async fn generate_image(&self, _prompt: &str, _aspect_ratio: &str) -> Result<String, LlmError> {
        Ok(PLACEHOLDER_PNG_BASE64.to_string())
    }
}

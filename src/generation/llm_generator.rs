//! 基于 LlmClient + ImageClient 的 Generator 实现

use std::sync::Arc;

use async_trait::async_trait;

use super::schema::{parse_model_json, IdentityPayload, PlanPayload, RefinedPromptPayload};
use super::{prompts, GeneratedImage, GenerationError, GenerationRequest, GenerationResponse, Generator};
use crate::llm::{ImageClient, LlmClient, Message};
use crate::model::Plan;

pub struct LlmGenerator {
    llm: Arc<dyn LlmClient>,
    images: Arc<dyn ImageClient>,
}

impl LlmGenerator {
    pub fn new(llm: Arc<dyn LlmClient>, images: Arc<dyn ImageClient>) -> Self {
        Self { llm, images }
    }

    async fn complete(&self, kind: &str, messages: Vec<Message>) -> Result<String, GenerationError> {
        let raw = self.llm.complete(&messages).await?;
        let (_, _, total_tokens) = self.llm.token_usage();
        tracing::debug!(kind, chars = raw.len(), total_tokens, "model output received");
        Ok(raw)
    }
}

#[async_trait]
impl Generator for LlmGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, GenerationError> {
        let kind = request.kind();
        match request {
            GenerationRequest::Identity { summary, context } => {
                let raw = self.complete(kind, prompts::identity(&summary, &context)).await?;
                let payload: IdentityPayload = parse_model_json(&raw)?;
                Ok(GenerationResponse::Identity(payload.into()))
            }
            GenerationRequest::Plan { identity, topic } => {
                let raw = self.complete(kind, prompts::plan(&identity, &topic)).await?;
                let plan = Plan::try_from(parse_model_json::<PlanPayload>(&raw)?)?;
                Ok(GenerationResponse::Plan(plan))
            }
            GenerationRequest::RefineIdentity { identity, feedback } => {
                let raw = self
                    .complete(kind, prompts::refine_identity(&identity, &feedback))
                    .await?;
                let payload: IdentityPayload = parse_model_json(&raw)?;
                Ok(GenerationResponse::RefinedIdentity(payload.into()))
            }
            GenerationRequest::RefinePlan { plan, feedback } => {
                let raw = self.complete(kind, prompts::refine_plan(&plan, &feedback)).await?;
                let refined = Plan::try_from(parse_model_json::<PlanPayload>(&raw)?)?;
                Ok(GenerationResponse::RefinedPlan(refined))
            }
            GenerationRequest::RefineImagePrompt {
                slide,
                feedback,
                identity,
            } => {
                let raw = self
                    .complete(kind, prompts::refine_image_prompt(&slide, &feedback, &identity))
                    .await?;
                let payload: RefinedPromptPayload = parse_model_json(&raw)?;
                if payload.new_image_generation_prompt.trim().is_empty() {
                    return Err(GenerationError::Format(
                        "new_image_generation_prompt is empty".to_string(),
                    ));
                }
                Ok(GenerationResponse::RefinedImagePrompt(payload.new_image_generation_prompt))
            }
            GenerationRequest::Image {
                slide_number,
                prompt,
                aspect_ratio,
            } => {
                tracing::debug!(slide = slide_number, "requesting image");
                let encoded = self.images.generate_image(&prompt, &aspect_ratio).await?;
                Ok(GenerationResponse::Image(GeneratedImage {
                    encoded_bytes: encoded,
                    mime_type: "image/png".to_string(),
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmError, MockImageClient, MockLlmClient};
    use crate::model::{Identity, Summary};

    struct RawLlm(&'static str);

    #[async_trait]
    impl LlmClient for RawLlm {
        async fn complete(&self, _messages: &[Message]) -> Result<String, LlmError> {
            Ok(self.0.to_string())
        }
    }

    fn generator(llm: Arc<dyn LlmClient>) -> LlmGenerator {
        LlmGenerator::new(llm, Arc::new(MockImageClient))
    }

    #[tokio::test]
    async fn test_identity_via_mock() {
        let g = generator(Arc::new(MockLlmClient));
        let resp = g
            .generate(GenerationRequest::Identity {
                summary: Summary::default(),
                context: String::new(),
            })
            .await
            .unwrap();
        let identity = resp.into_identity().unwrap();
        assert_eq!(identity.colors.primary, "#112233");
    }

    #[tokio::test]
    async fn test_plan_via_mock_embeds_titles() {
        let g = generator(Arc::new(MockLlmClient));
        let plan = g
            .generate(GenerationRequest::Plan {
                identity: Identity::default(),
                topic: "launch".into(),
            })
            .await
            .unwrap()
            .into_plan()
            .unwrap();
        assert_eq!(plan.slides.len(), 5);
        for slide in &plan.slides {
            assert!(slide.prompt().unwrap().contains(&slide.title));
        }
    }

    #[tokio::test]
    async fn test_garbage_output_is_format_error() {
        let g = generator(Arc::new(RawLlm("I'd be happy to help!")));
        let err = g
            .generate(GenerationRequest::RefineIdentity {
                identity: Identity::default(),
                feedback: "bolder".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Format(_)));
    }

    #[tokio::test]
    async fn test_empty_refined_prompt_is_rejected() {
        let g = generator(Arc::new(RawLlm(r#"{"new_image_generation_prompt": "  "}"#)));
        let err = g
            .generate(GenerationRequest::RefineImagePrompt {
                slide: crate::model::Slide {
                    number: 1,
                    kind: crate::model::SlideKind::Hook,
                    title: "Hi".into(),
                    body: String::new(),
                    visual_description: String::new(),
                    image_prompt: None,
                },
                feedback: "x".into(),
                identity: Identity::default(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Format(_)));
    }

    #[tokio::test]
    async fn test_image_request_returns_png() {
        let g = generator(Arc::new(MockLlmClient));
        let img = g
            .generate(GenerationRequest::Image {
                slide_number: 1,
                prompt: "p".into(),
                aspect_ratio: "1:1".into(),
            })
            .await
            .unwrap()
            .into_image()
            .unwrap();
        assert_eq!(img.mime_type, "image/png");
        assert!(!img.encoded_bytes.is_empty());
    }
}

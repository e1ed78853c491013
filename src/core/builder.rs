//! 从配置组装适配器与编排器
//!
//! 根据 provider 与环境变量选择后端：GEMINI_API_KEY → Gemini（OpenAI 兼容端点 + Imagen），
//! OPENAI_API_KEY → OpenAI 兼容端点；都没有或 provider = "mock" 时退回离线 Mock。

use std::sync::Arc;

use crate::config::{AppConfig, GEMINI_OPENAI_BASE};
use crate::core::orchestrator::{OrchestratorOptions, StageOrchestrator};
use crate::extract::{Extractor, HttpExtractor, StaticExtractor};
use crate::generation::{Generator, LlmGenerator};
use crate::llm::{ImageClient, ImagenClient, LlmClient, MockImageClient, MockLlmClient, OpenAiClient};

fn env_key(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn is_offline(cfg: &AppConfig) -> bool {
    cfg.llm.provider.eq_ignore_ascii_case("mock")
}

/// 文本模型客户端
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    if is_offline(cfg) {
        tracing::info!("Using Mock LLM (provider = mock)");
        return Arc::new(MockLlmClient);
    }
    let provider = cfg.llm.provider.to_lowercase();
    let timeout = cfg.llm.timeouts.request;
    let gemini = env_key("GEMINI_API_KEY");
    let openai = env_key("OPENAI_API_KEY");

    match (provider.as_str(), gemini, openai) {
        ("openai", _, Some(key)) => {
            tracing::info!("Using OpenAI-compatible LLM ({})", cfg.llm.model);
            Arc::new(OpenAiClient::new(cfg.llm.base_url.as_deref(), &cfg.llm.model, &key, timeout))
        }
        (_, Some(key), _) => {
            let base = cfg.llm.base_url.as_deref().unwrap_or(GEMINI_OPENAI_BASE);
            tracing::info!("Using Gemini LLM ({})", cfg.llm.model);
            Arc::new(OpenAiClient::new(Some(base), &cfg.llm.model, &key, timeout))
        }
        (_, None, Some(key)) => {
            tracing::info!("Using OpenAI-compatible LLM ({})", cfg.llm.model);
            Arc::new(OpenAiClient::new(cfg.llm.base_url.as_deref(), &cfg.llm.model, &key, timeout))
        }
        _ => {
            tracing::warn!("No API key set, using Mock LLM");
            Arc::new(MockLlmClient)
        }
    }
}

/// 图片模型客户端；Imagen 只接受 Gemini Key
pub fn create_image_client_from_config(cfg: &AppConfig) -> Arc<dyn ImageClient> {
    if is_offline(cfg) {
        return Arc::new(MockImageClient);
    }
    match env_key("GEMINI_API_KEY") {
        Some(key) => {
            tracing::info!("Using Imagen ({})", cfg.llm.image_model);
            Arc::new(ImagenClient::new(
                &cfg.llm.image_base_url,
                &cfg.llm.image_model,
                &key,
                cfg.llm.timeouts.request,
            ))
        }
        None => {
            tracing::warn!("GEMINI_API_KEY not set, using placeholder images");
            Arc::new(MockImageClient)
        }
    }
}

pub fn create_generator_from_config(cfg: &AppConfig) -> Arc<dyn Generator> {
    Arc::new(LlmGenerator::new(
        create_llm_from_config(cfg),
        create_image_client_from_config(cfg),
    ))
}

/// 离线模式下不访问网络
pub fn create_extractor_from_config(cfg: &AppConfig) -> Arc<dyn Extractor> {
    if is_offline(cfg) {
        Arc::new(StaticExtractor)
    } else {
        Arc::new(HttpExtractor::from_config(&cfg.extract))
    }
}

pub fn build_orchestrator(cfg: &AppConfig) -> StageOrchestrator {
    StageOrchestrator::new(
        create_extractor_from_config(cfg),
        create_generator_from_config(cfg),
        OrchestratorOptions::from(cfg),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock_config() -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.llm.provider = "mock".to_string();
        cfg
    }

    #[tokio::test]
    async fn test_mock_provider_runs_offline() {
        let orchestrator = build_orchestrator(&mock_config());
        let identity = orchestrator.analyze("acme.test", "").await.unwrap();
        assert_eq!(identity.colors.primary, "#112233");
        assert_eq!(orchestrator.snapshot().summary.unwrap().url, "https://acme.test/");
    }

    #[test]
    fn test_options_follow_config() {
        let mut cfg = mock_config();
        cfg.app.max_concurrent_images = 3;
        cfg.app.aspect_ratio = "4:5".to_string();
        let opts = OrchestratorOptions::from(&cfg);
        assert_eq!(opts.max_concurrent_images, 3);
        assert_eq!(opts.aspect_ratio, "4:5");
        assert_eq!(opts.default_topic, "General brand awareness and value proposition");
    }
}

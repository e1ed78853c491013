//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `CAROUSEL__*` 覆盖（双下划线表示嵌套，如 `CAROUSEL__LLM__PROVIDER=mock`）。
//! API Key 不进配置文件，只从 `GEMINI_API_KEY` / `OPENAI_API_KEY` 读取。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub extract: ExtractSection,
}

/// [app] 段：默认主题、配图并发、画幅
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    pub name: Option<String>,
    /// generate_plan 主题为空时使用
    #[serde(default = "default_topic")]
    pub default_topic: String,
    /// 同时进行的配图请求上限
    #[serde(default = "default_max_concurrent_images")]
    pub max_concurrent_images: usize,
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            default_topic: default_topic(),
            max_concurrent_images: default_max_concurrent_images(),
            aspect_ratio: default_aspect_ratio(),
        }
    }
}

fn default_topic() -> String {
    "General brand awareness and value proposition".to_string()
}

fn default_max_concurrent_images() -> usize {
    8
}

fn default_aspect_ratio() -> String {
    "1:1".to_string()
}

/// [llm] 段：文本模型（OpenAI 兼容端点）与图片模型（Imagen predict）
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：gemini / openai / mock；未设置对应 API Key 时退回 mock
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default = "default_image_model")]
    pub image_model: String,
    #[serde(default = "default_image_base_url")]
    pub image_base_url: String,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            image_model: default_image_model(),
            image_base_url: default_image_base_url(),
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

fn default_provider() -> String {
    "gemini".to_string()
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_image_model() -> String {
    "imagen-3.0-generate-001".to_string()
}

fn default_image_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

/// Gemini 的 OpenAI 兼容端点
pub const GEMINI_OPENAI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    60
}

/// [extract] 段：抓取超时与各字段上限
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractSection {
    #[serde(default = "default_extract_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,
    #[serde(default = "default_max_images")]
    pub max_images: usize,
    #[serde(default = "default_max_colors")]
    pub max_colors: usize,
    #[serde(default = "default_max_fonts")]
    pub max_fonts: usize,
}

impl Default for ExtractSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_extract_timeout(),
            max_text_chars: default_max_text_chars(),
            max_images: default_max_images(),
            max_colors: default_max_colors(),
            max_fonts: default_max_fonts(),
        }
    }
}

fn default_extract_timeout() -> u64 {
    30
}

fn default_max_text_chars() -> usize {
    10_000
}

fn default_max_images() -> usize {
    10
}

fn default_max_colors() -> usize {
    20
}

fn default_max_fonts() -> usize {
    10
}

/// 从 config 目录加载配置，环境变量 CAROUSEL__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 CAROUSEL__*
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    for name in ["config/default", "../config/default"] {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("CAROUSEL")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.app.default_topic, "General brand awareness and value proposition");
        assert_eq!(cfg.app.aspect_ratio, "1:1");
        assert_eq!(cfg.extract.max_text_chars, 10_000);
        assert_eq!(cfg.extract.max_colors, 20);
        assert_eq!(cfg.llm.timeouts.request, 60);
    }

    #[test]
    fn test_load_explicit_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[app]\nmax_concurrent_images = 2\n\n[llm]\nprovider = \"mock\"\n",
        )
        .unwrap();
        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.app.max_concurrent_images, 2);
        assert_eq!(cfg.llm.provider, "mock");
        assert_eq!(cfg.extract.max_fonts, 10);
    }
}

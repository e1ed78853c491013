//! 模型输出的 JSON 结构（wire DTO）与解析
//!
//! DTO 字段名与提示词中约定的 JSON 一致（snake_case）；未标 `#[serde(default)]` 的字段为必填，
//! 缺失即 GenerationError::Format。schemars 生成的 Schema 会拼入提示词，减少模型输出格式错误。

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::GenerationError;
use crate::model::{BrandColors, BrandFonts, Identity, Plan, Slide, SlideKind};

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct ColorsPayload {
    /// 主色 hex，如 #112233
    pub primary: String,
    pub secondary: String,
    pub accent: String,
    pub background: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct FontsPayload {
    pub heading: String,
    pub body: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct BrandIdentityPayload {
    pub colors: ColorsPayload,
    pub fonts: FontsPayload,
    #[serde(default)]
    pub tone: String,
    #[serde(default)]
    pub audience: String,
    #[serde(default)]
    pub industry: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct DesignRecommendationPayload {
    /// minimal | bold | luxury | playful
    pub style: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub typography: String,
}

/// 品牌识别（analyze 与 refine_identity 共用）
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct IdentityPayload {
    pub brand_identity: BrandIdentityPayload,
    pub design_recommendation: DesignRecommendationPayload,
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct SlidePayload {
    pub slide_number: u32,
    /// hook | body | cta
    #[serde(rename = "type", default)]
    pub kind: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub visual_description: String,
    /// 完整的图片生成 prompt，必须原样包含 title
    #[serde(default)]
    pub image_generation_prompt: Option<String>,
}

/// 内容规划（generate_plan 与 refine_plan 共用）
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct PlanPayload {
    pub carousel_title: String,
    pub slides: Vec<SlidePayload>,
}

#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema)]
pub struct RefinedPromptPayload {
    pub new_image_generation_prompt: String,
}

impl From<IdentityPayload> for Identity {
    fn from(p: IdentityPayload) -> Self {
        let IdentityPayload {
            brand_identity: b,
            design_recommendation: d,
        } = p;
        Identity {
            colors: BrandColors {
                primary: b.colors.primary,
                secondary: b.colors.secondary,
                accent: b.colors.accent,
                background: b.colors.background,
            },
            fonts: BrandFonts {
                heading: b.fonts.heading,
                body: b.fonts.body,
            },
            tone: b.tone,
            audience: b.audience,
            industry: b.industry,
            design_style: d.style,
            design_description: d.description,
            typography_notes: d.typography,
        }
    }
}

impl From<&Identity> for IdentityPayload {
    fn from(i: &Identity) -> Self {
        IdentityPayload {
            brand_identity: BrandIdentityPayload {
                colors: ColorsPayload {
                    primary: i.colors.primary.clone(),
                    secondary: i.colors.secondary.clone(),
                    accent: i.colors.accent.clone(),
                    background: i.colors.background.clone(),
                },
                fonts: FontsPayload {
                    heading: i.fonts.heading.clone(),
                    body: i.fonts.body.clone(),
                },
                tone: i.tone.clone(),
                audience: i.audience.clone(),
                industry: i.industry.clone(),
            },
            design_recommendation: DesignRecommendationPayload {
                style: i.design_style.clone(),
                description: i.design_description.clone(),
                typography: i.typography_notes.clone(),
            },
        }
    }
}

impl TryFrom<PlanPayload> for Plan {
    type Error = GenerationError;

    /// 页码排序后必须恰好为 1..=N，标题不可为空
    fn try_from(p: PlanPayload) -> Result<Self, Self::Error> {
        if p.carousel_title.trim().is_empty() {
            return Err(GenerationError::Format("carousel_title is empty".to_string()));
        }
        let mut plan = Plan {
            title: p.carousel_title,
            slides: p
                .slides
                .into_iter()
                .map(|s| Slide {
                    number: s.slide_number,
                    kind: SlideKind::from(s.kind),
                    title: s.title,
                    body: s.body,
                    visual_description: s.visual_description,
                    image_prompt: s.image_generation_prompt.filter(|p| !p.trim().is_empty()),
                })
                .collect(),
        };
        plan.sort_slides();
        plan.check_numbering().map_err(GenerationError::Format)?;
        if let Some(s) = plan.slides.iter().find(|s| s.title.trim().is_empty()) {
            return Err(GenerationError::Format(format!("slide {} has an empty title", s.number)));
        }
        Ok(plan)
    }
}

impl From<&Plan> for PlanPayload {
    fn from(plan: &Plan) -> Self {
        PlanPayload {
            carousel_title: plan.title.clone(),
            slides: plan.slides.iter().map(SlidePayload::from).collect(),
        }
    }
}

impl From<&Slide> for SlidePayload {
    fn from(s: &Slide) -> Self {
        SlidePayload {
            slide_number: s.number,
            kind: s.kind.to_string(),
            title: s.title.clone(),
            body: s.body.clone(),
            visual_description: s.visual_description.clone(),
            image_generation_prompt: s.image_prompt.clone(),
        }
    }
}

/// 去掉模型常见的 ```json 围栏与前后多余文字，只保留最外层 JSON 对象
pub fn strip_fences(raw: &str) -> &str {
    let s = raw.trim();
    let s = s.strip_prefix("```json").or_else(|| s.strip_prefix("```")).unwrap_or(s);
    let s = s.strip_suffix("```").unwrap_or(s).trim();
    match (s.find('{'), s.rfind('}')) {
        (Some(start), Some(end)) if start < end => &s[start..=end],
        _ => s,
    }
}

/// 解析模型输出为指定 DTO；失败时带上原文片段
pub fn parse_model_json<T: DeserializeOwned>(raw: &str) -> Result<T, GenerationError> {
    let body = strip_fences(raw);
    serde_json::from_str(body).map_err(|e| {
        let preview: String = body.chars().take(120).collect();
        GenerationError::Format(format!("{} (output: {})", e, preview))
    })
}

/// 返回 DTO 的 JSON Schema 字符串，可拼入提示词
pub fn schema_json<T: JsonSchema>() -> String {
    let schema = schema_for!(T);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDENTITY_JSON: &str = r##"```json
{
  "brand_identity": {
    "colors": {"primary": "#112233", "secondary": "#445566", "accent": "#ff0000", "background": "#ffffff"},
    "fonts": {"heading": "Inter", "body": "Lora"},
    "tone": "warm"
  },
  "design_recommendation": {"style": "minimal"}
}
```"##;

    #[test]
    fn test_parse_identity_with_fences_and_defaults() {
        let payload: IdentityPayload = parse_model_json(IDENTITY_JSON).unwrap();
        let identity = Identity::from(payload);
        assert_eq!(identity.colors.primary, "#112233");
        assert_eq!(identity.fonts.body, "Lora");
        assert_eq!(identity.design_style, "minimal");
        assert_eq!(identity.audience, "");
    }

    #[test]
    fn test_identity_missing_colors_is_format_error() {
        let raw = r#"{"brand_identity": {"fonts": {"heading": "a", "body": "b"}}, "design_recommendation": {"style": "bold"}}"#;
        let err = parse_model_json::<IdentityPayload>(raw).unwrap_err();
        assert!(matches!(err, GenerationError::Format(ref m) if m.contains("colors")));
    }

    #[test]
    fn test_non_json_is_format_error() {
        let err = parse_model_json::<PlanPayload>("Sorry, I cannot help with that.").unwrap_err();
        assert!(matches!(err, GenerationError::Format(_)));
    }

    #[test]
    fn test_strip_fences_with_preamble() {
        assert_eq!(strip_fences("Here you go:\n{\"a\": 1}\nEnjoy"), "{\"a\": 1}");
        assert_eq!(strip_fences("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
    }

    #[test]
    fn test_plan_payload_sorted_and_validated() {
        let raw = r#"{"carousel_title": "Launch", "slides": [
            {"slide_number": 2, "type": "cta", "title": "Buy now"},
            {"slide_number": 1, "type": "hook", "title": "Hello", "image_generation_prompt": "Scene. TEXT \"Hello\""}
        ]}"#;
        let plan = Plan::try_from(parse_model_json::<PlanPayload>(raw).unwrap()).unwrap();
        assert_eq!(plan.slides[0].number, 1);
        assert_eq!(plan.slides[0].kind, SlideKind::Hook);
        assert_eq!(plan.slides[1].kind, SlideKind::Cta);
        assert!(plan.slides[1].image_prompt.is_none());
    }

    #[test]
    fn test_plan_with_gap_is_rejected() {
        let raw = r#"{"carousel_title": "Launch", "slides": [
            {"slide_number": 1, "title": "a"},
            {"slide_number": 3, "title": "c"}
        ]}"#;
        let err = Plan::try_from(parse_model_json::<PlanPayload>(raw).unwrap()).unwrap_err();
        assert!(matches!(err, GenerationError::Format(_)));
    }

    #[test]
    fn test_identity_payload_roundtrip_keeps_design_fields() {
        let payload: IdentityPayload = parse_model_json(IDENTITY_JSON).unwrap();
        let identity = Identity::from(payload);
        let back = IdentityPayload::from(&identity);
        assert_eq!(back.design_recommendation.style, "minimal");
        assert_eq!(back.brand_identity.colors.accent, "#ff0000");
    }

    #[test]
    fn test_schema_mentions_required_fields() {
        let schema = schema_json::<PlanPayload>();
        assert!(schema.contains("carousel_title"));
        assert!(schema.contains("slide_number"));
    }
}

//! 提示词构造
//!
//! 每条 user 消息首行是任务标记（`TASK: <name>`），便于日志排查，也让 MockLlmClient 能按任务返回固定结果。

use super::schema::{
    schema_json, IdentityPayload, PlanPayload, RefinedPromptPayload, SlidePayload,
};
use crate::llm::Message;
use crate::model::{Identity, Plan, Slide, Summary};

/// 正文摘录在提示词中的最大字符数
const CONTENT_SAMPLE_CHARS: usize = 2000;

const SYSTEM_PROMPT: &str = "You are a senior brand strategist and social media art director. \
Always answer with a single raw JSON object matching the requested schema. \
Do not wrap the JSON in markdown or add any commentary.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromptTask {
    Identity,
    Plan,
    RefineIdentity,
    RefinePlan,
    RefineImagePrompt,
}

impl PromptTask {
    const ALL: [PromptTask; 5] = [
        PromptTask::Identity,
        PromptTask::Plan,
        PromptTask::RefineIdentity,
        PromptTask::RefinePlan,
        PromptTask::RefineImagePrompt,
    ];

    pub fn marker(self) -> &'static str {
        match self {
            PromptTask::Identity => "TASK: brand_identity",
            PromptTask::Plan => "TASK: carousel_plan",
            PromptTask::RefineIdentity => "TASK: refine_brand_identity",
            PromptTask::RefinePlan => "TASK: refine_carousel_plan",
            PromptTask::RefineImagePrompt => "TASK: refine_image_prompt",
        }
    }

    /// 从 user 消息首行识别任务
    pub fn detect(content: &str) -> Option<PromptTask> {
        let first = content.lines().next().unwrap_or("").trim();
        Self::ALL.into_iter().find(|t| t.marker() == first)
    }
}

fn pretty<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

fn messages(task: PromptTask, body: String) -> Vec<Message> {
    vec![
        Message::system(SYSTEM_PROMPT),
        Message::user(format!("{}\n{}", task.marker(), body)),
    ]
}

pub fn identity(summary: &Summary, context: &str) -> Vec<Message> {
    let sample: String = summary.text_excerpt.chars().take(CONTENT_SAMPLE_CHARS).collect();
    let context = if context.trim().is_empty() {
        "None provided."
    } else {
        context.trim()
    };
    let body = format!(
        r#"Derive a brand identity for an Instagram carousel campaign from this website and the owner's description.

Website: {url}
Title: {title}
Description: {meta}

Owner context:
{context}

Content sample:
{sample}

Detected colors (CSS): {colors}
Detected fonts (CSS): {fonts}

Infer the main brand color as `primary`. `design_recommendation.style` is one of minimal | bold | luxury | playful;
`typography` gives concrete guidance on font weights, casing and layout on slides.

Respond with JSON matching this schema:
{schema}"#,
        url = summary.url,
        title = summary.title,
        meta = summary.meta_description,
        colors = summary.css_colors.join(", "),
        fonts = summary.font_families.join(", "),
        schema = schema_json::<IdentityPayload>(),
    );
    messages(PromptTask::Identity, body)
}

pub fn plan(identity: &Identity, topic: &str) -> Vec<Message> {
    let body = format!(
        r#"Create a 7-slide Instagram carousel content plan (5 to 7 slides, the last one a CTA) for this brand.

Brand identity:
{identity}

Campaign topic: {topic}

Rules:
1. Number slides from 1 without gaps.
2. Every slide image carries a text overlay; `image_generation_prompt` states exactly which text to render and that text is the slide `title`, copied verbatim.
3. Follow this prompt shape: "[Visual scene]. [Lighting/style]. 8k resolution, highly detailed, photorealistic, masterpiece. TEXT OVERLAY: The image features the text \"<title>\" in a <font style> font, <position>, clearly legible."
4. Leave negative space in the visual for the text and keep styling consistent with the brand identity.

Respond with JSON matching this schema:
{schema}"#,
        identity = pretty(&IdentityPayload::from(identity)),
        topic = topic,
        schema = schema_json::<PlanPayload>(),
    );
    messages(PromptTask::Plan, body)
}

pub fn refine_identity(identity: &Identity, feedback: &str) -> Vec<Message> {
    let body = format!(
        r#"Update this brand identity according to the user's feedback. Change what the feedback asks for and keep everything else consistent.

Current identity:
{identity}

Feedback: "{feedback}"

Return the complete updated identity (brand_identity and design_recommendation) as JSON matching this schema:
{schema}"#,
        identity = pretty(&IdentityPayload::from(identity)),
        feedback = feedback,
        schema = schema_json::<IdentityPayload>(),
    );
    messages(PromptTask::RefineIdentity, body)
}

pub fn refine_plan(plan: &Plan, feedback: &str) -> Vec<Message> {
    let body = format!(
        r#"Update this carousel content plan according to the user's feedback.

Current plan:
{plan}

Feedback: "{feedback}"

Keep slides numbered from 1 without gaps. Update `image_generation_prompt` whenever a slide's title or visual direction changes; each prompt must still contain the slide title verbatim.
Return the complete plan as JSON matching this schema:
{schema}"#,
        plan = pretty(&PlanPayload::from(plan)),
        feedback = feedback,
        schema = schema_json::<PlanPayload>(),
    );
    messages(PromptTask::RefinePlan, body)
}

pub fn refine_image_prompt(slide: &Slide, feedback: &str, identity: &Identity) -> Vec<Message> {
    let body = format!(
        r#"Rewrite the image generation prompt for one carousel slide according to the user's feedback.

Title: {title}
Slide:
{slide}

Brand style: {style}
Brand colors: {primary}, {secondary}, {accent}, {background}

Feedback: "{feedback}"

The new prompt must still state the text overlay "{title}" verbatim and keep the quality keywords (8k, photorealistic).
Respond with JSON matching this schema:
{schema}"#,
        title = slide.title,
        slide = pretty(&SlidePayload::from(slide)),
        style = identity.design_style,
        primary = identity.colors.primary,
        secondary = identity.colors.secondary,
        accent = identity.colors.accent,
        background = identity.colors.background,
        feedback = feedback,
        schema = schema_json::<RefinedPromptPayload>(),
    );
    messages(PromptTask::RefineImagePrompt, body)
}

/// 取 `Key: value` 形式的行值（去掉首尾引号），供 Mock 与日志使用
pub fn line_value<'a>(content: &'a str, key: &str) -> Option<&'a str> {
    content
        .lines()
        .find_map(|l| l.trim().strip_prefix(key))
        .map(|v| v.trim().trim_matches('"'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SlideKind;

    #[test]
    fn test_detect_task_marker() {
        let msgs = plan(&Identity::default(), "launch");
        assert_eq!(PromptTask::detect(&msgs[1].content), Some(PromptTask::Plan));
        assert_eq!(PromptTask::detect("hello"), None);
    }

    #[test]
    fn test_identity_prompt_uses_context_fallback() {
        let summary = Summary {
            url: "https://x.test/".into(),
            title: "X".into(),
            ..Default::default()
        };
        let msgs = identity(&summary, "  ");
        assert!(msgs[1].content.contains("None provided."));
        assert!(msgs[1].content.contains("https://x.test/"));
    }

    #[test]
    fn test_refine_image_prompt_carries_title_and_feedback() {
        let slide = Slide {
            number: 3,
            kind: SlideKind::Body,
            title: "Roasted Daily".into(),
            body: String::new(),
            visual_description: "beans".into(),
            image_prompt: None,
        };
        let msgs = refine_image_prompt(&slide, "make it darker", &Identity::default());
        assert_eq!(line_value(&msgs[1].content, "Title:"), Some("Roasted Daily"));
        assert_eq!(line_value(&msgs[1].content, "Feedback:"), Some("make it darker"));
    }
}

//! 内容规划：轮播标题 + 有序的 Slide 列表

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// 页面类型标签（hook / body / cta / 其他）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SlideKind {
    Hook,
    Body,
    Cta,
    Other(String),
}

impl From<String> for SlideKind {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "hook" => SlideKind::Hook,
            "body" | "" => SlideKind::Body,
            "cta" => SlideKind::Cta,
            _ => SlideKind::Other(s),
        }
    }
}

impl From<SlideKind> for String {
    fn from(kind: SlideKind) -> Self {
        kind.to_string()
    }
}

impl fmt::Display for SlideKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlideKind::Hook => f.write_str("hook"),
            SlideKind::Body => f.write_str("body"),
            SlideKind::Cta => f.write_str("cta"),
            SlideKind::Other(s) => f.write_str(s),
        }
    }
}

/// 单页规划。image_prompt 若存在，必须原样包含 title 文本
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slide {
    /// 从 1 开始、唯一且连续
    pub number: u32,
    pub kind: SlideKind,
    pub title: String,
    pub body: String,
    pub visual_description: String,
    pub image_prompt: Option<String>,
}

impl Slide {
    /// 非空的 image_prompt
    pub fn prompt(&self) -> Option<&str> {
        self.image_prompt
            .as_deref()
            .filter(|p| !p.trim().is_empty())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub title: String,
    pub slides: Vec<Slide>,
}

impl Plan {
    pub fn slide(&self, number: u32) -> Option<&Slide> {
        self.slides.iter().find(|s| s.number == number)
    }

    pub fn slide_mut(&mut self, number: u32) -> Option<&mut Slide> {
        self.slides.iter_mut().find(|s| s.number == number)
    }

    pub fn slide_numbers(&self) -> BTreeSet<u32> {
        self.slides.iter().map(|s| s.number).collect()
    }

    /// 检查页码恰好为 1..=N（按序、无重复、无空洞）
    pub fn check_numbering(&self) -> Result<(), String> {
        if self.slides.is_empty() {
            return Err("plan has no slides".to_string());
        }
        for (idx, slide) in self.slides.iter().enumerate() {
            let expected = idx as u32 + 1;
            if slide.number != expected {
                return Err(format!(
                    "slide numbering must be 1..{}, found {} at position {}",
                    self.slides.len(),
                    slide.number,
                    expected
                ));
            }
        }
        Ok(())
    }

    /// 按页码排序（模型偶尔乱序返回）
    pub fn sort_slides(&mut self) {
        self.slides.sort_by_key(|s| s.number);
    }

    /// 用旧规划补回缺失的 image_prompt：同页码、且旧 prompt 仍包含新标题时沿用
    pub fn inherit_prompts_from(&mut self, previous: &Plan) {
        for slide in self.slides.iter_mut() {
            if slide.prompt().is_some() {
                continue;
            }
            if let Some(old) = previous.slide(slide.number).and_then(|s| s.prompt()) {
                if old.contains(slide.title.as_str()) {
                    tracing::debug!(slide = slide.number, "carrying image prompt over from previous plan");
                    slide.image_prompt = Some(old.to_string());
                }
            }
        }
    }
}

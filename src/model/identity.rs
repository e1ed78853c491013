//! 品牌识别

use serde::{Deserialize, Serialize};

/// 品牌色（均为 hex 字符串，如 `#112233`）
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandColors {
    pub primary: String,
    pub secondary: String,
    pub accent: String,
    pub background: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandFonts {
    pub heading: String,
    pub body: String,
}

/// 品牌识别：由 Summary 推导，refine 时整体替换，从不局部修补
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub colors: BrandColors,
    pub fonts: BrandFonts,
    /// 品牌语气（形容词）
    pub tone: String,
    pub audience: String,
    pub industry: String,
    /// 设计风格：minimal | bold | luxury | playful 等自由字符串
    pub design_style: String,
    pub design_description: String,
    pub typography_notes: String,
}

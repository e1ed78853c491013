//! 网页摘要（Extraction Adapter 的输出）

use serde::{Deserialize, Serialize};

/// 单个网页的规范化摘要；生成后不可变，作为品牌识别的输入
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub url: String,
    pub title: String,
    /// 正文摘录（上限由 extract.max_text_chars 决定，默认 10000 字符）
    pub text_excerpt: String,
    /// 图片地址（已解析为绝对 URL，最多 10 个）
    pub image_urls: Vec<String>,
    /// 检测到的 CSS 颜色（去重，最多 20 个）
    pub css_colors: Vec<String>,
    /// 检测到的字体族（去重，最多 10 个）
    pub font_families: Vec<String>,
    pub meta_description: String,
}

impl Summary {
    /// 用于快照展示的简要统计：(标题, 图片数, 颜色数)
    pub fn stats(&self) -> (String, usize, usize) {
        (
            self.title.clone(),
            self.image_urls.len(),
            self.css_colors.len(),
        )
    }
}

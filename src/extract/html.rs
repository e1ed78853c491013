//! HTML → Summary 的轻量提取（正则 + html2text，不做 DOM 解析）

use std::collections::HashSet;
use std::sync::OnceLock;

use html2text::from_read;
use regex::Regex;

use super::ExtractError;
use crate::model::Summary;

/// 各字段的数量上限
#[derive(Clone, Debug)]
pub struct ExtractLimits {
    pub max_text_chars: usize,
    pub max_images: usize,
    pub max_colors: usize,
    pub max_fonts: usize,
}

impl Default for ExtractLimits {
    fn default() -> Self {
        Self {
            max_text_chars: 10_000,
            max_images: 10,
            max_colors: 20,
            max_fonts: 10,
        }
    }
}

struct Patterns {
    title: Regex,
    meta_desc: Regex,
    meta_desc_rev: Regex,
    script: Regex,
    style: Regex,
    tag: Regex,
    img: Regex,
    color: Regex,
    font: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        title: Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("title regex"),
        meta_desc: Regex::new(r#"(?i)<meta\s+name=["']description["']\s+content=["']([^"']+)["']"#)
            .expect("meta regex"),
        meta_desc_rev: Regex::new(r#"(?i)<meta\s+content=["']([^"']+)["']\s+name=["']description["']"#)
            .expect("meta regex"),
        script: Regex::new(r"(?is)<script\b.*?</script>").expect("script regex"),
        style: Regex::new(r"(?is)<style\b.*?</style>").expect("style regex"),
        tag: Regex::new(r"<[^>]+>").expect("tag regex"),
        img: Regex::new(r#"(?i)<img[^>]+src=["']([^"']+)["']"#).expect("img regex"),
        color: Regex::new(r"(?i)#(?:[0-9a-f]{6}|[0-9a-f]{3})\b|rgba?\([^)]+\)").expect("color regex"),
        font: Regex::new(r#"(?i)font-family:\s*["']?([^;}"']+)"#).expect("font regex"),
    })
}

/// 判断内容是否像 HTML
fn looks_like_html(s: &str) -> bool {
    let s = s.trim_start();
    s.starts_with("<!")
        || s.to_lowercase().starts_with("<html")
        || (s.contains('<') && (s.contains("</") || s.contains("<meta") || s.contains("<title")))
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn page_text(html: &str, max_chars: usize) -> String {
    let p = patterns();
    let cleaned = p.script.replace_all(html, " ");
    let cleaned = p.style.replace_all(&cleaned, " ");
    let text = match from_read(cleaned.as_bytes(), 120) {
        Ok(text) if !text.trim().is_empty() => text,
        _ => p.tag.replace_all(&cleaned, " ").into_owned(),
    };
    truncate_chars(&collapse_whitespace(&text), max_chars)
}

fn image_urls(html: &str, base: &reqwest::Url, max: usize) -> Vec<String> {
    let mut out = Vec::new();
    for cap in patterns().img.captures_iter(html) {
        if out.len() >= max {
            break;
        }
        let src = cap[1].trim();
        if src.starts_with("data:") {
            continue;
        }
        // `//cdn...` 与相对路径统一按页面地址解析
        if let Ok(resolved) = base.join(src) {
            let resolved = resolved.to_string();
            if !out.contains(&resolved) {
                out.push(resolved);
            }
        }
    }
    out
}

fn css_colors(html: &str, max: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for m in patterns().color.find_iter(html) {
        if out.len() >= max {
            break;
        }
        let color = m.as_str().to_string();
        if seen.insert(color.to_lowercase()) {
            out.push(color);
        }
    }
    out
}

fn font_families(html: &str, max: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for cap in patterns().font.captures_iter(html) {
        if out.len() >= max {
            break;
        }
        let first = cap[1]
            .split(',')
            .next()
            .unwrap_or("")
            .replace(['"', '\''], "");
        let family = first.trim().to_string();
        if !family.is_empty() && !out.contains(&family) {
            out.push(family);
        }
    }
    out
}

/// 从 HTML 中提取摘要；正文为空且不像 HTML 时视为解析失败
pub fn parse_html(url: &reqwest::Url, html: &str, limits: &ExtractLimits) -> Result<Summary, ExtractError> {
    let html = html.strip_prefix('\u{FEFF}').unwrap_or(html);
    if html.trim().is_empty() {
        return Err(ExtractError::Parse("empty response body".to_string()));
    }
    if !looks_like_html(html) {
        return Err(ExtractError::Parse("response is not HTML".to_string()));
    }
    let p = patterns();

    let title = p
        .title
        .captures(html)
        .map(|c| collapse_whitespace(&c[1]))
        .unwrap_or_default();
    let meta_description = p
        .meta_desc
        .captures(html)
        .or_else(|| p.meta_desc_rev.captures(html))
        .map(|c| c[1].trim().to_string())
        .unwrap_or_default();

    Ok(Summary {
        url: url.to_string(),
        title,
        text_excerpt: page_text(html, limits.max_text_chars),
        image_urls: image_urls(html, url, limits.max_images),
        css_colors: css_colors(html, limits.max_colors),
        font_families: font_families(html, limits.max_fonts),
        meta_description,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html><head>
<title> Acme   Coffee </title>
<meta name="description" content="Small-batch roasters">
<style>body { color: #112233; font-family: "Inter", sans-serif; } h1 { color: #abc; font-family: Playfair Display; }</style>
</head>
<body style="background: rgb(255, 255, 255)">
<script>var x = "<b>hidden</b>";</script>
<h1>Fresh beans</h1><p>Roasted every   morning.</p>
<img src="/img/hero.jpg"><img src="//cdn.test/logo.png"><img src="data:image/png;base64,AA">
<img src="https://other.test/a.png">
</body></html>"#;

    fn base() -> reqwest::Url {
        reqwest::Url::parse("https://acme.test/shop/").unwrap()
    }

    #[test]
    fn test_parse_html_fields() {
        let summary = parse_html(&base(), PAGE, &ExtractLimits::default()).unwrap();
        assert_eq!(summary.title, "Acme Coffee");
        assert_eq!(summary.meta_description, "Small-batch roasters");
        assert!(summary.text_excerpt.contains("Fresh beans"));
        assert!(!summary.text_excerpt.contains("hidden"));
        assert_eq!(
            summary.image_urls,
            vec![
                "https://acme.test/img/hero.jpg".to_string(),
                "https://cdn.test/logo.png".to_string(),
                "https://other.test/a.png".to_string(),
            ]
        );
        assert_eq!(summary.css_colors, vec!["#112233", "#abc", "rgb(255, 255, 255)"]);
        assert_eq!(summary.font_families, vec!["Inter", "Playfair Display"]);
    }

    #[test]
    fn test_limits_are_applied() {
        let limits = ExtractLimits {
            max_text_chars: 5,
            max_images: 1,
            max_colors: 1,
            max_fonts: 1,
        };
        let summary = parse_html(&base(), PAGE, &limits).unwrap();
        assert!(summary.text_excerpt.chars().count() <= 5);
        assert_eq!(summary.image_urls.len(), 1);
        assert_eq!(summary.css_colors.len(), 1);
        assert_eq!(summary.font_families.len(), 1);
    }

    #[test]
    fn test_non_html_is_parse_error() {
        let err = parse_html(&base(), "{\"json\": true}", &ExtractLimits::default()).unwrap_err();
        assert!(matches!(err, ExtractError::Parse(_)));
        let err = parse_html(&base(), "   ", &ExtractLimits::default()).unwrap_err();
        assert!(matches!(err, ExtractError::Parse(_)));
    }
}

//! 命令行向导：解析输入行、渲染会话快照、导出配图

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::core::{Command, SessionSnapshot};

pub const HELP: &str = "\
commands:
  analyze <url> [business context]   scrape a site and derive the brand identity
  refine-identity <feedback>         rewrite the identity from feedback
  confirm-identity                   accept the identity and move to planning
  plan [topic]                       generate a content plan
  refine-plan <feedback>             rewrite the plan from feedback
  confirm-plan                       accept the plan and move to creative
  generate                           generate images for every slide
  refine-slide <n> <feedback>        rewrite one slide's image prompt and redraw it
  regen <n>                          redraw one slide with its current prompt
  export <dir> [n]                   write images as carousel-slide-<n>.png
  show                               print the session
  reset                              discard the session
  help | quit";

/// 一行输入解析后的动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliAction {
    Studio(Command),
    Show,
    Export { dir: PathBuf, slide: Option<u32> },
    Help,
}

fn split_first(s: &str) -> (&str, &str) {
    let s = s.trim();
    match s.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (s, ""),
    }
}

fn slide_number(raw: &str) -> Result<u32, String> {
    raw.parse::<u32>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| format!("invalid slide number: {}", raw))
}

fn require<'a>(value: &'a str, usage: &str) -> Result<&'a str, String> {
    if value.is_empty() {
        Err(format!("usage: {}", usage))
    } else {
        Ok(value)
    }
}

/// 解析一行输入；空行返回 Ok(None)
pub fn parse_line(line: &str) -> Result<Option<CliAction>, String> {
    let (cmd, rest) = split_first(line);
    let action = match cmd.to_lowercase().as_str() {
        "" => return Ok(None),
        "analyze" => {
            let (url, context) = split_first(require(rest, "analyze <url> [business context]")?);
            CliAction::Studio(Command::Analyze {
                url: url.to_string(),
                context: context.to_string(),
            })
        }
        "refine-identity" => CliAction::Studio(Command::RefineIdentity(
            require(rest, "refine-identity <feedback>")?.to_string(),
        )),
        "confirm-identity" => CliAction::Studio(Command::ConfirmIdentity),
        "plan" => CliAction::Studio(Command::GeneratePlan(rest.to_string())),
        "refine-plan" => CliAction::Studio(Command::RefinePlan(
            require(rest, "refine-plan <feedback>")?.to_string(),
        )),
        "confirm-plan" => CliAction::Studio(Command::ConfirmPlan),
        "generate" => CliAction::Studio(Command::GenerateAll),
        "refine-slide" => {
            let (n, feedback) = split_first(require(rest, "refine-slide <n> <feedback>")?);
            CliAction::Studio(Command::RefineSlide {
                slide_number: slide_number(n)?,
                feedback: require(feedback, "refine-slide <n> <feedback>")?.to_string(),
            })
        }
        "regen" => CliAction::Studio(Command::regenerate(slide_number(require(rest, "regen <n>")?)?)),
        "export" => {
            let (dir, n) = split_first(require(rest, "export <dir> [n]")?);
            let slide = if n.is_empty() { None } else { Some(slide_number(n)?) };
            CliAction::Export {
                dir: PathBuf::from(dir),
                slide,
            }
        }
        "show" => CliAction::Show,
        "reset" => CliAction::Studio(Command::Reset),
        "help" | "?" => CliAction::Help,
        "quit" | "exit" => CliAction::Studio(Command::Quit),
        other => return Err(format!("unknown command: {} (try `help`)", other)),
    };
    Ok(Some(action))
}

/// 以纯文本渲染会话快照
pub fn render(snapshot: &SessionSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {} [{}]", snapshot.id, snapshot.stage);
    if snapshot.is_busy() {
        let ops: Vec<String> = snapshot.pending.iter().map(|op| op.to_string()).collect();
        let _ = writeln!(out, "busy: {}", ops.join(", "));
    }
    if let Some(summary) = &snapshot.summary {
        let (title, images, colors) = summary.stats();
        let _ = writeln!(out, "site: {} ({} images, {} colors)", title, images, colors);
    }
    if let Some(identity) = &snapshot.identity {
        let c = &identity.colors;
        let _ = writeln!(
            out,
            "identity: {} | colors {} {} {} {} | fonts {} / {}",
            identity.design_style, c.primary, c.secondary, c.accent, c.background, identity.fonts.heading, identity.fonts.body
        );
        let _ = writeln!(out, "  tone: {} | audience: {} | industry: {}", identity.tone, identity.audience, identity.industry);
    }
    if let Some(plan) = &snapshot.plan {
        let _ = writeln!(out, "plan: {}", plan.title);
        for slide in &plan.slides {
            let status = if snapshot.images.contains_key(&slide.number) {
                "image"
            } else if snapshot.slide_errors.contains_key(&slide.number) {
                "failed"
            } else {
                "-"
            };
            let _ = writeln!(out, "  {:>2}. [{}] {} ({})", slide.number, slide.kind, slide.title, status);
        }
    }
    if let Some(err) = &snapshot.last_error {
        let _ = writeln!(out, "last error ({}): {}", err.operation, err.message);
    }
    out
}

/// 将快照中的配图解码写入 dir/carousel-slide-<n>.png；slide 为 None 时导出全部
pub async fn export_images(snapshot: &SessionSnapshot, dir: &Path, slide: Option<u32>) -> anyhow::Result<Vec<PathBuf>> {
    let assets: Vec<_> = match slide {
        Some(n) => vec![snapshot
            .images
            .get(&n)
            .with_context(|| format!("slide {} has no image", n))?],
        None => snapshot.images.values().collect(),
    };
    if assets.is_empty() {
        anyhow::bail!("no images to export");
    }

    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let mut written = Vec::with_capacity(assets.len());
    for asset in assets {
        let bytes = STANDARD
            .decode(asset.encoded_bytes.trim())
            .with_context(|| format!("slide {} image is not valid base64", asset.slide_number))?;
        let path = dir.join(format!("carousel-slide-{}.png", asset.slide_number));
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(path);
    }
    tracing::info!(count = written.len(), dir = %dir.display(), "images exported");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::PLACEHOLDER_PNG_BASE64;
    use crate::model::ImageAsset;

    fn asset(n: u32) -> ImageAsset {
        ImageAsset {
            slide_number: n,
            encoded_bytes: PLACEHOLDER_PNG_BASE64.to_string(),
            mime_type: "image/png".into(),
            prompt: "p".into(),
            epoch: 1,
        }
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            parse_line("analyze acme.com we sell shoes").unwrap(),
            Some(CliAction::Studio(Command::Analyze {
                url: "acme.com".into(),
                context: "we sell shoes".into()
            }))
        );
        assert_eq!(
            parse_line("plan").unwrap(),
            Some(CliAction::Studio(Command::GeneratePlan(String::new())))
        );
        assert_eq!(
            parse_line("refine-slide 3 warmer light").unwrap(),
            Some(CliAction::Studio(Command::RefineSlide {
                slide_number: 3,
                feedback: "warmer light".into()
            }))
        );
        assert_eq!(
            parse_line("regen 2").unwrap(),
            Some(CliAction::Studio(Command::regenerate(2)))
        );
        assert_eq!(
            parse_line("export out 4").unwrap(),
            Some(CliAction::Export {
                dir: PathBuf::from("out"),
                slide: Some(4)
            })
        );
        assert_eq!(parse_line("   ").unwrap(), None);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse_line("refine-identity").is_err());
        assert!(parse_line("refine-slide x more").is_err());
        assert!(parse_line("refine-slide 2").is_err());
        assert!(parse_line("regen 0").is_err());
        assert!(parse_line("dance").is_err());
    }

    #[test]
    fn test_render_lists_slides() {
        let mut snap = SessionSnapshot::default();
        snap.plan = Some(crate::model::Plan {
            title: "Launch".into(),
            slides: vec![crate::model::Slide {
                number: 1,
                kind: crate::model::SlideKind::Hook,
                title: "Hello".into(),
                body: String::new(),
                visual_description: String::new(),
                image_prompt: None,
            }],
        });
        snap.images.insert(1, asset(1));
        let text = render(&snap);
        assert!(text.contains("[input]"));
        assert!(text.contains("plan: Launch"));
        assert!(text.contains("Hello (image)"));
    }

    #[tokio::test]
    async fn test_export_writes_png_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut snap = SessionSnapshot::default();
        snap.images.insert(1, asset(1));
        snap.images.insert(2, asset(2));

        let written = export_images(&snap, dir.path(), None).await.unwrap();
        assert_eq!(written.len(), 2);
        let bytes = std::fs::read(dir.path().join("carousel-slide-2.png")).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");

        let one = export_images(&snap, dir.path(), Some(1)).await.unwrap();
        assert_eq!(one, vec![dir.path().join("carousel-slide-1.png")]);
        assert!(export_images(&snap, dir.path(), Some(9)).await.is_err());
    }
}

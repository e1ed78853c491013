//! 命令队列运行时：外部通过 mpsc 发送 Command，通过 watch 观察 SessionSnapshot
//!
//! 命令按到达顺序逐个执行。配图命令（GenerateAll / RefineSlide）单独 spawn，
//! 命令循环等到它释放 Session 锁（进入出图阶段或提前返回）后才读取下一条，
//! 所以后续命令不会与它抢锁，又能在出图期间 refine_plan、reset 或再次 GenerateAll 来取代当前批次。

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};

use crate::config::{load_config, AppConfig};
use crate::core::builder::build_orchestrator;
use crate::core::error::StudioError;
use crate::core::orchestrator::{StageOrchestrator, REGENERATE_SENTINEL};
use crate::core::state::SessionSnapshot;

/// 发往编排器的用户命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Analyze { url: String, context: String },
    RefineIdentity(String),
    ConfirmIdentity,
    GeneratePlan(String),
    RefinePlan(String),
    ConfirmPlan,
    RefineSlide { slide_number: u32, feedback: String },
    GenerateAll,
    Reset,
    Quit,
}

impl Command {
    /// 用原 prompt 重绘某一页
    pub fn regenerate(slide_number: u32) -> Self {
        Command::RefineSlide {
            slide_number,
            feedback: REGENERATE_SENTINEL.to_string(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Command::Analyze { .. } => "analyze",
            Command::RefineIdentity(_) => "refine_identity",
            Command::ConfirmIdentity => "confirm_identity",
            Command::GeneratePlan(_) => "generate_plan",
            Command::RefinePlan(_) => "refine_plan",
            Command::ConfirmPlan => "confirm_plan",
            Command::RefineSlide { .. } => "refine_slide_image_prompt",
            Command::GenerateAll => "generate_all_images",
            Command::Reset => "reset",
            Command::Quit => "quit",
        }
    }

    fn is_image_work(&self) -> bool {
        matches!(self, Command::GenerateAll | Command::RefineSlide { .. })
    }
}

/// 一条命令的执行结果
#[derive(Debug, Clone)]
pub struct Notice {
    pub command: &'static str,
    pub result: Result<String, StudioError>,
}

/// unlocked 只对配图命令有意义，在其释放 Session 锁时触发
async fn execute(
    orchestrator: &StageOrchestrator,
    cmd: Command,
    unlocked: Option<oneshot::Sender<()>>,
) -> Result<String, StudioError> {
    match cmd {
        Command::Analyze { url, context } => orchestrator
            .analyze(&url, &context)
            .await
            .map(|i| format!("brand identity ready ({} / {})", i.design_style, i.colors.primary)),
        Command::RefineIdentity(feedback) => orchestrator
            .refine_identity(&feedback)
            .await
            .map(|i| format!("brand identity refined ({} / {})", i.design_style, i.colors.primary)),
        Command::ConfirmIdentity => orchestrator
            .confirm_identity()
            .await
            .map(|stage| format!("stage: {}", stage)),
        Command::GeneratePlan(topic) => orchestrator
            .generate_plan(&topic)
            .await
            .map(|p| format!("plan \"{}\" with {} slides", p.title, p.slides.len())),
        Command::RefinePlan(feedback) => orchestrator
            .refine_plan(&feedback)
            .await
            .map(|p| format!("plan \"{}\" now has {} slides", p.title, p.slides.len())),
        Command::ConfirmPlan => orchestrator
            .confirm_plan()
            .await
            .map(|stage| format!("stage: {}", stage)),
        Command::RefineSlide {
            slide_number,
            feedback,
        } => orchestrator
            .run_refine_slide(slide_number, &feedback, unlocked)
            .await
            .map(|r| format!("slide {} regenerated", r.slide_number)),
        Command::GenerateAll => orchestrator.run_generate_all(unlocked).await.map(|r| {
            if r.failed.is_empty() {
                format!("{} slide images generated", r.succeeded.len())
            } else {
                format!(
                    "{} slide images generated, failed: {:?}",
                    r.succeeded.len(),
                    r.failed.keys().collect::<Vec<_>>()
                )
            }
        }),
        Command::Reset => orchestrator.reset().await.map(|_| "session reset".to_string()),
        Command::Quit => Ok("bye".to_string()),
    }
}

/// 在后台任务中驱动已构建好的编排器；返回命令发送端、快照接收端、结果通知接收端
pub fn spawn_studio(
    orchestrator: Arc<StageOrchestrator>,
) -> (
    mpsc::UnboundedSender<Command>,
    watch::Receiver<SessionSnapshot>,
    broadcast::Receiver<Notice>,
) {
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<Command>();
    let (notice_tx, notice_rx) = broadcast::channel::<Notice>(64);
    let snapshot_rx = orchestrator.subscribe();

    tokio::spawn(async move {
        while let Some(cmd) = cmd_rx.recv().await {
            if cmd == Command::Quit {
                break;
            }
            let command = cmd.label();
            tracing::debug!(command, "command received");
            if cmd.is_image_work() {
                let orchestrator = orchestrator.clone();
                let notice_tx = notice_tx.clone();
                let (unlocked_tx, unlocked_rx) = oneshot::channel();
                tokio::spawn(async move {
                    let result = execute(&orchestrator, cmd, Some(unlocked_tx)).await;
                    let _ = notice_tx.send(Notice { command, result });
                });
                // 发送端被丢弃（提前返回）时 recv 返回 Err，同样放行
                let _ = unlocked_rx.await;
            } else {
                let result = execute(&orchestrator, cmd, None).await;
                let _ = notice_tx.send(Notice { command, result });
            }
        }
        tracing::info!("studio command loop stopped");
    });

    (cmd_tx, snapshot_rx, notice_rx)
}

/// 加载配置、组装适配器并启动运行时
pub async fn create_studio(
    config_path: Option<PathBuf>,
) -> anyhow::Result<(
    mpsc::UnboundedSender<Command>,
    watch::Receiver<SessionSnapshot>,
    broadcast::Receiver<Notice>,
)> {
    let cfg = load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });
    let orchestrator = Arc::new(build_orchestrator(&cfg));
    Ok(spawn_studio(orchestrator))
}

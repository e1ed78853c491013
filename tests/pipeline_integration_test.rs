//! 向导全流程集成测试：真实的 LlmGenerator + 离线客户端，以及命令队列运行时

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use carousel::config::AppConfig;
use carousel::core::{
    build_orchestrator, spawn_studio, Command, OrchestratorOptions, StageOrchestrator, Stage,
    StudioError, REGENERATE_SENTINEL,
};
use carousel::extract::StaticExtractor;
use carousel::generation::LlmGenerator;
use carousel::llm::mock::PLACEHOLDER_PNG_BASE64;
use carousel::llm::{ImageClient, LlmClient, LlmError, Message, MockLlmClient};

/// 对含有指定标题的 prompt 返回错误，其余返回占位 PNG
struct FlakyImages {
    failing_title: &'static str,
    calls: AtomicUsize,
}

#[async_trait]
impl ImageClient for FlakyImages {
    async fn generate_image(&self, prompt: &str, _aspect_ratio: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if prompt.contains(self.failing_title) {
            return Err(LlmError::ApiError("image quota exceeded".to_string()));
        }
        Ok(PLACEHOLDER_PNG_BASE64.to_string())
    }
}

/// 统计文本模型调用次数
struct CountingLlm {
    inner: MockLlmClient,
    calls: AtomicUsize,
}

#[async_trait]
impl LlmClient for CountingLlm {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.complete(messages).await
    }
}

fn studio(failing_title: &'static str) -> (StageOrchestrator, Arc<CountingLlm>, Arc<FlakyImages>) {
    let llm = Arc::new(CountingLlm {
        inner: MockLlmClient,
        calls: AtomicUsize::new(0),
    });
    let images = Arc::new(FlakyImages {
        failing_title,
        calls: AtomicUsize::new(0),
    });
    let orchestrator = StageOrchestrator::new(
        Arc::new(StaticExtractor),
        Arc::new(LlmGenerator::new(llm.clone(), images.clone())),
        OrchestratorOptions::default(),
    );
    (orchestrator, llm, images)
}

#[tokio::test]
async fn test_wizard_scenario_with_failing_slide() {
    let (o, llm, images) = studio("How It Works");
    assert_eq!(o.snapshot().stage, Stage::Input);

    let identity = o.analyze("https://x.test", "").await.unwrap();
    assert_eq!(identity.colors.primary, "#112233");
    assert_eq!(o.snapshot().stage, Stage::IdentityReview);

    assert_eq!(o.confirm_identity().await.unwrap(), Stage::Planning);
    let plan = o.generate_plan("launch").await.unwrap();
    assert_eq!(plan.slides.len(), 5);
    assert_eq!(o.confirm_plan().await.unwrap(), Stage::Creative);

    let report = o.generate_all_images().await.unwrap();
    assert_eq!(images.calls.load(Ordering::SeqCst), 5);
    assert_eq!(report.succeeded, vec![1, 2, 4, 5]);

    let snap = o.snapshot();
    assert_eq!(snap.images.len(), 4);
    assert!(!snap.images.contains_key(&3));
    let err = snap.last_error.expect("slide failure recorded");
    assert_eq!(err.slide_numbers, vec![3]);
    assert!(err.message.contains("slide 3"));
    assert!(err.message.contains("image quota exceeded"));
    assert!(snap.images[&1].data_url().starts_with("data:image/png;base64,"));

    // 再次确认身份是空操作，不调用模型
    let before = llm.calls.load(Ordering::SeqCst);
    assert_eq!(o.confirm_identity().await.unwrap(), Stage::Creative);
    assert_eq!(llm.calls.load(Ordering::SeqCst), before);
}

#[tokio::test]
async fn test_regenerate_keeps_prompt_byte_identical() {
    let (o, llm, images) = studio("no such title");
    o.analyze("x.test", "Handmade ceramics studio").await.unwrap();
    o.confirm_identity().await.unwrap();
    o.generate_plan("").await.unwrap();
    o.confirm_plan().await.unwrap();

    let before = o.snapshot().plan.unwrap().slide(4).unwrap().image_prompt.clone();
    let llm_calls = llm.calls.load(Ordering::SeqCst);

    let report = o.refine_slide_image_prompt(4, REGENERATE_SENTINEL).await.unwrap();
    assert!(!report.prompt_refined);
    assert_eq!(llm.calls.load(Ordering::SeqCst), llm_calls);
    assert_eq!(images.calls.load(Ordering::SeqCst), 1);
    assert_eq!(o.snapshot().plan.unwrap().slide(4).unwrap().image_prompt, before);

    let report = o.refine_slide_image_prompt(4, "golden hour").await.unwrap();
    assert!(report.prompt_refined);
    assert!(report.prompt.contains("golden hour"));
    assert!(report.prompt.contains("Loved by Customers"));
    assert_eq!(llm.calls.load(Ordering::SeqCst), llm_calls + 1);
}

#[tokio::test]
async fn test_refine_plan_replaces_plan_wholesale() {
    let (o, _, _) = studio("no such title");
    o.analyze("x.test", "").await.unwrap();
    o.confirm_identity().await.unwrap();
    o.generate_plan("launch").await.unwrap();
    o.generate_all_images().await.unwrap();

    let refined = o.refine_plan("more playful").await.unwrap();
    assert_eq!(refined.title, "Revised carousel");
    let snap = o.snapshot();
    assert_eq!(snap.plan.unwrap(), refined);
    assert!(snap.images.keys().all(|n| refined.slide(*n).is_some()));
    assert_eq!(snap.stage, Stage::Planning);
}

#[tokio::test]
async fn test_command_runtime_drives_offline_studio() {
    let mut cfg = AppConfig::default();
    cfg.llm.provider = "mock".to_string();
    let orchestrator = Arc::new(build_orchestrator(&cfg));
    let (cmd_tx, snapshot_rx, mut notices) = spawn_studio(orchestrator);

    let commands = vec![
        Command::Analyze {
            url: "acme.test".into(),
            context: String::new(),
        },
        Command::ConfirmIdentity,
        Command::GeneratePlan("launch".into()),
        Command::ConfirmPlan,
        Command::GenerateAll,
    ];
    let expected = commands.len();
    for cmd in commands {
        cmd_tx.send(cmd).unwrap();
    }

    for _ in 0..expected {
        let notice = tokio::time::timeout(Duration::from_secs(5), notices.recv())
            .await
            .expect("notice in time")
            .unwrap();
        assert!(notice.result.is_ok(), "{} failed: {:?}", notice.command, notice.result);
    }

    let snap = snapshot_rx.borrow().clone();
    assert_eq!(snap.stage, Stage::Creative);
    assert_eq!(snap.images.len(), 5);
    assert!(snap.last_error.is_none());

    // 阶段不允许时返回校验错误，且不改变状态
    cmd_tx
        .send(Command::Analyze {
            url: "other.test".into(),
            context: String::new(),
        })
        .unwrap();
    let notice = notices.recv().await.unwrap();
    assert!(matches!(notice.result, Err(StudioError::Validation(_))));
    assert_eq!(snapshot_rx.borrow().stage, Stage::Creative);

    cmd_tx.send(Command::Reset).unwrap();
    let notice = notices.recv().await.unwrap();
    assert_eq!(notice.command, "reset");
    assert_eq!(snapshot_rx.borrow().stage, Stage::Input);
    cmd_tx.send(Command::Quit).unwrap();
}

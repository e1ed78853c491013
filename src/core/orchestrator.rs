//! 阶段编排器：驱动 Input → IdentityReview → Planning → Creative 四阶段向导
//!
//! 每个修改操作都通过 try_lock 独占 Session，期间再来的修改请求直接得到 Conflict（busy），
//! 不会出现后写覆盖先写。所有结果都是「成功则整体替换、失败则保持原样」，失败只写 last_error。
//! 配图扇出不持锁运行，靠 SessionSupervisor 的 epoch 与取消令牌处理新旧批次的竞争。

use std::sync::Arc;

use tokio::sync::{oneshot, watch, Mutex, MutexGuard};

use crate::config::AppConfig;
use crate::core::error::{Operation, StudioError};
use crate::core::fanout::{effective_prompt, FanoutReport, ImageFanout};
use crate::core::session_supervisor::SessionSupervisor;
use crate::core::state::{OperationId, PendingOps, Session, SessionSnapshot, Stage};
use crate::extract::Extractor;
use crate::generation::{GenerationRequest, GenerationResponse, Generator};
use crate::model::{Identity, Plan};

/// 该反馈表示「用原 prompt 重新出图」，跳过 prompt 改写
pub const REGENERATE_SENTINEL: &str = "regenerate without changes";

/// 编排器可调参数
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub default_topic: String,
    pub aspect_ratio: String,
    pub max_concurrent_images: usize,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for OrchestratorOptions {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            default_topic: cfg.app.default_topic.clone(),
            aspect_ratio: cfg.app.aspect_ratio.clone(),
            max_concurrent_images: cfg.app.max_concurrent_images,
        }
    }
}

/// refine_slide_image_prompt 的结果
#[derive(Debug, Clone)]
pub struct SlideImageReport {
    pub slide_number: u32,
    /// 本次出图使用的 prompt
    pub prompt: String,
    /// 是否调用了 prompt 改写
    pub prompt_refined: bool,
    pub images: FanoutReport,
}

/// 进行中操作的登记凭据；Drop 时注销并刷新快照里的 pending，操作 future 被丢弃时同样生效
struct PendingGuard<'a> {
    ops: &'a PendingOps,
    snapshot_tx: &'a watch::Sender<SessionSnapshot>,
    id: OperationId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.ops.remove(self.id);
        let pending = self.ops.list();
        self.snapshot_tx.send_modify(|s| s.pending = pending);
    }
}

pub struct StageOrchestrator {
    extractor: Arc<dyn Extractor>,
    generator: Arc<dyn Generator>,
    fanout: ImageFanout,
    supervisor: SessionSupervisor,
    options: OrchestratorOptions,
    session: Mutex<Session>,
    pending: PendingOps,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl StageOrchestrator {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        generator: Arc<dyn Generator>,
        options: OrchestratorOptions,
    ) -> Self {
        let session = Session::new();
        let (snapshot_tx, _) = watch::channel(session.snapshot(Vec::new()));
        Self {
            fanout: ImageFanout::new(
                generator.clone(),
                &options.aspect_ratio,
                options.max_concurrent_images,
            ),
            extractor,
            generator,
            supervisor: SessionSupervisor::new(),
            options,
            session: Mutex::new(session),
            pending: PendingOps::default(),
            snapshot_tx,
        }
    }

    /// 当前会话的只读快照（不等待进行中的操作）
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// 订阅快照更新
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    fn publish(&self, session: &Session) {
        self.snapshot_tx.send_replace(session.snapshot(self.pending.list()));
    }

    fn begin(&self, op: Operation) -> PendingGuard<'_> {
        PendingGuard {
            ops: &self.pending,
            snapshot_tx: &self.snapshot_tx,
            id: self.pending.insert(op),
        }
    }

    fn acquire(&self) -> Result<MutexGuard<'_, Session>, StudioError> {
        self.session.try_lock().map_err(|_| StudioError::busy())
    }

    /// 记录失败并发布快照；Session 其余字段不动
    fn reject(&self, session: &mut Session, op: Operation, err: StudioError) -> StudioError {
        tracing::warn!(operation = %op, error = %err, "operation failed");
        session.record_error(op, &err);
        self.publish(session);
        err
    }

    async fn call(&self, request: GenerationRequest) -> Result<GenerationResponse, StudioError> {
        let kind = request.kind();
        tracing::info!(kind, "calling generator");
        self.generator.generate(request).await.map_err(StudioError::from)
    }

    fn required_identity(session: &Session) -> Result<Identity, StudioError> {
        session
            .identity
            .clone()
            .ok_or_else(|| StudioError::Validation("no brand identity yet; run analyze first".to_string()))
    }

    fn required_plan(session: &Session) -> Result<Plan, StudioError> {
        session
            .plan
            .clone()
            .ok_or_else(|| StudioError::Validation("no content plan yet; run generate_plan first".to_string()))
    }

    fn required_feedback(feedback: &str) -> Result<&str, StudioError> {
        let feedback = feedback.trim();
        if feedback.is_empty() {
            return Err(StudioError::Validation("feedback is required".to_string()));
        }
        Ok(feedback)
    }

    /// 抓取网页并生成品牌识别；两步都成功才提交并进入 IdentityReview
    pub async fn analyze(&self, url: &str, context: &str) -> Result<Identity, StudioError> {
        let op = Operation::Analyze;
        let mut session = self.acquire()?;
        let url = url.trim();
        if url.is_empty() {
            return Err(self.reject(&mut session, op, StudioError::Validation("URL is required".to_string())));
        }
        let current = session.stage;
        if current != Stage::Input {
            return Err(self.reject(
                &mut session,
                op,
                StudioError::Validation(format!(
                    "analyze is only available in the input stage (current: {}); reset to start over",
                    current
                )),
            ));
        }

        let pending = self.begin(op);
        self.publish(&session);

        let cached = session
            .cached_summary
            .as_ref()
            .filter(|(requested, _)| requested == url)
            .map(|(_, summary)| summary.clone());
        let summary = match cached {
            Some(summary) => {
                tracing::debug!(url, "reusing cached page summary");
                summary
            }
            None => match self.extractor.fetch_summary(url).await {
                Ok(summary) => summary,
                Err(e) => {
                    drop(pending);
                    return Err(self.reject(&mut session, op, e.into()));
                }
            },
        };
        session.cached_summary = Some((url.to_string(), summary.clone()));

        let result = self
            .call(GenerationRequest::Identity {
                summary: summary.clone(),
                context: context.trim().to_string(),
            })
            .await
            .and_then(|r| r.into_identity().map_err(StudioError::from));
        drop(pending);

        match result {
            Ok(identity) => {
                session.summary = Some(summary);
                session.identity = Some(identity.clone());
                session.cached_summary = None;
                session.stage = Stage::IdentityReview;
                session.last_error = None;
                self.publish(&session);
                tracing::info!(url, stage = %session.stage, "brand identity ready");
                Ok(identity)
            }
            Err(e) => Err(self.reject(&mut session, op, e)),
        }
    }

    /// 按反馈改写品牌识别；成功整体替换，失败保留原识别
    pub async fn refine_identity(&self, feedback: &str) -> Result<Identity, StudioError> {
        let op = Operation::RefineIdentity;
        let mut session = self.acquire()?;
        let prepared = Self::required_feedback(feedback)
            .and_then(|f| Ok((f.to_string(), Self::required_identity(&session)?)));
        let (feedback, identity) = match prepared {
            Ok(v) => v,
            Err(e) => return Err(self.reject(&mut session, op, e)),
        };

        let pending = self.begin(op);
        self.publish(&session);
        let result = self
            .call(GenerationRequest::RefineIdentity { identity, feedback })
            .await
            .and_then(|r| r.into_identity().map_err(StudioError::from));
        drop(pending);

        match result {
            Ok(identity) => {
                session.identity = Some(identity.clone());
                session.last_error = None;
                self.publish(&session);
                tracing::info!("brand identity refined");
                Ok(identity)
            }
            Err(e) => Err(self.reject(&mut session, op, e)),
        }
    }

    /// IdentityReview → Planning；已在之后的阶段时为空操作
    pub async fn confirm_identity(&self) -> Result<Stage, StudioError> {
        let op = Operation::ConfirmIdentity;
        let mut session = self.acquire()?;
        match session.stage {
            Stage::IdentityReview => {
                if let Err(e) = Self::required_identity(&session) {
                    return Err(self.reject(&mut session, op, e));
                }
                session.stage = Stage::Planning;
                session.last_error = None;
                self.publish(&session);
                tracing::info!(stage = %session.stage, "identity confirmed");
                Ok(session.stage)
            }
            Stage::Planning | Stage::Creative => Ok(session.stage),
            Stage::Input => Err(self.reject(
                &mut session,
                op,
                StudioError::Validation("no brand identity to confirm".to_string()),
            )),
        }
    }

    /// 基于品牌识别生成内容规划；不自动前进阶段
    pub async fn generate_plan(&self, topic: &str) -> Result<Plan, StudioError> {
        let op = Operation::GeneratePlan;
        let mut session = self.acquire()?;
        let identity = match Self::required_identity(&session) {
            Ok(i) => i,
            Err(e) => return Err(self.reject(&mut session, op, e)),
        };
        let topic = match topic.trim() {
            "" => self.options.default_topic.clone(),
            t => t.to_string(),
        };

        let pending = self.begin(op);
        self.publish(&session);
        let result = self
            .call(GenerationRequest::Plan { identity, topic })
            .await
            .and_then(|r| r.into_plan().map_err(StudioError::from));
        drop(pending);

        match result {
            Ok(plan) => {
                self.supervisor.supersede().await;
                let dropped = session.install_plan(plan.clone());
                session.last_error = None;
                self.publish(&session);
                tracing::info!(slides = plan.slides.len(), dropped = ?dropped, "content plan generated");
                Ok(plan)
            }
            Err(e) => Err(self.reject(&mut session, op, e)),
        }
    }

    /// 按反馈改写规划；整体替换，页码已不存在的配图随之丢弃
    pub async fn refine_plan(&self, feedback: &str) -> Result<Plan, StudioError> {
        let op = Operation::RefinePlan;
        let mut session = self.acquire()?;
        let prepared = Self::required_feedback(feedback)
            .and_then(|f| Ok((f.to_string(), Self::required_plan(&session)?)));
        let (feedback, previous) = match prepared {
            Ok(v) => v,
            Err(e) => return Err(self.reject(&mut session, op, e)),
        };

        let pending = self.begin(op);
        self.publish(&session);
        let result = self
            .call(GenerationRequest::RefinePlan {
                plan: previous.clone(),
                feedback,
            })
            .await
            .and_then(|r| r.into_plan().map_err(StudioError::from));
        drop(pending);

        match result {
            Ok(mut plan) => {
                plan.inherit_prompts_from(&previous);
                self.supervisor.supersede().await;
                let dropped = session.install_plan(plan.clone());
                session.last_error = None;
                self.publish(&session);
                tracing::info!(
                    before = previous.slides.len(),
                    after = plan.slides.len(),
                    dropped = ?dropped,
                    "content plan refined"
                );
                Ok(plan)
            }
            Err(e) => Err(self.reject(&mut session, op, e)),
        }
    }

    /// Planning → Creative；已在 Creative 时为空操作
    pub async fn confirm_plan(&self) -> Result<Stage, StudioError> {
        let op = Operation::ConfirmPlan;
        let mut session = self.acquire()?;
        match session.stage {
            Stage::Planning => {
                if let Err(e) = Self::required_plan(&session) {
                    return Err(self.reject(&mut session, op, e));
                }
                session.stage = Stage::Creative;
                session.last_error = None;
                self.publish(&session);
                tracing::info!(stage = %session.stage, "plan confirmed");
                Ok(session.stage)
            }
            Stage::Creative => Ok(session.stage),
            stage => Err(self.reject(
                &mut session,
                op,
                StudioError::Validation(format!("cannot confirm a plan in the {} stage", stage)),
            )),
        }
    }

    /// 改写单页的 image_prompt 并重新出图
    ///
    /// 反馈为 REGENERATE_SENTINEL 时不调用 prompt 改写，直接用原 prompt 出图。
    /// prompt 改写成功即写回该页（唯一的字段级修改），之后出图失败不回滚 prompt。
    pub async fn refine_slide_image_prompt(
        &self,
        slide_number: u32,
        feedback: &str,
    ) -> Result<SlideImageReport, StudioError> {
        self.run_refine_slide(slide_number, feedback, None).await
    }

    /// unlocked 在释放 Session 锁、进入出图阶段时触发；提前返回时随之丢弃
    pub(crate) async fn run_refine_slide(
        &self,
        slide_number: u32,
        feedback: &str,
        unlocked: Option<oneshot::Sender<()>>,
    ) -> Result<SlideImageReport, StudioError> {
        let op = Operation::RefineSlideImagePrompt;
        let (prompt, prompt_refined, ticket, pending) = {
            let mut session = self.acquire()?;
            let prepared = Self::required_feedback(feedback).and_then(|f| {
                let plan = Self::required_plan(&session)?;
                let identity = Self::required_identity(&session)?;
                let slide = plan.slide(slide_number).cloned().ok_or_else(|| {
                    StudioError::Validation(format!("slide {} does not exist", slide_number))
                })?;
                Ok((f.to_string(), slide, identity))
            });
            let (feedback, slide, identity) = match prepared {
                Ok(v) => v,
                Err(e) => return Err(self.reject(&mut session, op, e)),
            };

            let (prompt, prompt_refined) = if feedback == REGENERATE_SENTINEL {
                (effective_prompt(&slide, &identity), false)
            } else {
                let pending = self.begin(op);
                self.publish(&session);
                let result = self
                    .call(GenerationRequest::RefineImagePrompt {
                        slide,
                        feedback,
                        identity,
                    })
                    .await
                    .and_then(|r| r.into_image_prompt().map_err(StudioError::from));
                drop(pending);
                match result {
                    Ok(prompt) => {
                        if let Some(s) = session.plan.as_mut().and_then(|p| p.slide_mut(slide_number)) {
                            s.image_prompt = Some(prompt.clone());
                        }
                        tracing::info!(slide = slide_number, "image prompt refined");
                        (prompt, true)
                    }
                    Err(e) => return Err(self.reject(&mut session, op, e)),
                }
            };

            let ticket = self.supervisor.begin_single().await;
            let pending = self.begin(op);
            self.publish(&session);
            (prompt, prompt_refined, ticket, pending)
        };
        if let Some(tx) = unlocked {
            let _ = tx.send(());
        }

        let outcome = self
            .fanout
            .generate_one(slide_number, prompt.clone(), ticket)
            .await;

        let mut session = self.session.lock().await;
        drop(pending);
        let current = self.supervisor.is_current(outcome.epoch);
        let report = session.merge_images(outcome, current, op);
        self.publish(&session);

        if report.superseded {
            tracing::warn!(slide = slide_number, epoch = report.epoch, "stale slide image discarded");
            return Err(StudioError::Superseded);
        }
        if let Some(err) = report.failed.get(&slide_number) {
            return Err(err.clone());
        }
        Ok(SlideImageReport {
            slide_number,
            prompt,
            prompt_refined,
            images: report,
        })
    }

    /// 为当前规划的每一页并发出图；部分失败是正常结果，只有整轮被取代才返回错误
    pub async fn generate_all_images(&self) -> Result<FanoutReport, StudioError> {
        self.run_generate_all(None).await
    }

    pub(crate) async fn run_generate_all(
        &self,
        unlocked: Option<oneshot::Sender<()>>,
    ) -> Result<FanoutReport, StudioError> {
        let op = Operation::GenerateAllImages;
        let (plan, identity, ticket, pending) = {
            let mut session = self.acquire()?;
            let prepared = Self::required_plan(&session)
                .and_then(|p| Ok((p, Self::required_identity(&session)?)));
            let (plan, identity) = match prepared {
                Ok(v) => v,
                Err(e) => return Err(self.reject(&mut session, op, e)),
            };
            let ticket = self.supervisor.begin_batch().await;
            let pending = self.begin(op);
            self.publish(&session);
            (plan, identity, ticket, pending)
        };
        if let Some(tx) = unlocked {
            let _ = tx.send(());
        }

        tracing::info!(epoch = ticket.epoch, slides = plan.slides.len(), "generating slide images");
        let outcome = self.fanout.generate_all(&plan, &identity, ticket).await;

        let mut session = self.session.lock().await;
        drop(pending);
        let current = self.supervisor.is_current(outcome.epoch);
        let report = session.merge_images(outcome, current, op);
        self.publish(&session);

        if report.superseded {
            tracing::warn!(epoch = report.epoch, "image batch superseded, results discarded");
            return Err(StudioError::Superseded);
        }
        tracing::info!(
            epoch = report.epoch,
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "slide images generated"
        );
        Ok(report)
    }

    /// 丢弃整个会话回到 Input，并作废进行中的配图
    pub async fn reset(&self) -> Result<(), StudioError> {
        let mut session = self.acquire()?;
        self.supervisor.supersede().await;
        *session = Session::new();
        self.publish(&session);
        tracing::info!(session = %session.id, "session reset");
        Ok(())
    }
}

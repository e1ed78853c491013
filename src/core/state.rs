//! 会话状态：阶段、品牌识别、规划、配图与进行中的操作
//!
//! Session 只由 StageOrchestrator 持有和修改；外部通过 SessionSnapshot（只读投影）渲染。

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::error::{ErrorRecord, Operation, StudioError};
use crate::core::fanout::{FanoutOutcome, FanoutReport};
use crate::model::{Identity, ImageAsset, Plan, Summary};

/// 向导阶段；只能前进（reset 除外）
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Input,
    IdentityReview,
    Planning,
    Creative,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Input => "input",
            Stage::IdentityReview => "identity_review",
            Stage::Planning => "planning",
            Stage::Creative => "creative",
        };
        f.write_str(s)
    }
}

/// 进行中操作的 ID
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize)]
pub struct OperationId(u64);

static NEXT_OPERATION_ID: AtomicU64 = AtomicU64::new(1);

impl OperationId {
    pub fn new() -> Self {
        Self(NEXT_OPERATION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

/// 进行中的操作登记表
///
/// 独立于 Session 的异步锁，登记与注销都是同步的，操作 future 被中途丢弃时也能在 Drop 中注销。
#[derive(Debug, Default)]
pub struct PendingOps {
    ops: Mutex<BTreeMap<OperationId, Operation>>,
}

impl PendingOps {
    fn with_ops<R>(&self, f: impl FnOnce(&mut BTreeMap<OperationId, Operation>) -> R) -> R {
        let mut ops = self.ops.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut ops)
    }

    pub fn insert(&self, op: Operation) -> OperationId {
        let id = OperationId::new();
        self.with_ops(|ops| ops.insert(id, op));
        id
    }

    pub fn remove(&self, id: OperationId) {
        self.with_ops(|ops| ops.remove(&id));
    }

    pub fn list(&self) -> Vec<Operation> {
        self.with_ops(|ops| ops.values().copied().collect())
    }
}

/// 单个向导会话
#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub stage: Stage,
    pub summary: Option<Summary>,
    pub identity: Option<Identity>,
    pub plan: Option<Plan>,
    pub images: BTreeMap<u32, ImageAsset>,
    /// 每页最近一次配图失败
    pub slide_errors: BTreeMap<u32, ErrorRecord>,
    pub last_error: Option<ErrorRecord>,
    /// analyze 中途失败时缓存的摘要（请求 URL, 摘要），同 URL 重试时免抓取；不进快照
    pub(crate) cached_summary: Option<(String, Summary)>,
    pub created_at: DateTime<Utc>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: format!("session_{}", uuid::Uuid::new_v4()),
            stage: Stage::Input,
            summary: None,
            identity: None,
            plan: None,
            images: BTreeMap::new(),
            slide_errors: BTreeMap::new(),
            last_error: None,
            cached_summary: None,
            created_at: Utc::now(),
        }
    }

    pub fn record_error(&mut self, op: Operation, err: &StudioError) {
        self.last_error = Some(ErrorRecord::new(op, err));
    }

    /// 整体替换规划，并丢弃页码已不存在的配图；返回被丢弃的页码
    pub fn install_plan(&mut self, plan: Plan) -> Vec<u32> {
        let numbers = plan.slide_numbers();
        self.plan = Some(plan);
        self.drop_orphans(&numbers)
    }

    fn drop_orphans(&mut self, numbers: &BTreeSet<u32>) -> Vec<u32> {
        let orphaned: Vec<u32> = self
            .images
            .keys()
            .filter(|n| !numbers.contains(n))
            .copied()
            .collect();
        for n in &orphaned {
            self.images.remove(n);
        }
        self.slide_errors.retain(|n, _| numbers.contains(n));
        orphaned
    }

    /// 合并一轮配图结果
    ///
    /// - current 为 false（epoch 低于监管的 floor）：整轮已被取代，全部丢弃
    /// - 页码已不在当前规划中，或该页已有更新 epoch 的图片：丢弃该页
    /// - 失败只记录到 slide_errors，不影响旧图与其他页
    pub fn merge_images(&mut self, outcome: FanoutOutcome, current: bool, op: Operation) -> FanoutReport {
        let mut report = FanoutReport::new(outcome.epoch);
        if !current {
            report.superseded = true;
            report.discarded = outcome.results.iter().map(|r| r.slide_number).collect();
            return report;
        }

        let numbers = self
            .plan
            .as_ref()
            .map(|p| p.slide_numbers())
            .unwrap_or_default();

        for result in outcome.results {
            let n = result.slide_number;
            let newer_exists = self.images.get(&n).map_or(false, |a| a.epoch > outcome.epoch);
            if !numbers.contains(&n) || newer_exists {
                report.discarded.push(n);
                continue;
            }
            match result.result {
                Ok(image) => {
                    self.images.insert(
                        n,
                        ImageAsset {
                            slide_number: n,
                            encoded_bytes: image.encoded_bytes,
                            mime_type: image.mime_type,
                            prompt: result.prompt,
                            epoch: outcome.epoch,
                        },
                    );
                    self.slide_errors.remove(&n);
                    report.succeeded.push(n);
                }
                Err(err) => {
                    self.slide_errors
                        .insert(n, ErrorRecord::new(op, &err).with_slides(vec![n]));
                    report.failed.insert(n, err);
                }
            }
        }

        self.last_error = match report.failed.iter().next() {
            Some((first_slide, first_err)) => {
                let slides: Vec<u32> = report.failed.keys().copied().collect();
                let listed = slides.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(", ");
                let mut record = ErrorRecord::new(op, first_err).with_slides(slides);
                record.message = format!(
                    "image generation failed for slide(s) {} (slide {}: {})",
                    listed, first_slide, first_err
                );
                Some(record)
            }
            None => None,
        };
        report
    }

    /// pending 由 PendingOps 提供
    pub fn snapshot(&self, pending: Vec<Operation>) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id.clone(),
            stage: self.stage,
            summary: self.summary.clone(),
            identity: self.identity.clone(),
            plan: self.plan.clone(),
            images: self.images.clone(),
            slide_errors: self.slide_errors.clone(),
            pending,
            last_error: self.last_error.clone(),
        }
    }
}

/// 会话的只读投影，供展示层渲染
#[derive(Clone, Debug, Serialize)]
pub struct SessionSnapshot {
    pub id: String,
    pub stage: Stage,
    pub summary: Option<Summary>,
    pub identity: Option<Identity>,
    pub plan: Option<Plan>,
    pub images: BTreeMap<u32, ImageAsset>,
    pub slide_errors: BTreeMap<u32, ErrorRecord>,
    pub pending: Vec<Operation>,
    pub last_error: Option<ErrorRecord>,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Session::new().snapshot(Vec::new())
    }
}

impl SessionSnapshot {
    pub fn is_busy(&self) -> bool {
        !self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fanout::SlideResult;
    use crate::generation::GeneratedImage;
    use crate::model::{Slide, SlideKind};

    fn plan(n: u32) -> Plan {
        Plan {
            title: "p".into(),
            slides: (1..=n)
                .map(|i| Slide {
                    number: i,
                    kind: SlideKind::Body,
                    title: format!("Slide {}", i),
                    body: String::new(),
                    visual_description: String::new(),
                    image_prompt: None,
                })
                .collect(),
        }
    }

    fn ok(n: u32) -> SlideResult {
        SlideResult {
            slide_number: n,
            prompt: format!("prompt {}", n),
            result: Ok(GeneratedImage {
                encoded_bytes: format!("img{}", n),
                mime_type: "image/png".into(),
            }),
        }
    }

    fn failed(n: u32) -> SlideResult {
        SlideResult {
            slide_number: n,
            prompt: format!("prompt {}", n),
            result: Err(StudioError::Upstream("quota".into())),
        }
    }

    #[test]
    fn test_pending_ops_insert_remove() {
        let pending = PendingOps::default();
        let a = pending.insert(Operation::Analyze);
        let b = pending.insert(Operation::GenerateAllImages);
        assert_eq!(pending.list(), vec![Operation::Analyze, Operation::GenerateAllImages]);
        pending.remove(a);
        let s = Session::new();
        assert!(s.snapshot(pending.list()).is_busy());
        pending.remove(b);
        assert!(!s.snapshot(pending.list()).is_busy());
    }

    #[test]
    fn test_install_plan_drops_orphans() {
        let mut s = Session::new();
        s.install_plan(plan(5));
        s.merge_images(
            FanoutOutcome {
                epoch: 1,
                results: (1..=5).map(ok).collect(),
            },
            true,
            Operation::GenerateAllImages,
        );
        assert_eq!(s.images.len(), 5);

        let dropped = s.install_plan(plan(3));
        assert_eq!(dropped, vec![4, 5]);
        assert_eq!(s.images.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(s.images[&2].encoded_bytes, "img2");
    }

    #[test]
    fn test_merge_partial_failure() {
        let mut s = Session::new();
        s.install_plan(plan(5));
        let report = s.merge_images(
            FanoutOutcome {
                epoch: 1,
                results: vec![ok(1), ok(2), failed(3), ok(4), ok(5)],
            },
            true,
            Operation::GenerateAllImages,
        );
        assert_eq!(report.succeeded, vec![1, 2, 4, 5]);
        assert_eq!(report.failed.keys().copied().collect::<Vec<_>>(), vec![3]);
        assert!(!s.images.contains_key(&3));
        let err = s.last_error.as_ref().unwrap();
        assert_eq!(err.slide_numbers, vec![3]);
        assert!(err.message.contains("slide 3"));
        assert!(s.slide_errors.contains_key(&3));
    }

    #[test]
    fn test_merge_discards_stale_epochs() {
        let mut s = Session::new();
        s.install_plan(plan(2));
        s.merge_images(
            FanoutOutcome {
                epoch: 5,
                results: vec![ok(1)],
            },
            true,
            Operation::RefineSlideImagePrompt,
        );

        // 整轮低于 floor
        let report = s.merge_images(
            FanoutOutcome {
                epoch: 3,
                results: vec![ok(1), ok(2)],
            },
            false,
            Operation::GenerateAllImages,
        );
        assert!(report.superseded);
        assert!(!s.images.contains_key(&2));

        // 该页已有更新的图片
        let report = s.merge_images(
            FanoutOutcome {
                epoch: 4,
                results: vec![ok(1), ok(2)],
            },
            true,
            Operation::GenerateAllImages,
        );
        assert_eq!(report.discarded, vec![1]);
        assert_eq!(report.succeeded, vec![2]);
        assert_eq!(s.images[&1].epoch, 5);
    }

    #[test]
    fn test_failure_keeps_previous_image() {
        let mut s = Session::new();
        s.install_plan(plan(1));
        s.merge_images(
            FanoutOutcome {
                epoch: 1,
                results: vec![ok(1)],
            },
            true,
            Operation::GenerateAllImages,
        );
        s.merge_images(
            FanoutOutcome {
                epoch: 2,
                results: vec![failed(1)],
            },
            true,
            Operation::GenerateAllImages,
        );
        assert_eq!(s.images[&1].encoded_bytes, "img1");
        assert!(s.last_error.is_some());
    }
}

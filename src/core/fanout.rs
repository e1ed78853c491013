//! 配图扇出：每页一个生成请求，并发发出、全部等待、各自成败
//!
//! 单页失败不取消其他页；取消只来自 SessionSupervisor（被更新的一轮取代）。
//! 本模块只产出结果，合并进 Session 由 Session::merge_images 完成。

use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::Semaphore;

use crate::core::error::StudioError;
use crate::core::session_supervisor::GenerationTicket;
use crate::generation::{GeneratedImage, GenerationRequest, GenerationResponse, Generator};
use crate::model::{Identity, Plan, Slide};

/// 单页的生成任务
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlideJob {
    pub slide_number: u32,
    pub prompt: String,
}

#[derive(Debug)]
pub struct SlideResult {
    pub slide_number: u32,
    pub prompt: String,
    pub result: Result<GeneratedImage, StudioError>,
}

/// 一轮扇出的原始结果
#[derive(Debug)]
pub struct FanoutOutcome {
    pub epoch: u64,
    pub results: Vec<SlideResult>,
}

/// 合并后的结果：哪些页成功、失败、被丢弃
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanoutReport {
    pub epoch: u64,
    pub succeeded: Vec<u32>,
    pub failed: BTreeMap<u32, StudioError>,
    /// 过期或页码已不存在而未写入的页
    pub discarded: Vec<u32>,
    /// 整轮已被更新的一轮取代
    pub superseded: bool,
}

impl FanoutReport {
    pub fn new(epoch: u64) -> Self {
        Self {
            epoch,
            succeeded: Vec::new(),
            failed: BTreeMap::new(),
            discarded: Vec::new(),
            superseded: false,
        }
    }
}

/// slide 没有 image_prompt 时的兜底 prompt，仍原样包含标题
pub fn fallback_prompt(slide: &Slide, identity: &Identity) -> String {
    format!(
        "Instagram carousel slide. Background visual: {}. Overlay text: \"{}\". Style: {}. \
         8k resolution, highly detailed, photorealistic, masterpiece. No extra text.",
        slide.visual_description, slide.title, identity.design_style
    )
}

/// 有效 prompt：优先使用非空的 image_prompt
pub fn effective_prompt(slide: &Slide, identity: &Identity) -> String {
    slide
        .prompt()
        .map(String::from)
        .unwrap_or_else(|| fallback_prompt(slide, identity))
}

pub struct ImageFanout {
    generator: Arc<dyn Generator>,
    aspect_ratio: String,
    limit: Arc<Semaphore>,
}

impl ImageFanout {
    pub fn new(generator: Arc<dyn Generator>, aspect_ratio: &str, max_concurrent: usize) -> Self {
        Self {
            generator,
            aspect_ratio: aspect_ratio.to_string(),
            limit: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    pub fn jobs_for_plan(plan: &Plan, identity: &Identity) -> Vec<SlideJob> {
        plan.slides
            .iter()
            .map(|s| SlideJob {
                slide_number: s.number,
                prompt: effective_prompt(s, identity),
            })
            .collect()
    }

    /// 为规划中的每一页生成图片
    pub async fn generate_all(&self, plan: &Plan, identity: &Identity, ticket: GenerationTicket) -> FanoutOutcome {
        self.run(Self::jobs_for_plan(plan, identity), ticket).await
    }

    /// 单页生成（refine_slide_image_prompt 使用）
    pub async fn generate_one(&self, slide_number: u32, prompt: String, ticket: GenerationTicket) -> FanoutOutcome {
        self.run(vec![SlideJob { slide_number, prompt }], ticket).await
    }

    async fn run(&self, jobs: Vec<SlideJob>, ticket: GenerationTicket) -> FanoutOutcome {
        let GenerationTicket { epoch, token } = ticket;
        let tasks = jobs.into_iter().map(|job| {
            let token = token.clone();
            async move {
                let work = async {
                    let _permit = self
                        .limit
                        .acquire()
                        .await
                        .map_err(|_| StudioError::Superseded)?;
                    self.generator
                        .generate(GenerationRequest::Image {
                            slide_number: job.slide_number,
                            prompt: job.prompt.clone(),
                            aspect_ratio: self.aspect_ratio.clone(),
                        })
                        .await
                        .and_then(GenerationResponse::into_image)
                        .map_err(StudioError::from)
                };
                let result = tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(StudioError::Superseded),
                    r = work => r,
                };
                if let Err(ref e) = result {
                    tracing::warn!(slide = job.slide_number, epoch, error = %e, "slide image failed");
                }
                SlideResult {
                    slide_number: job.slide_number,
                    prompt: job.prompt,
                    result,
                }
            }
        });
        let results = join_all(tasks).await;
        FanoutOutcome { epoch, results }
    }
}

//! 会话监管：配图批次的 epoch 与取消令牌
//!
//! 每次配图请求领取一个递增 epoch。新的 generate_all、规划替换或 reset 会抬高 floor 并取消当前令牌，
//! 低于 floor 的结果在合并时整轮丢弃；单页重绘使用当前令牌的子令牌，不抬高 floor。

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// 一次配图请求的凭据
#[derive(Debug, Clone)]
pub struct GenerationTicket {
    pub epoch: u64,
    pub token: CancellationToken,
}

#[derive(Debug)]
pub struct SessionSupervisor {
    next_epoch: AtomicU64,
    /// 低于该值的 epoch 视为过期
    floor: AtomicU64,
    /// 当前批次的取消令牌
    batch_token: Mutex<CancellationToken>,
}

impl SessionSupervisor {
    pub fn new() -> Self {
        Self {
            next_epoch: AtomicU64::new(1),
            floor: AtomicU64::new(0),
            batch_token: Mutex::new(CancellationToken::new()),
        }
    }

    fn next(&self) -> u64 {
        self.next_epoch.fetch_add(1, Ordering::SeqCst)
    }

    fn floor(&self) -> u64 {
        self.floor.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        epoch >= self.floor()
    }

    /// 开始新一轮全量配图：取消进行中的请求，floor 抬到本轮 epoch
    pub async fn begin_batch(&self) -> GenerationTicket {
        let mut token = self.batch_token.lock().await;
        token.cancel();
        *token = CancellationToken::new();
        let epoch = self.next();
        self.floor.store(epoch, Ordering::SeqCst);
        GenerationTicket {
            epoch,
            token: token.clone(),
        }
    }

    /// 单页重绘：不影响其他进行中的请求，但会被之后的 begin_batch / supersede 取消
    pub async fn begin_single(&self) -> GenerationTicket {
        let token = self.batch_token.lock().await;
        GenerationTicket {
            epoch: self.next(),
            token: token.child_token(),
        }
    }

    /// 作废所有进行中的配图（规划被替换或会话重置）
    pub async fn supersede(&self) {
        let mut token = self.batch_token.lock().await;
        token.cancel();
        *token = CancellationToken::new();
        let epoch = self.next();
        self.floor.store(epoch, Ordering::SeqCst);
    }
}

impl Default for SessionSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_batch_cancels_previous() {
        let sup = SessionSupervisor::new();
        let first = sup.begin_batch().await;
        let single = sup.begin_single().await;
        assert!(sup.is_current(first.epoch));
        assert!(single.epoch > first.epoch);

        let second = sup.begin_batch().await;
        assert!(first.token.is_cancelled());
        assert!(single.token.is_cancelled());
        assert!(!second.token.is_cancelled());
        assert!(!sup.is_current(first.epoch));
        assert!(!sup.is_current(single.epoch));
        assert!(sup.is_current(second.epoch));
    }

    #[tokio::test]
    async fn test_single_does_not_raise_floor() {
        let sup = SessionSupervisor::new();
        let batch = sup.begin_batch().await;
        let _single = sup.begin_single().await;
        assert!(sup.is_current(batch.epoch));
        assert!(!batch.token.is_cancelled());
    }

    #[tokio::test]
    async fn test_supersede_invalidates_everything() {
        let sup = SessionSupervisor::new();
        let batch = sup.begin_batch().await;
        sup.supersede().await;
        assert!(batch.token.is_cancelled());
        assert!(!sup.is_current(batch.epoch));
        let next = sup.begin_single().await;
        assert!(sup.is_current(next.epoch));
    }
}

//! 追发消息 Worker
//!
//! 周期扫描已通过且未追发的领取记录，所属活动配置了追发文案且延迟已到
//! 的逐条发送。标记在发送确认成功之后才条件置位，因此投递失败的记录会
//! 在下一轮扫描重试；重复扫描对已置位的记录不再发送（可重入）。

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, instrument, warn};

use crate::repository::{AttemptRepositoryTrait, FollowUpDue};
use crate::service::Outbox;

/// 追发消息 Worker
pub struct FollowUpWorker {
    attempts: Arc<dyn AttemptRepositoryTrait>,
    outbox: Arc<Outbox>,
    poll_interval: Duration,
}

impl FollowUpWorker {
    pub fn new(
        attempts: Arc<dyn AttemptRepositoryTrait>,
        outbox: Arc<Outbox>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            attempts,
            outbox,
            poll_interval,
        }
    }

    /// 主循环：持续扫描直到进程退出
    pub async fn run(&self) {
        info!(poll_interval = ?self.poll_interval, "FollowUpWorker 已启动");
        loop {
            match self.process_pending_follow_ups().await {
                Ok(count) if count > 0 => {
                    info!(count, "follow-up messages sent");
                }
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "追发扫描出错");
                }
            }

            // 记录 Worker 健康状态，供 Prometheus 告警判断 Worker 是否存活
            giveaway_shared::observability::metrics::set_worker_last_run("follow_up_worker");

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// 单轮扫描，返回本轮成功追发的条数
    ///
    /// 对外部调度器暴露为独立入口，便于手动触发和测试。
    #[instrument(skip(self))]
    pub async fn process_pending_follow_ups(&self) -> crate::error::Result<u64> {
        let due = self.attempts.list_due_follow_ups(Utc::now()).await?;
        if due.is_empty() {
            return Ok(0);
        }

        info!(count = due.len(), "发现到期的追发消息");

        let mut sent = 0u64;
        for item in due {
            if self.send_one(&item).await {
                sent += 1;
            }
        }

        Ok(sent)
    }

    /// 发送一条追发消息；标记置位由发送成功 gate
    async fn send_one(&self, due: &FollowUpDue) -> bool {
        let delivery = self
            .outbox
            .send_to_chat(
                &due.bot_token,
                due.bot_id,
                due.user_id,
                &due.chat_id,
                &due.follow_up_text,
                None,
            )
            .await;

        if let Err(e) = delivery {
            // 不置位：下一轮扫描重试
            warn!(attempt_id = due.attempt_id, error = %e, "追发投递失败，下轮重试");
            return false;
        }

        match self.attempts.mark_follow_up_sent(due.attempt_id).await {
            Ok(true) => {
                metrics::counter!("follow_ups_sent_total").increment(1);
                true
            }
            Ok(false) => {
                // 并发扫描两边都在条件更新前观察到了未置位：
                // 标记仍然只置位一次，这里记录可能的重复送达
                warn!(
                    attempt_id = due.attempt_id,
                    "追发标记已被并发扫描置位，本条可能重复送达"
                );
                false
            }
            Err(e) => {
                error!(attempt_id = due.attempt_id, error = %e, "追发标记置位失败");
                false
            }
        }
    }
}

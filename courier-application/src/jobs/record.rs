//! 作业持久化记录（JobRecord）
//!
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
pub struct JobRecord {
    #[builder(default = Uuid::new_v4())]
    id: Uuid,
    /// 队列 ID（命令的 `NAME`）
    #[builder(into)]
    queue_id: String,
    /// 调用方用于查询结果与取消的追踪 ID
    #[builder(default = Uuid::new_v4())]
    tracking_id: Uuid,
    /// 序列化后的命令
    command: Value,
    #[builder(default = Utc::now())]
    created_at: DateTime<Utc>,
    /// 最早执行时间
    #[builder(default = Utc::now())]
    execute_after: DateTime<Utc>,
    expire_on: DateTime<Utc>,
    #[builder(default)]
    is_complete: bool,
    /// 已失败的执行次数
    #[builder(default)]
    attempts: u32,
}

impl JobRecord {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn queue_id(&self) -> &str {
        &self.queue_id
    }

    pub fn tracking_id(&self) -> Uuid {
        self.tracking_id
    }

    pub fn command(&self) -> &Value {
        &self.command
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn execute_after(&self) -> DateTime<Utc> {
        self.execute_after
    }

    pub fn expire_on(&self) -> DateTime<Utc> {
        self.expire_on
    }

    pub fn is_complete(&self) -> bool {
        self.is_complete
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn mark_complete(&mut self) {
        self.is_complete = true;
    }

    /// 记录一次失败并推迟下次执行时间
    pub fn reschedule(&mut self, failure: &JobFailure) {
        self.attempts = failure.attempt;
        self.execute_after = failure.retry_at;
    }

    /// 到期且未完成、未过期
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.is_complete && self.execute_after <= now && now < self.expire_on
    }

    /// 已完成或已过期，可被清理
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.is_complete || now >= self.expire_on
    }
}

/// 一次失败执行的描述，交给存储实现退避
#[derive(Debug, Clone)]
pub struct JobFailure {
    pub error: String,
    /// 包含本次在内的失败次数
    pub attempt: u32,
    pub retry_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn job(execute_after: DateTime<Utc>) -> JobRecord {
        JobRecord::builder()
            .queue_id("report.render")
            .command(serde_json::json!({ "id": 1 }))
            .execute_after(execute_after)
            .expire_on(execute_after + Duration::hours(1))
            .build()
    }

    #[test]
    fn due_only_between_execute_after_and_expiry() {
        let now = Utc::now();
        let j = job(now + Duration::minutes(5));
        assert!(!j.is_due(now));
        assert!(j.is_due(now + Duration::minutes(5)));
        assert!(!j.is_due(now + Duration::hours(2)));
        assert!(j.is_stale(now + Duration::hours(2)));
    }

    #[test]
    fn reschedule_pushes_execute_after() {
        let now = Utc::now();
        let mut j = job(now);
        j.reschedule(&JobFailure {
            error: "boom".into(),
            attempt: 1,
            retry_at: now + Duration::minutes(1),
        });
        assert_eq!(j.attempts(), 1);
        assert!(!j.is_due(now));
        assert!(!j.is_complete());

        j.mark_complete();
        assert!(!j.is_due(now + Duration::minutes(2)));
        assert!(j.is_stale(now));
    }
}

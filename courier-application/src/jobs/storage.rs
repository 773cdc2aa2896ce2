//! 作业存储契约（JobStorage）
//!
//! 由外部实现（关系型、文档型或内存存储）。所有方法都可能返回瞬时错误，
//! 引擎会上报异常接收器并固定延迟重试。
//!
use crate::jobs::{JobFailure, JobRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use courier_domain::error::{DomainError, DomainResult};
use serde_json::Value;
use uuid::Uuid;

/// 读取到期作业的查询条件
#[derive(Debug, Clone)]
pub struct PendingJobQuery {
    pub queue_id: String,
    pub limit: usize,
    pub now: DateTime<Utc>,
}

impl PendingJobQuery {
    pub fn new(queue_id: impl Into<String>, limit: usize) -> Self {
        Self {
            queue_id: queue_id.into(),
            limit,
            now: Utc::now(),
        }
    }

    pub fn matches(&self, job: &JobRecord) -> bool {
        job.queue_id() == self.queue_id && job.is_due(self.now)
    }
}

#[async_trait]
pub trait JobStorage: Send + Sync {
    async fn store_job(&self, job: JobRecord) -> DomainResult<()>;

    /// 读取到期且未完成的作业，按最早可执行优先排序
    async fn next_batch(&self, query: PendingJobQuery) -> DomainResult<Vec<JobRecord>>;

    /// 幂等的完成标记
    async fn mark_complete(&self, job: &JobRecord) -> DomainResult<()>;

    /// 按追踪 ID 取消（标记完成）；作业不存在或已完成时返回 `false`
    async fn cancel_job(&self, tracking_id: Uuid) -> DomainResult<bool>;

    /// 处理器失败钩子：实现退避（推迟 `ExecuteAfter`），作业保持未完成
    async fn on_handler_execution_failure(
        &self,
        job: &JobRecord,
        failure: &JobFailure,
    ) -> DomainResult<()>;

    /// 删除已完成或已过期的作业，返回删除数量
    async fn purge_stale(&self, now: DateTime<Utc>) -> DomainResult<usize>;

    async fn store_job_result(&self, _job: &JobRecord, _result: Value) -> DomainResult<()> {
        Err(DomainError::Unsupported {
            operation: "store_job_result",
        })
    }

    async fn get_job_result(&self, _tracking_id: Uuid) -> DomainResult<Option<Value>> {
        Err(DomainError::Unsupported {
            operation: "get_job_result",
        })
    }

    /// 是否支持多个引擎实例并发轮询（例如基于条件认领）
    fn supports_distributed_polling(&self) -> bool {
        false
    }
}

use std::time::Duration;

/// 作业队列配置
#[derive(Clone, Copy, Debug)]
pub struct JobQueueConfig {
    /// 每次轮询读取的最大作业数
    pub batch_limit: usize,
    /// 全部队列共享的最大并发执行数
    pub max_concurrency: usize,
    /// 单次执行的时间上限，超时按失败处理
    pub execution_time_limit: Option<Duration>,
    /// 未被唤醒时的兜底轮询间隔
    pub poll_interval: Duration,
    /// 处理器失败后 `ExecuteAfter` 的推迟时间
    pub retry_backoff: Duration,
    /// 存储错误后的重试延迟
    pub storage_retry_delay: Duration,
    /// 作业的默认存活时间（`ExpireOn = ExecuteAfter + job_ttl`）
    pub job_ttl: chrono::Duration,
    /// 陈旧作业清理间隔
    pub purge_interval: Duration,
}

impl Default for JobQueueConfig {
    fn default() -> Self {
        Self {
            batch_limit: 10,
            max_concurrency: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            execution_time_limit: None,
            poll_interval: Duration::from_secs(5),
            retry_backoff: Duration::from_secs(60),
            storage_retry_delay: Duration::from_secs(5),
            job_ttl: chrono::Duration::hours(4),
            purge_interval: Duration::from_secs(60 * 60),
        }
    }
}

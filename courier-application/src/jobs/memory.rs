//! 内存版作业存储（InMemoryJobStorage）
//!
//! 按队列 ID 分片保存作业，另维护“追踪 ID → 作业”索引用于取消与查询；
//! 结果按追踪 ID 保存，随作业过期一起清理。不支持多实例并发轮询。
//!
use crate::jobs::{JobFailure, JobRecord, JobStorage, PendingJobQuery};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use courier_domain::error::DomainResult as Result;
use dashmap::DashMap;
use serde_json::Value;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryJobStorage {
    queues: DashMap<String, Vec<JobRecord>>,
    // 追踪 ID → 队列 ID
    tracking: DashMap<Uuid, String>,
    results: DashMap<Uuid, (Value, DateTime<Utc>)>,
}

impl InMemoryJobStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按追踪 ID 查看作业当前状态
    pub fn job(&self, tracking_id: Uuid) -> Option<JobRecord> {
        let queue_id = self.tracking.get(&tracking_id)?.clone();
        self.queues
            .get(&queue_id)?
            .iter()
            .find(|j| j.tracking_id() == tracking_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.queues.iter().map(|q| q.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn update<F>(&self, queue_id: &str, id: Uuid, f: F) -> bool
    where
        F: FnOnce(&mut JobRecord),
    {
        let Some(mut queue) = self.queues.get_mut(queue_id) else {
            return false;
        };
        match queue.iter_mut().find(|j| j.id() == id) {
            Some(job) => {
                f(job);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl JobStorage for InMemoryJobStorage {
    async fn store_job(&self, job: JobRecord) -> Result<()> {
        self.tracking
            .insert(job.tracking_id(), job.queue_id().to_string());
        self.queues
            .entry(job.queue_id().to_string())
            .or_default()
            .push(job);
        Ok(())
    }

    async fn next_batch(&self, query: PendingJobQuery) -> Result<Vec<JobRecord>> {
        let Some(queue) = self.queues.get(&query.queue_id) else {
            return Ok(Vec::new());
        };

        let mut due: Vec<JobRecord> = queue.iter().filter(|j| query.matches(j)).cloned().collect();
        due.sort_by_key(|j| (j.execute_after(), j.created_at()));
        due.truncate(query.limit);
        Ok(due)
    }

    async fn mark_complete(&self, job: &JobRecord) -> Result<()> {
        self.update(job.queue_id(), job.id(), JobRecord::mark_complete);
        Ok(())
    }

    async fn cancel_job(&self, tracking_id: Uuid) -> Result<bool> {
        let Some(queue_id) = self.tracking.get(&tracking_id).map(|q| q.clone()) else {
            return Ok(false);
        };
        let Some(mut queue) = self.queues.get_mut(&queue_id) else {
            return Ok(false);
        };
        match queue
            .iter_mut()
            .find(|j| j.tracking_id() == tracking_id && !j.is_complete())
        {
            Some(job) => {
                job.mark_complete();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn on_handler_execution_failure(
        &self,
        job: &JobRecord,
        failure: &JobFailure,
    ) -> Result<()> {
        self.update(job.queue_id(), job.id(), |j| j.reschedule(failure));
        Ok(())
    }

    async fn purge_stale(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut purged = 0;

        for mut queue in self.queues.iter_mut() {
            let before = queue.len();
            queue.retain(|j| {
                let stale = j.is_stale(now);
                if stale {
                    self.tracking.remove(&j.tracking_id());
                }
                !stale
            });
            purged += before - queue.len();
        }
        self.results.retain(|_, (_, expire_on)| now < *expire_on);

        Ok(purged)
    }

    async fn store_job_result(&self, job: &JobRecord, result: Value) -> Result<()> {
        self.results
            .insert(job.tracking_id(), (result, job.expire_on()));
        Ok(())
    }

    async fn get_job_result(&self, tracking_id: Uuid) -> Result<Option<Value>> {
        Ok(self.results.get(&tracking_id).map(|r| r.0.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn job(queue: &str, n: u32, execute_after: DateTime<Utc>) -> JobRecord {
        JobRecord::builder()
            .queue_id(queue)
            .command(json!({ "n": n }))
            .execute_after(execute_after)
            .expire_on(execute_after + Duration::hours(1))
            .build()
    }

    #[tokio::test]
    async fn next_batch_is_due_oldest_first_and_bounded() {
        let storage = InMemoryJobStorage::new();
        let now = Utc::now();
        storage.store_job(job("q", 1, now - Duration::seconds(1))).await.unwrap();
        storage.store_job(job("q", 2, now - Duration::seconds(30))).await.unwrap();
        storage.store_job(job("q", 3, now + Duration::days(1))).await.unwrap();
        storage.store_job(job("q", 4, now - Duration::seconds(10))).await.unwrap();
        storage.store_job(job("other", 5, now)).await.unwrap();

        let batch = storage
            .next_batch(PendingJobQuery::new("q", 2))
            .await
            .unwrap();
        let ns: Vec<u64> = batch.iter().map(|j| j.command()["n"].as_u64().unwrap()).collect();
        assert_eq!(ns, vec![2, 4]);
    }

    #[tokio::test]
    async fn failure_hook_defers_and_cancel_completes() {
        let storage = InMemoryJobStorage::new();
        let now = Utc::now();
        let j = job("q", 1, now - Duration::seconds(1));
        storage.store_job(j.clone()).await.unwrap();

        storage
            .on_handler_execution_failure(
                &j,
                &JobFailure {
                    error: "boom".into(),
                    attempt: 1,
                    retry_at: now + Duration::minutes(1),
                },
            )
            .await
            .unwrap();
        assert!(storage.next_batch(PendingJobQuery::new("q", 10)).await.unwrap().is_empty());
        assert_eq!(storage.job(j.tracking_id()).unwrap().attempts(), 1);

        assert!(storage.cancel_job(j.tracking_id()).await.unwrap());
        assert!(!storage.cancel_job(j.tracking_id()).await.unwrap());
        assert!(!storage.cancel_job(Uuid::new_v4()).await.unwrap());
        assert!(storage.job(j.tracking_id()).unwrap().is_complete());
    }

    #[tokio::test]
    async fn purge_drops_complete_and_expired_jobs_only() {
        let storage = InMemoryJobStorage::new();
        let now = Utc::now();
        let live = job("q", 1, now);
        let done = job("q", 2, now);
        let expired = job("q", 3, now - Duration::hours(2));
        for j in [&live, &done, &expired] {
            storage.store_job(j.clone()).await.unwrap();
        }
        storage.mark_complete(&done).await.unwrap();
        storage.store_job_result(&done, json!(42)).await.unwrap();

        assert_eq!(storage.purge_stale(now).await.unwrap(), 2);
        assert_eq!(storage.len(), 1);
        assert!(storage.job(live.tracking_id()).is_some());
        assert!(storage.job(expired.tracking_id()).is_none());
        // 结果保留到作业过期
        assert_eq!(
            storage.get_job_result(done.tracking_id()).await.unwrap(),
            Some(json!(42))
        );

        storage.purge_stale(now + Duration::hours(2)).await.unwrap();
        assert_eq!(storage.get_job_result(done.tracking_id()).await.unwrap(), None);
    }
}

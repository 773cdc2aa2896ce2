//! 作业队列（Job Queue）
//!
//! 将命令持久化为作业记录，由后台轮询器在到期后通过命令总线执行：
//! `Pending → Due → Executing → {Complete | RetryScheduled | Cancelled}`。
//!
//! - 存储契约（`JobStorage`）由外部实现注入，`InMemoryJobStorage` 用于测试与单实例部署；
//! - 失败不会丢失作业：`ExecuteAfter` 被推迟固定退避时间后再次参与轮询；
//! - 按追踪 ID 取消：标记完成且不再执行，正在执行的作业收到协作式取消信号。
//!
mod config;
mod memory;
mod queue;
mod receiver;
mod record;
mod storage;

pub use config::JobQueueConfig;
pub use memory::InMemoryJobStorage;
pub use queue::{JobOptions, JobQueue};
pub use receiver::{JobExceptionReceiver, NoopJobReceiver};
pub use record::{JobFailure, JobRecord};
pub use storage::{JobStorage, PendingJobQuery};

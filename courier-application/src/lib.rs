//! 应用层（courier-application）
//!
//! - 命令契约与单处理器命令总线（`command`、`command_bus`、`inmemory_command_bus`）；
//! - 应用上下文（`context`）：链路信息、幂等键与协作式取消；
//! - 作业队列（`jobs`）：持久化、轮询执行、失败退避、按追踪 ID 取消与结果存取。
//!
pub mod command;
pub mod command_bus;
pub mod command_handler;
pub mod context;
pub mod error;
pub mod inmemory_command_bus;
pub mod jobs;

pub use inmemory_command_bus::InMemoryCommandBus;
pub use jobs::{JobOptions, JobQueue, JobQueueConfig};

extern crate self as courier_application;

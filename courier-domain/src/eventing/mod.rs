//! 进程内事件子系统（eventing）
//!
//! 提供事件发布与处理的基础抽象与运行时：
//! - `EventHandler`：对某一事件类型的消费处理；
//! - `EventHandlerRegistry`：按事件类型登记处理器（同一处理器类型只保留一个实例）；
//! - `EventBus`：统一发布接口，按 `WaitMode` 决定调用方等待策略；
//! - `InMemoryEventBus`：基于 tokio 任务的进程内实现；
//! - `EventRecorder`：测试模式下记录所有已发布事件；
//! - `EventBusExceptionReceiver`：处理器失败回调（默认空实现）。
//!
pub mod bus;
pub mod bus_inmemory;
pub mod handler;
pub mod receiver;
pub mod recorder;
pub mod registry;

pub use bus::{EventBus, WaitMode};
pub use bus_inmemory::InMemoryEventBus;
pub use handler::EventHandler;
pub use receiver::{EventBusExceptionReceiver, NoopEventBusReceiver};
pub use recorder::EventRecorder;
pub use registry::EventHandlerRegistry;

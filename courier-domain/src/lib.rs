//! 消息与投递领域层（courier-domain）
//!
//! 提供进程内/跨进程事件投递所需的通用抽象与运行时：
//! - 事件契约（`event`）：带稳定名称的事件载荷；
//! - 进程内事件总线（`eventing`）：多处理器扇出、等待模式、测试记录器；
//! - 事件中枢（`hub`）：按订阅者持久化的广播队列、投递循环、过期清理；
//! - 后台任务（`worker`）：可关闭、可等待的周期任务句柄。
//!
//! 本 crate 不绑定任何存储与传输实现，仅定义协议与引擎；
//! 持久化由 `hub::EventStorage` 的实现注入，传输由 `hub::EventSink` 的实现注入。
//!
//! 典型用法：
//! 1. 用 `#[event]` 定义事件，实现 `EventHandler` 并注册到 `EventHandlerRegistry`；
//! 2. 通过 `InMemoryEventBus::publish` 以指定 `WaitMode` 发布；
//! 3. 需要远程广播时，构建 `EventHub` 并注册为该事件的处理器；
//! 4. 启动 `StaleSweeper` 周期清理已完成或过期的记录，`EventHub::start_stale_eviction` 驱逐长期无人取数的订阅者。
//!
pub mod error;
pub mod event;
pub mod eventing;
pub mod hub;
pub mod worker;

// 允许在本 crate 内部通过 ::courier_domain 进行自引用，
// 以便过程宏在本 crate 的单元测试中也能解析到 ::courier_domain 路径。
extern crate self as courier_domain;

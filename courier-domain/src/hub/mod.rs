//! 事件中枢（hub）
//!
//! 将本地发布的事件持久化到每个订阅者各自的队列，再由每个订阅者独立的
//! 投递循环按 FIFO 顺序推送给远程订阅者，提供“至少一次”的投递语义：
//! - `EventRecord`：按订阅者写入的持久化记录（写时扇出）；
//! - `EventStorage`：可插拔的存储协议，`InMemoryEventStorage` 为内存实现；
//! - `EventSink`：外部传输的接缝，`ChannelSink` 基于 tokio mpsc；
//! - `HubExceptionReceiver`：存储错误、溢出驱逐等异常回调（默认空实现）；
//! - `EventHub`：订阅登记、扇出写入、投递循环、溢出驱逐；
//! - `StaleSweeper`：周期清理已完成或已过期的记录。
//!
mod event_hub;
mod memory;
mod receiver;
mod record;
mod sink;
mod storage;
mod sweeper;

pub use event_hub::{EventHub, EventHubConfig};
pub use memory::{InMemoryEventStorage, InMemoryEventStorageConfig, SubscriberQueue};
pub use receiver::{HubExceptionReceiver, NoopHubReceiver};
pub use record::EventRecord;
pub use sink::{ChannelSink, EventSink};
pub use storage::{EventStorage, PendingRecordQuery, StaleRecordFilter};
pub use sweeper::StaleSweeper;

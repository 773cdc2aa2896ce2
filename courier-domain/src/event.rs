//! 事件契约（Event）
//!
//! 事件是纯数据载荷，除“类型 + 内容”外没有固有标识。
//! - 同一事件类型可以被零到多个处理器消费；
//! - `NAME` 作为稳定名称写入持久化记录与日志，避免依赖 `type_name::<T>()`。
//!
//! 通常使用 `#[event]` 宏派生，也可手动实现。

/// 事件（Event）
pub trait Event: Clone + Send + Sync + 'static {
    /// 事件的稳定名称（建议常量字符串，不随重构变化）
    const NAME: &'static str;
}

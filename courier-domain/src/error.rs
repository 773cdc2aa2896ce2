//! 领域层统一错误定义
//!
//! 覆盖序列化、事件处理、存储与容量等最小必要集合，
//! 便于在各实现层统一转换为 `DomainError`。
//!
use thiserror::Error;

/// 统一错误类型（基础库最小必要集）
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DomainError {
    // --- 序列化 ---
    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },
    #[error("type mismatch: expected={expected}, found={found}")]
    TypeMismatch { expected: String, found: String },

    // --- 事件系统 ---
    #[error("event handler error: handler={handler}, reason={reason}")]
    EventHandler { handler: String, reason: String },
    #[error("{} event handler(s) failed: {}", .failures.len(), render_failures(.failures))]
    EventHandlers { failures: Vec<(String, String)> },
    #[error("event sink error: subscriber={subscriber_id}, reason={reason}")]
    EventSink {
        subscriber_id: String,
        reason: String,
    },

    // --- 存储 ---
    #[error("storage error: {reason}")]
    Storage { reason: String },
    #[error("queue overflow: subscriber={subscriber_id}, limit={limit}")]
    QueueOverflow { subscriber_id: String, limit: usize },
    #[error("stale subscriber queue: subscriber={subscriber_id}")]
    StaleSubscriber { subscriber_id: String },
    #[error("unsupported operation: {operation}")]
    Unsupported { operation: &'static str },

    // --- 通用 ---
    #[error("operation cancelled")]
    Cancelled,
}

impl DomainError {
    pub fn storage(reason: impl Into<String>) -> Self {
        DomainError::Storage {
            reason: reason.into(),
        }
    }

    /// 是否为可重试的瞬时错误（容量、陈旧与不支持的操作不重试）
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            DomainError::QueueOverflow { .. }
                | DomainError::StaleSubscriber { .. }
                | DomainError::Unsupported { .. }
                | DomainError::Cancelled
        )
    }
}

fn render_failures(failures: &[(String, String)]) -> String {
    failures
        .iter()
        .map(|(handler, reason)| format!("{handler}: {reason}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// 统一 Result 类型别名
pub type DomainResult<T> = Result<T, DomainError>;

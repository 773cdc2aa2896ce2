//! 事件出口（EventSink）
//!
//! 外部传输层（RPC 推流等）的接缝：投递循环逐条调用 `send`，
//! 返回 `Ok` 视为已交付，随后标记记录完成；返回错误视为连接断开。
//!
use crate::error::{DomainError, DomainResult as Result};
use crate::event::Event;
use async_trait::async_trait;
use tokio::sync::mpsc;

#[async_trait]
pub trait EventSink<E>: Send + Sync
where
    E: Event,
{
    async fn send(&self, event: E) -> Result<()>;
}

/// 基于 tokio mpsc 的出口，接收端关闭即视为断开
pub struct ChannelSink<E> {
    subscriber_id: String,
    tx: mpsc::Sender<E>,
}

impl<E: Event> ChannelSink<E> {
    pub fn new(subscriber_id: impl Into<String>, tx: mpsc::Sender<E>) -> Self {
        Self {
            subscriber_id: subscriber_id.into(),
            tx,
        }
    }
}

#[async_trait]
impl<E: Event> EventSink<E> for ChannelSink<E> {
    async fn send(&self, event: E) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| DomainError::EventSink {
                subscriber_id: self.subscriber_id.clone(),
                reason: "receiver closed".to_string(),
            })
    }
}

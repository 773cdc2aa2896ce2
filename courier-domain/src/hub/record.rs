//! 事件持久化记录（EventRecord）
//!
//! 一条记录对应“一个事件 × 一个订阅者”，发布时按当前已知订阅者逐一创建；
//! 投递成功后被标记完成，由过期清理最终删除。
//!
use crate::error::{DomainError, DomainResult};
use crate::event::Event;
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
pub struct EventRecord {
    /// 记录唯一标识，用于标记完成
    #[builder(default = Uuid::new_v4())]
    id: Uuid,
    /// 订阅者 ID
    subscriber_id: String,
    /// 事件类型（`Event::NAME`）
    event_type: String,
    /// 事件负载
    payload: Value,
    /// 创建时间
    #[builder(default = Utc::now())]
    created_at: DateTime<Utc>,
    /// 过期时间，过期后不再投递
    expire_on: DateTime<Utc>,
    /// 是否已投递完成
    #[builder(default)]
    is_complete: bool,
}

impl EventRecord {
    /// 为某个订阅者创建事件记录
    pub fn for_subscriber<E>(
        subscriber_id: impl Into<String>,
        event: &E,
        expire_on: DateTime<Utc>,
    ) -> DomainResult<Self>
    where
        E: Event + Serialize,
    {
        Ok(Self::builder()
            .subscriber_id(subscriber_id.into())
            .event_type(E::NAME.to_string())
            .payload(serde_json::to_value(event)?)
            .expire_on(expire_on)
            .build())
    }

    /// 还原事件载荷，事件类型不一致时报错
    pub fn to_event<E>(&self) -> DomainResult<E>
    where
        E: Event + DeserializeOwned,
    {
        if self.event_type != E::NAME {
            return Err(DomainError::TypeMismatch {
                expected: E::NAME.to_string(),
                found: self.event_type.clone(),
            });
        }
        Ok(serde_json::from_value(self.payload.clone())?)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn subscriber_id(&self) -> &str {
        &self.subscriber_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn expire_on(&self) -> DateTime<Utc> {
        self.expire_on
    }

    pub fn is_complete(&self) -> bool {
        self.is_complete
    }

    pub fn mark_complete(&mut self) {
        self.is_complete = true;
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expire_on
    }

    /// 已完成或已过期即为陈旧记录
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.is_complete || self.is_expired(now)
    }
}

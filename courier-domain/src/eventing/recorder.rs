//! 测试事件记录器（EventRecorder）
//!
//! 挂载到事件总线后，每个被发布的事件都会被额外记录一份，
//! 与处理器分发相互独立，便于测试中断言“发布了什么”。
//!
use crate::event::Event;
use chrono::{DateTime, Utc};
use std::any::Any;
use std::sync::{Arc, Mutex, PoisonError};

struct RecordedEvent {
    name: &'static str,
    recorded_at: DateTime<Utc>,
    payload: Arc<dyn Any + Send + Sync>,
}

#[derive(Default)]
pub struct EventRecorder {
    events: Mutex<Vec<RecordedEvent>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record<E: Event>(&self, event: &E) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedEvent {
                name: E::NAME,
                recorded_at: Utc::now(),
                payload: Arc::new(event.clone()),
            });
    }

    /// 按发布顺序返回某一类型的已记录事件
    pub fn events<E: Event>(&self) -> Vec<E> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(|r| r.payload.downcast_ref::<E>().cloned())
            .collect()
    }

    /// 已记录事件的名称与时间
    pub fn entries(&self) -> Vec<(&'static str, DateTime<Utc>)> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|r| (r.name, r.recorded_at))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

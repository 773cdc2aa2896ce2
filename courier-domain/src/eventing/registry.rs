//! 事件处理器注册表（EventHandlerRegistry）
//!
//! 启动期一次性填充、运行期只读的并发映射：
//! - 键：事件类型的 `TypeId`；
//! - 值：该事件类型下的处理器列表，以处理器类型的 `TypeId` 去重。
//!
//! 同一事件类型下重复注册同一处理器类型时保留首个实例，`register` 返回 `false`。
//!
use crate::event::Event;
use crate::eventing::EventHandler;
use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::sync::Arc;

struct HandlerList<E: Event> {
    entries: Vec<(TypeId, Arc<dyn EventHandler<E>>)>,
}

impl<E: Event> Default for HandlerList<E> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

#[derive(Default)]
pub struct EventHandlerRegistry {
    by_event: DashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl EventHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册事件处理器；同一处理器类型已存在时忽略并返回 `false`
    pub fn register<E, H>(&self, handler: Arc<H>) -> bool
    where
        E: Event,
        H: EventHandler<E> + 'static,
    {
        let handler_type = TypeId::of::<H>();
        let mut slot = self
            .by_event
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::new(HandlerList::<E>::default()));

        // 键与值同属泛型 E，downcast 不会失败
        let Some(list) = slot.value_mut().downcast_mut::<HandlerList<E>>() else {
            return false;
        };

        if list.entries.iter().any(|(id, _)| *id == handler_type) {
            tracing::debug!(
                event = E::NAME,
                handler = std::any::type_name::<H>(),
                "event handler already registered, keeping the first instance"
            );
            return false;
        }

        list.entries.push((handler_type, handler));
        true
    }

    /// 获取某事件类型的全部处理器（按注册顺序）
    pub fn handlers<E: Event>(&self) -> Vec<Arc<dyn EventHandler<E>>> {
        self.by_event
            .get(&TypeId::of::<E>())
            .and_then(|slot| {
                slot.value().downcast_ref::<HandlerList<E>>().map(|list| {
                    list.entries
                        .iter()
                        .map(|(_, h)| h.clone())
                        .collect::<Vec<_>>()
                })
            })
            .unwrap_or_default()
    }

    pub fn handler_count<E: Event>(&self) -> usize {
        self.by_event
            .get(&TypeId::of::<E>())
            .and_then(|slot| {
                slot.value()
                    .downcast_ref::<HandlerList<E>>()
                    .map(|list| list.entries.len())
            })
            .unwrap_or(0)
    }
}

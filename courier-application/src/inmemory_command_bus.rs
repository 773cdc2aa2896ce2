use crate::{
    command::Command, command_bus::CommandBus, command_handler::CommandHandler,
    context::AppContext, error::AppError,
};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::any::{Any, TypeId};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

type CmdOutput = Box<dyn Any + Send>;

type CmdHandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<CmdOutput, AppError>> + Send + 'a>>;

type CmdHandlerFn =
    Arc<dyn for<'a> Fn(Box<dyn Any + Send>, &'a AppContext) -> CmdHandlerFuture<'a> + Send + Sync>;

/// 基于内存的 CommandBus 实现
/// - 通过 TypeId 注册不同 Command 对应的 Handler，每种命令至多一个
/// - 运行时以类型擦除（Any）方式进行调度
/// - 处理器收到的上下文同时响应调用方取消与应用关闭
#[derive(Default)]
pub struct InMemoryCommandBus {
    handlers: DashMap<TypeId, CmdHandlerFn>,
    shutdown: CancellationToken,
}

impl InMemoryCommandBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// 绑定应用级关闭信号
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// 注册命令处理器；同一命令重复注册返回 `AlreadyRegisteredCommand`
    pub fn register<C, H>(&self, handler: Arc<H>) -> Result<(), AppError>
    where
        C: Command,
        H: CommandHandler<C> + 'static,
    {
        let f: CmdHandlerFn = Arc::new(move |boxed_cmd, ctx| {
            let handler = handler.clone();

            Box::pin(async move {
                // 正常情况下这里的 downcast 永远不会失败（键与闭包同一泛型 C）
                match boxed_cmd.downcast::<C>() {
                    Ok(cmd) => handler
                        .handle(ctx, *cmd)
                        .await
                        .map(|out| Box::new(out) as CmdOutput),
                    Err(_) => Err(AppError::TypeMismatch {
                        expected: C::NAME,
                        found: "unknown",
                    }),
                }
            })
        });

        match self.handlers.entry(TypeId::of::<C>()) {
            Entry::Occupied(_) => Err(AppError::AlreadyRegisteredCommand { command: C::NAME }),
            Entry::Vacant(slot) => {
                slot.insert(f);
                tracing::debug!(command = C::NAME, "command handler registered");
                Ok(())
            }
        }
    }

    pub fn has_handler<C: Command>(&self) -> bool {
        self.handlers.contains_key(&TypeId::of::<C>())
    }
}

#[async_trait]
impl CommandBus for InMemoryCommandBus {
    async fn execute<C: Command>(&self, ctx: &AppContext, cmd: C) -> Result<C::Output, AppError> {
        let Some(f) = self.handlers.get(&TypeId::of::<C>()).map(|h| h.clone()) else {
            return Err(AppError::HandlerNotFound(C::NAME));
        };

        if ctx.is_cancelled() || self.shutdown.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let (ctx, _guard) = ctx.link_cancellation(&self.shutdown);
        let out = (f)(Box::new(cmd), &ctx).await?;
        out.downcast::<C::Output>()
            .map(|out| *out)
            .map_err(|_| AppError::TypeMismatch {
                expected: std::any::type_name::<C::Output>(),
                found: "unknown",
            })
    }
}

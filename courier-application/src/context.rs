use bon::Builder;
use courier_domain::worker::link_tokens;
use tokio_util::sync::{CancellationToken, DropGuard};

/// 应用层上下文（Application Context）
///
/// 承载一次应用层调用（命令/作业）所需的横切信息，例如：
/// - 链路信息：关联追踪 `correlation_id`、因果链 `causation_id`；
/// - 幂等键（`idempotency_key`）：同一作业的每次重试都相同，处理器可据此去重；
/// - 取消信号（`cancellation`）：处理器应在长耗时操作中协作式检查。
///
/// 典型用法：
/// ```rust
/// use courier_application::context::AppContext;
///
/// let ctx = AppContext::builder()
///     .correlation_id("cor-123".to_string())
///     .idempotency_key("idem-xyz".to_string())
///     .build();
/// assert!(!ctx.is_cancelled());
/// ```
#[derive(Clone, Debug, Default, Builder)]
pub struct AppContext {
    /// 关联 ID
    pub correlation_id: Option<String>,
    /// 因果 ID
    pub causation_id: Option<String>,
    /// 幂等键（可选）：为空则由上层或基础设施决定是否参与幂等
    pub idempotency_key: Option<String>,
    /// 请求级取消信号
    #[builder(default)]
    pub cancellation: CancellationToken,
}

impl AppContext {
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// 等待取消信号
    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await
    }

    /// 派生一个同时响应“请求级”与“应用级”取消的上下文
    ///
    /// 返回的守卫在丢弃时取消派生令牌并结束内部的监听任务，
    /// 因此应与派生上下文保持相同的生命周期。需在 tokio 运行时内调用。
    pub fn link_cancellation(&self, app: &CancellationToken) -> (AppContext, DropGuard) {
        let (linked, guard) = link_tokens(&self.cancellation, app);
        let ctx = AppContext {
            cancellation: linked,
            ..self.clone()
        };
        (ctx, guard)
    }
}

/// 应用层命令（Command）
///
/// 表达“意图”的请求，路由到唯一的处理器，可选地返回结果。
/// - 建议保持语义化的“动宾结构”命名，如 `SendEmail`、`CloseOrder`。
/// - 进入作业队列的命令还需可序列化（`#[command]` 宏会自动追加 serde 派生）。
///
/// 关联项：
/// - `NAME`：命令的稳定名称，用于日志、路由与作业队列 ID。避免依赖 `type_name::<T>()`。
/// - `Output`：处理器返回值类型，无返回值时为 `()`。
pub trait Command: Send + Sync + 'static {
    /// 命令的稳定名称（建议常量字符串，不随重构变化）
    const NAME: &'static str;

    type Output: Send + 'static;
}

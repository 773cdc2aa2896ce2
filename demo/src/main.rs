use async_trait::async_trait;
use courier_application::InMemoryCommandBus;
use courier_application::command_handler::CommandHandler;
use courier_application::context::AppContext;
use courier_application::error::AppError;
use courier_application::jobs::{InMemoryJobStorage, JobOptions, JobQueue, JobQueueConfig};
use courier_domain::eventing::{
    EventBus, EventHandler, EventHandlerRegistry, EventRecorder, InMemoryEventBus, WaitMode,
};
use courier_domain::hub::{EventHub, EventHubConfig, InMemoryEventStorage, StaleSweeper};
use courier_macros::{command, event};
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[event(name = "order.placed")]
struct OrderPlaced {
    order_id: u64,
    total_cents: i64,
}

#[command(name = "receipt.render", output = String)]
struct RenderReceipt {
    order_id: u64,
    total_cents: i64,
}

struct AuditLog;

#[async_trait]
impl EventHandler<OrderPlaced> for AuditLog {
    fn handler_name(&self) -> &str {
        "audit-log"
    }

    async fn handle(&self, event: &OrderPlaced, _cancel: &CancellationToken) -> anyhow::Result<()> {
        info!(order_id = event.order_id, total_cents = event.total_cents, "audit: order placed");
        Ok(())
    }
}

struct ReceiptRenderer;

#[async_trait]
impl CommandHandler<RenderReceipt> for ReceiptRenderer {
    async fn handle(&self, ctx: &AppContext, cmd: RenderReceipt) -> Result<String, AppError> {
        if ctx.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(format!(
            "receipt #{}: {}.{:02}",
            cmd.order_id,
            cmd.total_cents / 100,
            cmd.total_cents % 100
        ))
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let shutdown = CancellationToken::new();

    // 事件中枢：内存存储 + 周期清理
    let event_storage = Arc::new(InMemoryEventStorage::new());
    let hub = Arc::new(
        EventHub::<OrderPlaced>::new(event_storage.clone())
            .with_config(EventHubConfig {
                poll_interval: Duration::from_millis(200),
                ..Default::default()
            })
            .with_shutdown(shutdown.clone()),
    );
    let sweeper = StaleSweeper::new(event_storage).start(&shutdown);
    let stale_eviction = hub.start_stale_eviction(Duration::from_secs(15 * 60));

    let (subscription, mut stream) = hub.subscribe_stream("billing-service", 16);
    let remote = tokio::spawn(async move {
        while let Some(event) = stream.next().await {
            info!(order_id = event.order_id, "remote subscriber received order");
        }
    });

    // 进程内总线：审计处理器 + 中枢（本地发布即远程广播）
    let registry = Arc::new(EventHandlerRegistry::new());
    registry.register::<OrderPlaced, _>(Arc::new(AuditLog));
    registry.register::<OrderPlaced, _>(hub.clone());
    let recorder = Arc::new(EventRecorder::new());
    let bus = InMemoryEventBus::new(registry)
        .with_recorder(recorder.clone())
        .with_shutdown(shutdown.clone());

    // 作业队列：命令经命令总线执行
    let commands = Arc::new(InMemoryCommandBus::new().with_shutdown(shutdown.clone()));
    commands.register::<RenderReceipt, _>(Arc::new(ReceiptRenderer))?;
    let jobs = JobQueue::new(commands, Arc::new(InMemoryJobStorage::new()))
        .with_config(JobQueueConfig {
            poll_interval: Duration::from_millis(200),
            execution_time_limit: Some(Duration::from_secs(5)),
            ..Default::default()
        })
        .with_shutdown(shutdown.clone());
    jobs.register::<RenderReceipt>()?;
    let jobs = Arc::new(jobs);
    let workers = jobs.start();

    let run = async {
        let mut tracking = Vec::new();
        for order_id in 1..=3 {
            let order = OrderPlaced {
                order_id,
                total_cents: 1999 * order_id as i64,
            };
            bus.publish(order.clone(), WaitMode::WaitForAll, &shutdown)
                .await?;
            let id = jobs
                .queue_job(
                    &RenderReceipt {
                        order_id,
                        total_cents: order.total_cents,
                    },
                    JobOptions::default(),
                )
                .await?;
            tracking.push(id);
        }

        for id in tracking {
            loop {
                if let Some(receipt) = jobs.job_result::<RenderReceipt>(id).await? {
                    info!(tracking_id = %id, receipt, "receipt ready");
                    break;
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        }
        info!(published = recorder.len(), "demo finished");
        anyhow::Ok(())
    };

    tokio::select! {
        result = run => result?,
        _ = tokio::signal::ctrl_c() => info!("interrupted"),
    }

    shutdown.cancel();
    workers.join().await;
    subscription.join().await;
    sweeper.join().await;
    stale_eviction.join().await;
    let _ = remote.await;
    Ok(())
}

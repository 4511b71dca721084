//! Single-consumer work queue (C10, spec §4.10): the only thing that drives
//! decomposition, execution, and reevaluation forward. Not durable across a
//! process restart - an in-flight item is lost if the process dies.

use chrono::Utc;
use gateway_shared::event::Event;
use gateway_shared::model::TaskStatus;
use gateway_shared::work_item::{WorkItem, WorkItemKind};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::context::OrchestrationContext;
use crate::{decomposer, executor, reevaluator};

const QUEUE_BUFFER_SIZE: usize = 1024;

/// Handle to the running consumer loop. Enqueuing is cheap and non-blocking
/// up to `QUEUE_BUFFER_SIZE`; beyond that `enqueue` backpressures the caller.
#[derive(Clone)]
pub struct WorkQueue {
    tx: mpsc::Sender<WorkItem>,
    shutdown: mpsc::Sender<oneshot::Sender<()>>,
}

impl WorkQueue {
    /// Spawns the consumer loop and returns a queue handle plus its
    /// `JoinHandle`, so callers can await a clean shutdown.
    pub fn start(ctx: OrchestrationContext) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(QUEUE_BUFFER_SIZE);
        let (shutdown, shutdown_rx) = mpsc::channel(1);
        let handle = tokio::spawn(consumer_loop(ctx, rx, tx.clone(), shutdown_rx));
        (Self { tx, shutdown }, handle)
    }

    pub async fn enqueue(&self, item: WorkItem) {
        if self.tx.send(item).await.is_err() {
            error!("work queue consumer loop has shut down; dropping enqueued item");
        }
    }

    pub async fn enqueue_many(&self, items: impl IntoIterator<Item = WorkItem>) {
        for item in items {
            self.enqueue(item).await;
        }
    }

    /// Asks the consumer loop to stop after its current item finishes, and
    /// waits for it to acknowledge. Already-enqueued items beyond the
    /// current one are left in the channel, unprocessed.
    pub async fn stop(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.shutdown.send(ack_tx).await.is_ok() {
            let _ = ack_rx.await;
        }
    }
}

async fn consumer_loop(
    ctx: OrchestrationContext,
    mut rx: mpsc::Receiver<WorkItem>,
    self_tx: mpsc::Sender<WorkItem>,
    mut shutdown_rx: mpsc::Receiver<oneshot::Sender<()>>,
) {
    info!("work queue consumer loop started");
    loop {
        tokio::select! {
            item = rx.recv() => {
                let Some(item) = item else {
                    info!("work queue consumer loop stopped: channel closed");
                    break;
                };
                let follow_ups = run_item(&ctx, &item).await;
                for follow_up in follow_ups {
                    if self_tx.send(follow_up).await.is_err() {
                        warn!("failed to re-enqueue follow-up work item: queue closed");
                    }
                }
            }
            ack = shutdown_rx.recv() => {
                info!("work queue consumer loop stopped: shutdown requested");
                if let Some(ack) = ack {
                    let _ = ack.send(());
                }
                break;
            }
        }
    }
}

/// Runs one work item to completion, catching any error that escapes the
/// three handlers so a single bad task can never take down the consumer
/// loop. On error, the owning task is marked `failed` and `task.failed` is
/// emitted - the same terminal handling the step executor performs for the
/// narrower class of errors it catches itself.
async fn run_item(ctx: &OrchestrationContext, item: &WorkItem) -> Vec<WorkItem> {
    let result = match item.kind {
        WorkItemKind::Decompose => {
            decomposer::decompose_and_queue(ctx, item.task_id, item.user_id, &item.api_key).await
        }
        WorkItemKind::Execute => {
            let Some(step_id) = item.step_id else {
                error!(task_id = %item.task_id, "execute work item missing step_id");
                return Vec::new();
            };
            executor::execute_step(ctx, item.task_id, item.user_id, &item.api_key, step_id).await
        }
        WorkItemKind::Reevaluate => {
            let Some(step_id) = item.step_id else {
                error!(task_id = %item.task_id, "reevaluate work item missing step_id");
                return Vec::new();
            };
            reevaluator::reevaluate(ctx, item.task_id, item.user_id, &item.api_key, step_id).await
        }
    };

    match result {
        Ok(follow_ups) => follow_ups,
        Err(e) => {
            error!(task_id = %item.task_id, kind = ?item.kind, error = %e, "work item failed");
            let now = Utc::now();
            if let Err(update_err) = ctx.store.update_task_final(item.task_id, TaskStatus::Failed, now, None).await {
                error!(task_id = %item.task_id, error = %update_err, "failed to mark task failed after work item error");
            }
            ctx.events.publish(
                item.user_id,
                Event::new(
                    "task.failed",
                    serde_json::json!({"task_id": item.task_id, "reason": e.to_string()}),
                )
                .with_metadata("task_id", item.task_id.to_string()),
            );
            Vec::new()
        }
    }
}

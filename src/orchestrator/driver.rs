//! Background execution of one run
//!
//! The driver fans tasks out to workers bounded by a semaphore. Each worker
//! publishes the task's started event, runs it on its own tokio task so a
//! panic surfaces as a `JoinError` instead of killing the worker, and hands
//! the record to the registry.

use super::registry::Registry;
use crate::executor::TaskRunner;
use crate::report::write_run_summary;
use crate::types::RunId;
use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Run-independent settings the driver needs
#[derive(Clone, Debug)]
pub(crate) struct DriveSettings {
    pub max_concurrency: usize,
    pub write_summary: bool,
    pub logs_dir: PathBuf,
}

pub(crate) async fn drive<R: TaskRunner>(
    registry: Arc<Registry>,
    runner: Arc<R>,
    run_id: RunId,
    tasks: Vec<R::Task>,
    settings: DriveSettings,
) {
    let total = tasks.len();
    tracing::info!(run_id = %run_id, tasks = total, workers = settings.max_concurrency, "run started");

    let semaphore = Arc::new(Semaphore::new(settings.max_concurrency.max(1)));
    let mut workers = JoinSet::new();

    for task in tasks {
        // The semaphore is never closed, so acquisition cannot fail
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            break;
        };

        let registry = registry.clone();
        let runner = runner.clone();
        let run_id = run_id.clone();

        workers.spawn(async move {
            let _permit = permit;
            registry.publish(&run_id, runner.started_event(&task));

            let inner = runner.clone();
            let inner_task = task.clone();
            let record = match tokio::spawn(async move { inner.run(inner_task).await }).await {
                Ok(record) => record,
                Err(e) => {
                    let reason = if e.is_panic() {
                        panic_message(e.into_panic())
                    } else {
                        "cancelled".to_string()
                    };
                    tracing::error!(run_id = %run_id, error = %reason, "worker failed");
                    runner.failed(&task, &format!("worker failed: {reason}"))
                }
            };

            if let Some(progress) = registry.complete_task(&run_id, record) {
                tracing::debug!(run_id = %run_id, done = progress.done, total = progress.total, "task finished");
            }
        });
    }

    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            tracing::error!(run_id = %run_id, error = %e, "worker task aborted");
        }
    }

    let summary = if settings.write_summary {
        let records = registry.records(&run_id).unwrap_or_default();
        match write_run_summary(&settings.logs_dir, &records).await {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::error!(run_id = %run_id, error = %e, "failed to write run summary");
                None
            }
        }
    } else {
        None
    };

    match registry.finish(&run_id, summary) {
        Some(totals) => tracing::info!(
            run_id = %run_id,
            ok = totals.ok,
            err = totals.err,
            time_ms = totals.time_ms,
            "run finished"
        ),
        None => tracing::error!(run_id = %run_id, "run vanished from registry before finishing"),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic".to_string()
    }
}

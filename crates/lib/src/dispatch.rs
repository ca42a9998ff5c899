//! Bounded work queue between the webhook acknowledgment and the reply pipeline.
//!
//! The webhook enqueues and returns; a worker task drains the queue and runs each event's
//! pipeline in its own task, at most `max_concurrent` at a time. Outcomes are logged here
//! since nobody upstream is waiting for them.

use crate::config::DispatchConfig;
use crate::messenger::InboundEvent;
use crate::pipeline::{Outcome, ReplyPipeline};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("dispatch queue full")]
    Full,
    #[error("dispatch queue closed")]
    Closed,
}

/// Producer side of the queue. Cheap to clone; the queue closes when every clone is dropped.
#[derive(Clone)]
pub struct Dispatcher {
    tx: mpsc::Sender<InboundEvent>,
}

impl Dispatcher {
    /// Spawn the worker and return the producer plus the worker handle (await it on shutdown).
    pub fn start(pipeline: Arc<ReplyPipeline>, config: &DispatchConfig) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let max_concurrent = config.max_concurrent.max(1);
        log::info!(
            "dispatch: queue capacity {}, up to {} concurrent pipeline(s)",
            config.queue_capacity.max(1),
            max_concurrent
        );
        let handle = tokio::spawn(run_worker(pipeline, rx, max_concurrent));
        (Self { tx }, handle)
    }

    /// Enqueue without waiting; a full queue is reported rather than stalling the webhook.
    pub fn dispatch(&self, event: InboundEvent) -> Result<(), DispatchError> {
        self.tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DispatchError::Full,
            mpsc::error::TrySendError::Closed(_) => DispatchError::Closed,
        })
    }
}

async fn run_worker(
    pipeline: Arc<ReplyPipeline>,
    mut rx: mpsc::Receiver<InboundEvent>,
    max_concurrent: usize,
) {
    let permits = Arc::new(Semaphore::new(max_concurrent));
    let mut tasks = JoinSet::new();
    while let Some(event) = rx.recv().await {
        let Ok(permit) = permits.clone().acquire_owned().await else {
            break;
        };
        let pipeline = pipeline.clone();
        let event_id = uuid::Uuid::new_v4();
        log::debug!(
            "dispatch: event {} from {} to {} started",
            event_id,
            event.sender_id,
            event.recipient_id
        );
        tasks.spawn(async move {
            let outcome = pipeline.run(event).await;
            drop(permit);
            (event_id, outcome)
        });
        while let Some(res) = tasks.try_join_next() {
            log_finished(res);
        }
    }
    log::debug!("dispatch: queue closed, waiting for {} pipeline(s)", tasks.len());
    while let Some(res) = tasks.join_next().await {
        log_finished(res);
    }
    log::info!("dispatch: worker stopped");
}

fn log_finished(res: Result<(uuid::Uuid, Outcome), tokio::task::JoinError>) {
    match res {
        Ok((id, Outcome::Skipped)) => log::debug!("dispatch: event {} skipped", id),
        Ok((id, Outcome::Answered { tenant_id })) => {
            log::debug!("dispatch: event {} answered for {}", id, tenant_id)
        }
        Ok((id, Outcome::FellBack(e))) => {
            log::info!("dispatch: event {} got a fallback reply ({})", id, e)
        }
        Ok((id, Outcome::Undelivered(e))) => log::warn!("dispatch: event {}: {}", id, e),
        Err(e) => log::error!("dispatch: pipeline task failed: {}", e),
    }
}

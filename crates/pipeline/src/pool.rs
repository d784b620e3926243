//! Bounded worker pool for concurrent unit processing.
//!
//! A fixed number of worker tasks pull [`UnitTask`]s off a bounded
//! queue; `submit` applies backpressure when the queue is full. On
//! shutdown the sender side is closed and workers drain what is already
//! queued before exiting.

use std::sync::Arc;

use batchpix_core::types::{DbId, JobId};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::aggregator::Notifier;
use crate::dispatcher::DispatchError;
use crate::store::BatchStore;
use crate::transform::ImageTransformer;
use crate::worker;

/// One dispatched unit of work.
#[derive(Debug, Clone, Copy)]
pub struct UnitTask {
    pub unit_id: DbId,
    pub job_id: JobId,
}

/// Handle to a running pool of unit workers. Shared behind an `Arc`;
/// `shutdown` closes the queue for every holder.
pub struct WorkerPool {
    tx: Mutex<Option<mpsc::Sender<UnitTask>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawn `workers` worker tasks sharing one bounded queue.
    pub fn start(
        store: Arc<dyn BatchStore>,
        transformer: Arc<dyn ImageTransformer>,
        notifier: Arc<Notifier>,
        workers: usize,
    ) -> Self {
        let workers = workers.max(1);
        let (tx, rx) = mpsc::channel::<UnitTask>(workers * 2);
        let rx = Arc::new(Mutex::new(rx));

        let handles = (0..workers)
            .map(|worker_id| {
                let rx = rx.clone();
                let store = store.clone();
                let transformer = transformer.clone();
                let notifier = notifier.clone();
                tokio::spawn(async move {
                    tracing::debug!(worker_id, "Unit worker started");
                    loop {
                        // Hold the lock only for the receive so workers
                        // process concurrently.
                        let task = rx.lock().await.recv().await;
                        match task {
                            Some(task) => {
                                worker::process_unit(
                                    store.clone(),
                                    transformer.clone(),
                                    notifier.clone(),
                                    task,
                                )
                                .await;
                            }
                            None => break,
                        }
                    }
                    tracing::debug!(worker_id, "Unit worker stopped");
                })
            })
            .collect();

        Self {
            tx: Mutex::new(Some(tx)),
            handles: Mutex::new(handles),
        }
    }

    /// Queue a unit for processing, waiting when the queue is full.
    /// Fails once the pool has been shut down.
    pub async fn submit(&self, task: UnitTask) -> Result<(), DispatchError> {
        let tx = self.tx.lock().await.clone();
        match tx {
            Some(tx) => tx.send(task).await.map_err(|_| DispatchError::QueueClosed),
            None => Err(DispatchError::QueueClosed),
        }
    }

    /// Close the queue and wait for workers to drain it.
    pub async fn shutdown(&self) {
        self.tx.lock().await.take();
        let handles = std::mem::take(&mut *self.handles.lock().await);
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Unit worker panicked");
            }
        }
    }
}

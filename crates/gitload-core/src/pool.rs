use std::sync::Arc;

use gitload_backend::{GitDataApi, Oid};
use gitload_common::Result;
use tokio::sync::{mpsc, Semaphore};
use tracing::debug;

/// Builds the blob content for a unit index.
pub type PayloadFn = Arc<dyn Fn(usize) -> String + Send + Sync>;

#[derive(Debug)]
pub struct CreateOutcome {
    pub index: usize,
    pub result: Result<Oid>,
}

/// Fans out create-blob requests with at most `max_in_flight` outstanding.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    max_in_flight: usize,
}

impl WorkerPool {
    pub fn new(max_in_flight: usize) -> Self {
        Self { max_in_flight: max_in_flight.max(1) }
    }

    pub fn max_in_flight(&self) -> usize { self.max_in_flight }

    /// Spawns `count` units and returns their outcomes in completion order.
    /// The receiver yields `None` once every unit has finished.
    pub fn spawn_creates(
        &self,
        api: Arc<dyn GitDataApi>,
        count: usize,
        payload: PayloadFn,
    ) -> mpsc::Receiver<CreateOutcome> {
        let (tx, rx) = mpsc::channel::<CreateOutcome>(self.max_in_flight);
        let permits = Arc::new(Semaphore::new(self.max_in_flight));
        tokio::spawn(async move {
            for index in 0..count {
                let Ok(permit) = permits.clone().acquire_owned().await else { break };
                let api = api.clone();
                let tx = tx.clone();
                let content = payload(index);
                tokio::spawn(async move {
                    let result = api.create_blob(&content).await;
                    debug!(index, ok = result.is_ok(), "create finished");
                    let _ = tx.send(CreateOutcome { index, result }).await;
                    // held until delivered so a slow consumer throttles the spawner
                    drop(permit);
                });
            }
        });
        rx
    }
}

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use gitload_backend::GitDataApi;
use gitload_common::config::PublisherConfig;
use gitload_common::GitloadError;
use tracing::{info, warn};

use crate::batch::BatchAssembler;
use crate::payload::{blob_content, commit_message};
use crate::pipeline::{publish_batch, BatchOutcome};
use crate::pool::{PayloadFn, WorkerPool};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishSettings {
    pub object_count: usize,
    pub batch_size: usize,
    pub max_in_flight: usize,
    pub commit_message: String,
}

impl From<&PublisherConfig> for PublishSettings {
    fn from(cfg: &PublisherConfig) -> Self {
        Self {
            object_count: cfg.object_count,
            batch_size: cfg.batch_size,
            max_in_flight: cfg.max_in_flight,
            commit_message: cfg.commit_message.clone(),
        }
    }
}

/// Counts and per-unit results of one run.
#[derive(Debug, Default)]
pub struct Summary {
    pub requested: usize,
    pub objects_created: usize,
    pub failures: Vec<(usize, GitloadError)>,
    pub batches: Vec<BatchOutcome>,
}

impl Summary {
    pub fn trees_created(&self) -> usize { self.batches.iter().filter(|b| b.tree_created()).count() }
    pub fn commits_created(&self) -> usize { self.batches.iter().filter(|b| b.committed()).count() }
    pub fn batch_sizes(&self) -> Vec<usize> { self.batches.iter().map(|b| b.size).collect() }

    /// Abandoned blobs, trees and commits.
    pub fn failed_units(&self) -> usize {
        let tree_failures = self.batches.iter().filter(|b| !b.tree_created()).count();
        let commit_failures = self.batches.iter().filter(|b| matches!(b.commit, Some(Err(_)))).count();
        self.failures.len() + tree_failures + commit_failures
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "created {} objects, {} trees, {} commits ({} failed)",
            self.objects_created,
            self.trees_created(),
            self.commits_created(),
            self.failed_units()
        )
    }
}

/// Creates blobs concurrently and publishes them as trees and commits.
///
/// Blob creation runs through a [`WorkerPool`]; a single consumer assembles
/// batches in arrival order and runs each batch's tree/commit pipeline before
/// reading further outcomes. Failed units are logged and dropped; they only
/// show up in the [`Summary`].
pub struct Publisher {
    api: Arc<dyn GitDataApi>,
    settings: PublishSettings,
}

impl Publisher {
    pub fn new(api: Arc<dyn GitDataApi>, settings: PublishSettings) -> Self {
        Self { api, settings }
    }

    pub async fn run(&self) -> Summary {
        self.run_at(Utc::now()).await
    }

    /// Same as [`Publisher::run`] with a fixed timestamp for blob contents.
    pub async fn run_at(&self, started_at: DateTime<Utc>) -> Summary {
        let settings = &self.settings;
        let payload: PayloadFn = Arc::new(move |index| blob_content(index, &started_at));
        let pool = WorkerPool::new(settings.max_in_flight);
        info!(
            objects = settings.object_count,
            batch_size = settings.batch_size,
            max_in_flight = pool.max_in_flight(),
            "publishing"
        );

        let mut outcomes = pool.spawn_creates(self.api.clone(), settings.object_count, payload);
        let mut assembler = BatchAssembler::new(settings.batch_size);
        let mut summary = Summary { requested: settings.object_count, ..Default::default() };

        while let Some(outcome) = outcomes.recv().await {
            match outcome.result {
                Ok(oid) => {
                    summary.objects_created += 1;
                    gitload_obs::object_created();
                    if let Some(batch) = assembler.push(oid) {
                        let message = commit_message(&settings.commit_message, batch.index);
                        summary.batches.push(publish_batch(self.api.as_ref(), &batch, &message).await);
                    }
                }
                Err(error) => {
                    warn!(index = outcome.index, kind = error.kind(), %error, "object creation failed");
                    gitload_obs::failure("blob", error.kind());
                    summary.failures.push((outcome.index, error));
                }
            }
        }

        if let Some(batch) = assembler.finish() {
            let message = commit_message(&settings.commit_message, batch.index);
            summary.batches.push(publish_batch(self.api.as_ref(), &batch, &message).await);
        }

        info!(
            objects = summary.objects_created,
            trees = summary.trees_created(),
            commits = summary.commits_created(),
            failed = summary.failed_units(),
            "publishing finished"
        );
        summary
    }
}

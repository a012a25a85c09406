use gitload_backend::{CommitRecord, GitDataApi, Oid};
use gitload_common::Result;
use tracing::{debug, warn};

use crate::batch::Batch;
use crate::payload::tree_entries;

/// What happened to one sealed batch. `commit` is `None` when the tree failed.
#[derive(Debug)]
pub struct BatchOutcome {
    pub index: usize,
    pub size: usize,
    pub tree: Result<Oid>,
    pub commit: Option<Result<CommitRecord>>,
}

impl BatchOutcome {
    pub fn tree_created(&self) -> bool { self.tree.is_ok() }
    pub fn committed(&self) -> bool { matches!(self.commit, Some(Ok(_))) }
}

/// Creates the tree for `batch`, then a commit pointing at it.
pub async fn publish_batch(api: &dyn GitDataApi, batch: &Batch, message: &str) -> BatchOutcome {
    let entries = tree_entries(&batch.oids);
    let tree = api.create_tree(&entries).await;
    let commit = match &tree {
        Ok(tree_oid) => {
            debug!(batch = batch.index, tree = %tree_oid, "tree created");
            gitload_obs::tree_created();
            let commit = api.create_commit(message, tree_oid).await;
            match &commit {
                Ok(record) => {
                    debug!(batch = batch.index, commit = %record.sha, "commit created");
                    gitload_obs::commit_created();
                }
                Err(error) => {
                    warn!(batch = batch.index, kind = error.kind(), %error, "commit creation failed");
                    gitload_obs::failure("commit", error.kind());
                }
            }
            Some(commit)
        }
        Err(error) => {
            warn!(batch = batch.index, size = batch.len(), kind = error.kind(), %error, "tree creation failed");
            gitload_obs::failure("tree", error.kind());
            None
        }
    };
    BatchOutcome { index: batch.index, size: batch.len(), tree, commit }
}

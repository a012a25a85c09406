//! Request bodies derived from indices and the run's start time.

use chrono::{DateTime, Utc};
use gitload_backend::{Oid, TreeEntry};

pub fn blob_content(index: usize, started_at: &DateTime<Utc>) -> String {
    format!("{} {}\n", index, started_at.to_rfc3339())
}

/// `file-<i>.txt` entries in batch member order.
pub fn tree_entries(oids: &[Oid]) -> Vec<TreeEntry> {
    oids.iter()
        .enumerate()
        .map(|(i, oid)| TreeEntry::blob(format!("file-{}.txt", i), oid.clone()))
        .collect()
}

pub fn commit_message(prefix: &str, batch_index: usize) -> String {
    format!("{} batch {}", prefix, batch_index)
}

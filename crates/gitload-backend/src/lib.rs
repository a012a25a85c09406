//! Git Data API abstraction: wire types plus the `GitDataApi` trait.

use std::fmt;

use gitload_common::Result;
use serde::{Deserialize, Serialize};

pub const BLOB_MODE: &str = "100644";

/// Identifier issued by the remote service for a created object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Oid(String);

impl Oid {
    pub fn new(value: impl Into<String>) -> Self { Self(value.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// One row of a create-tree request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    pub mode: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub sha: Oid,
}

impl TreeEntry {
    pub fn blob(path: impl Into<String>, sha: Oid) -> Self {
        Self { path: path.into(), mode: BLOB_MODE.into(), kind: "blob".into(), sha }
    }
}

/// Result of a create-commit request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub sha: Oid,
    pub url: String,
}

#[async_trait::async_trait]
pub trait GitDataApi: Send + Sync {
    async fn create_blob(&self, content: &str) -> Result<Oid>;
    async fn create_tree(&self, entries: &[TreeEntry]) -> Result<Oid>;
    async fn create_commit(&self, message: &str, tree: &Oid) -> Result<CommitRecord>;
}

#[cfg(feature = "mock")]
pub mod mock {
    use super::*;
    use gitload_common::GitloadError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    type BlobFailure = Box<dyn Fn(&str) -> bool + Send + Sync>;

    /// In-memory `GitDataApi` that records every call.
    #[derive(Default)]
    pub struct MockApi {
        next_id: AtomicUsize,
        in_flight: AtomicUsize,
        peak_in_flight: AtomicUsize,
        latency: Option<Duration>,
        blob_failure: Option<BlobFailure>,
        fail_trees: bool,
        fail_commits: bool,
        blob_calls: AtomicUsize,
        blobs: Mutex<Vec<(String, Oid)>>,
        trees: Mutex<Vec<(Oid, Vec<TreeEntry>)>>,
        commits: Mutex<Vec<(String, Oid, CommitRecord)>>,
    }

    impl MockApi {
        pub fn new() -> Self { Self::default() }

        pub fn with_latency(mut self, latency: Duration) -> Self {
            self.latency = Some(latency);
            self
        }

        /// Blob requests whose content matches `pred` answer with a 500.
        pub fn fail_blobs_where<F>(mut self, pred: F) -> Self
        where
            F: Fn(&str) -> bool + Send + Sync + 'static,
        {
            self.blob_failure = Some(Box::new(pred));
            self
        }

        pub fn fail_trees(mut self) -> Self {
            self.fail_trees = true;
            self
        }

        pub fn fail_commits(mut self) -> Self {
            self.fail_commits = true;
            self
        }

        pub fn blob_calls(&self) -> usize { self.blob_calls.load(Ordering::SeqCst) }
        pub fn peak_in_flight(&self) -> usize { self.peak_in_flight.load(Ordering::SeqCst) }
        pub fn blobs(&self) -> Vec<(String, Oid)> { self.blobs.lock().unwrap().clone() }
        pub fn trees(&self) -> Vec<(Oid, Vec<TreeEntry>)> { self.trees.lock().unwrap().clone() }
        pub fn commits(&self) -> Vec<(String, Oid, CommitRecord)> { self.commits.lock().unwrap().clone() }

        fn mint(&self) -> Oid {
            let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            Oid::new(format!("{:040x}", n))
        }

        async fn simulate_io(&self) {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
            match self.latency {
                Some(d) => tokio::time::sleep(d).await,
                None => tokio::task::yield_now().await,
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }

        fn injected(endpoint: &str) -> GitloadError {
            GitloadError::Status {
                url: format!("mock://{}", endpoint),
                status: "500 Internal Server Error".into(),
                body: "injected failure".into(),
            }
        }
    }

    #[async_trait::async_trait]
    impl GitDataApi for MockApi {
        async fn create_blob(&self, content: &str) -> Result<Oid> {
            self.blob_calls.fetch_add(1, Ordering::SeqCst);
            self.simulate_io().await;
            if self.blob_failure.as_ref().is_some_and(|fail| fail(content)) {
                return Err(Self::injected("blobs"));
            }
            let oid = self.mint();
            self.blobs.lock().unwrap().push((content.to_string(), oid.clone()));
            Ok(oid)
        }

        async fn create_tree(&self, entries: &[TreeEntry]) -> Result<Oid> {
            self.simulate_io().await;
            if self.fail_trees {
                return Err(Self::injected("trees"));
            }
            let oid = self.mint();
            self.trees.lock().unwrap().push((oid.clone(), entries.to_vec()));
            Ok(oid)
        }

        async fn create_commit(&self, message: &str, tree: &Oid) -> Result<CommitRecord> {
            self.simulate_io().await;
            if self.fail_commits {
                return Err(Self::injected("commits"));
            }
            let sha = self.mint();
            let record = CommitRecord { url: format!("mock://commits/{}", sha), sha };
            self.commits.lock().unwrap().push((message.to_string(), tree.clone(), record.clone()));
            Ok(record)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_entry_serializes_with_type_field() {
        let entry = TreeEntry::blob("file-0.txt", Oid::new("abc"));
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"path": "file-0.txt", "mode": "100644", "type": "blob", "sha": "abc"})
        );
    }

    #[test]
    fn commit_record_reads_sha_and_url() {
        let record: CommitRecord =
            serde_json::from_str(r#"{"sha":"c0ffee","url":"https://x/commits/c0ffee","extra":1}"#).unwrap();
        assert_eq!(record.sha.as_str(), "c0ffee");
        assert_eq!(record.url, "https://x/commits/c0ffee");
    }

    #[cfg(feature = "mock")]
    #[tokio::test]
    async fn mock_records_calls_and_injects_failures() {
        let api = mock::MockApi::new().fail_blobs_where(|c| c.starts_with("bad"));
        let ok = api.create_blob("good").await.unwrap();
        assert!(api.create_blob("bad one").await.is_err());
        assert_eq!(api.blob_calls(), 2);
        assert_eq!(api.blobs().len(), 1);

        let tree = api.create_tree(&[TreeEntry::blob("file-0.txt", ok)]).await.unwrap();
        let commit = api.create_commit("msg", &tree).await.unwrap();
        assert_eq!(api.commits()[0].1, tree);
        assert_ne!(commit.sha, tree);
    }
}

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use gitload_backend::mock::MockApi;
use gitload_core::{PublishSettings, Publisher};

fn settings(object_count: usize, batch_size: usize) -> PublishSettings {
    PublishSettings {
        object_count,
        batch_size,
        max_in_flight: 16,
        commit_message: "post-lots".into(),
    }
}

fn index_of(content: &str) -> usize {
    content.split_whitespace().next().and_then(|i| i.parse().ok()).expect("indexed content")
}

#[tokio::test]
async fn hundred_objects_make_ten_trees_and_commits() {
    let api = Arc::new(MockApi::new());
    let summary = Publisher::new(api.clone(), settings(100, 10)).run().await;

    assert_eq!(summary.requested, 100);
    assert_eq!(summary.objects_created, 100);
    assert_eq!(summary.trees_created(), 10);
    assert_eq!(summary.commits_created(), 10);
    assert_eq!(summary.failed_units(), 0);
    assert_eq!(summary.batch_sizes(), vec![10; 10]);
    assert_eq!(summary.to_string(), "created 100 objects, 10 trees, 10 commits (0 failed)");
    assert_eq!(api.trees().len(), 10);
    assert_eq!(api.commits().len(), 10);
}

#[tokio::test]
async fn five_failed_creates_leave_a_partial_last_batch() {
    let failing: HashSet<usize> = [3, 17, 42, 64, 99].into_iter().collect();
    let api = Arc::new(MockApi::new().fail_blobs_where(move |c| failing.contains(&index_of(c))));
    let summary = Publisher::new(api.clone(), settings(100, 10)).run().await;

    assert_eq!(summary.objects_created, 95);
    let mut failed: Vec<usize> = summary.failures.iter().map(|(i, _)| *i).collect();
    failed.sort_unstable();
    assert_eq!(failed, vec![3, 17, 42, 64, 99]);
    assert!(summary.failures.iter().all(|(_, e)| e.kind() == "status"));

    let mut expected = vec![10; 9];
    expected.push(5);
    assert_eq!(summary.batch_sizes(), expected);
    assert_eq!(api.trees().len(), 10);
    assert_eq!(api.commits().len(), 10);
    assert_eq!(summary.failed_units(), 5);
}

#[tokio::test]
async fn every_blob_lands_in_exactly_one_tree_in_order() {
    let api = Arc::new(MockApi::new().with_latency(Duration::from_millis(1)));
    let summary = Publisher::new(api.clone(), settings(37, 8)).run().await;

    let created: HashSet<String> = api.blobs().into_iter().map(|(_, oid)| oid.to_string()).collect();
    let mut seen = HashSet::new();
    for (_, entries) in api.trees() {
        for (i, entry) in entries.iter().enumerate() {
            assert_eq!(entry.path, format!("file-{}.txt", i));
            assert!(seen.insert(entry.sha.to_string()), "{} in two trees", entry.sha);
        }
    }
    assert_eq!(seen, created);
    assert_eq!(summary.batch_sizes(), vec![8, 8, 8, 8, 5]);
}

#[tokio::test]
async fn commits_reference_their_trees() {
    let api = Arc::new(MockApi::new());
    let summary = Publisher::new(api.clone(), settings(12, 5)).run().await;

    let trees: Vec<_> = api.trees().into_iter().map(|(oid, _)| oid).collect();
    let commits = api.commits();
    assert_eq!(commits.len(), trees.len());
    for (i, (message, tree, _)) in commits.iter().enumerate() {
        assert_eq!(tree, &trees[i]);
        assert_eq!(message, &format!("post-lots batch {}", i));
    }
    for outcome in &summary.batches {
        let record = outcome.commit.as_ref().unwrap().as_ref().unwrap();
        assert!(commits.iter().any(|(_, tree, r)| r == record && tree == outcome.tree.as_ref().unwrap()));
    }
}

#[tokio::test]
async fn tree_failures_skip_commits_but_run_every_batch() {
    let api = Arc::new(MockApi::new().fail_trees());
    let summary = Publisher::new(api.clone(), settings(25, 10)).run().await;
    assert_eq!(summary.objects_created, 25);
    assert_eq!(summary.batch_sizes(), vec![10, 10, 5]);
    assert_eq!(summary.trees_created(), 0);
    assert_eq!(summary.commits_created(), 0);
    assert!(api.commits().is_empty());
    assert_eq!(summary.to_string(), "created 25 objects, 0 trees, 0 commits (3 failed)");
}

#[tokio::test]
async fn blob_contents_carry_index_and_start_time() {
    let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
    let api = Arc::new(MockApi::new());
    Publisher::new(api.clone(), settings(3, 10)).run_at(at).await;
    let mut contents: Vec<String> = api.blobs().into_iter().map(|(c, _)| c).collect();
    contents.sort();
    assert_eq!(
        contents,
        vec![
            "0 2024-01-02T03:04:05+00:00\n",
            "1 2024-01-02T03:04:05+00:00\n",
            "2 2024-01-02T03:04:05+00:00\n"
        ]
    );
}

#[tokio::test]
async fn concurrency_cap_holds_for_whole_run() {
    let api = Arc::new(MockApi::new().with_latency(Duration::from_millis(2)));
    let mut s = settings(60, 10);
    s.max_in_flight = 4;
    let summary = Publisher::new(api.clone(), s).run().await;
    assert_eq!(summary.objects_created, 60);
    assert!(api.peak_in_flight() <= 4);
}

#[tokio::test]
async fn nothing_requested_means_nothing_published() {
    let api = Arc::new(MockApi::new());
    let summary = Publisher::new(api.clone(), settings(0, 10)).run().await;
    assert!(summary.batches.is_empty());
    assert_eq!(api.blob_calls(), 0);
    assert_eq!(summary.to_string(), "created 0 objects, 0 trees, 0 commits (0 failed)");
}

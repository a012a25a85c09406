//! Process-wide counters for created objects and abandoned units

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, TextEncoder};

static OBJECTS_CREATED: Lazy<IntCounter> = Lazy::new(|| prometheus::register_int_counter!("gitload_objects_created_total", "Blob objects created").unwrap());
static TREES_CREATED: Lazy<IntCounter> = Lazy::new(|| prometheus::register_int_counter!("gitload_trees_created_total", "Tree objects created").unwrap());
static COMMITS_CREATED: Lazy<IntCounter> = Lazy::new(|| prometheus::register_int_counter!("gitload_commits_created_total", "Commit objects created").unwrap());
static FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    prometheus::register_int_counter_vec!("gitload_failures_total", "Abandoned units of work", &["stage", "kind"]).unwrap()
});

pub fn init() {
    let _ = &*OBJECTS_CREATED;
    let _ = &*TREES_CREATED;
    let _ = &*COMMITS_CREATED;
    let _ = &*FAILURES;
}

pub fn object_created() { OBJECTS_CREATED.inc(); }
pub fn tree_created() { TREES_CREATED.inc(); }
pub fn commit_created() { COMMITS_CREATED.inc(); }

/// `stage` is one of `blob`, `tree`, `commit`; `kind` is the error label.
pub fn failure(stage: &str, kind: &str) { FAILURES.with_label_values(&[stage, kind]).inc(); }

/// Text exposition of everything in the default registry.
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if encoder.encode(&prometheus::gather(), &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

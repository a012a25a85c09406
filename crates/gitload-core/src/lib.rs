//! Batch object publishing: worker pool, batch assembly, tree/commit pipeline.

pub mod batch;
pub mod payload;
pub mod pipeline;
pub mod pool;
pub mod publisher;
pub mod tick;

pub use batch::{Batch, BatchAssembler};
pub use pipeline::BatchOutcome;
pub use pool::{CreateOutcome, WorkerPool};
pub use publisher::{PublishSettings, Publisher, Summary};

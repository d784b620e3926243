//! Job orchestration pipeline: batch decomposition, task fan-out,
//! concurrent unit processing, completion fan-in, and notification
//! triggering.
//!
//! Components take explicit handles to the storage and capability
//! interfaces ([`store::BatchStore`], [`transform::ImageTransformer`])
//! rather than ambient globals, so the whole pipeline runs unchanged
//! against Postgres ([`store::PgBatchStore`]) or in memory
//! ([`memory::MemoryStore`], used by the integration tests).
//!
//! Data flow:
//!
//! ```text
//! intake -> decomposer -> dispatcher -> WorkerPool -> (per-unit outcome)
//!        -> aggregator -> (on terminal) -> notifier / exporter
//! ```

pub mod aggregator;
pub mod decomposer;
pub mod dispatcher;
pub mod exporter;
pub mod memory;
pub mod pool;
pub mod store;
pub mod transform;
pub mod worker;

pub use aggregator::Notifier;
pub use dispatcher::DispatchError;
pub use memory::MemoryStore;
pub use pool::{UnitTask, WorkerPool};
pub use store::{BatchStore, PgBatchStore, StoreError};
pub use transform::{HttpImageTransformer, ImageTransformer, TransformError};

//! Worker pool consuming the job queue.

pub mod pool;

pub use pool::WorkerPool;

//! Durable stores and semantic memory backends for Issola.
//!
//! - [`VisitGuard`]: the set of URLs (or topics) already processed
//! - [`CollectionStore`]: free-form key/value bookkeeping for the model
//! - [`TaskQueue`]: the research task table shared with background workers
//! - [`InMemoryBackend`] / [`FileBackend`]: keyword-scored semantic memory

pub mod collection;
pub mod file_backend;
pub mod in_memory;
mod json_file;
mod scoring;
pub mod task_queue;
pub mod visit_guard;

pub use collection::CollectionStore;
pub use file_backend::FileBackend;
pub use in_memory::{InMemoryBackend, MemoryRecord};
pub use task_queue::{ResearchTask, TaskQueue, TaskStatus};
pub use visit_guard::VisitGuard;

//! Bulk ad-refresh orchestration: jobs over many advertiser accounts, each
//! account processed as one sequential pass of prefetch → build → batched
//! mutate → label, with bounded cross-account concurrency and a persisted,
//! pausable job model.

pub mod builder;
pub mod content;
pub mod dispatcher;
pub mod labels;
pub mod orchestrator;
pub mod prefetch;
pub mod report;
pub mod store;

pub use content::{ContentGenerator, ThemeTemplates};
pub use dispatcher::AccountDispatcher;
pub use orchestrator::JobOrchestrator;
pub use store::{JobStore, MemoryJobStore};

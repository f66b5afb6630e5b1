pub mod api;
pub mod memory;
pub mod retry;

pub use api::AdsApi;
pub use memory::{AccountState, InMemoryAdsApi, SandboxSeed};
pub use retry::RemoteExecutor;

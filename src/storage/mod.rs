use anyhow::Result;
use async_trait::async_trait;
use dyn_clone::DynClone;

use crate::types::Page;

pub mod azure;

pub use azure::create_storage;

/// Type alias for a boxed Storage trait object.
pub type Storage = Box<dyn StorageTrait + Send + Sync>;

/// The two blob service calls the deletion pipeline needs.
///
/// Implementations are cloned into every delete worker, so cloning must be
/// cheap (share the HTTP client, don't rebuild it).
#[async_trait]
pub trait StorageTrait: DynClone {
    /// Fetch one page of blob names under the configured prefix, starting at
    /// `marker`. The returned page carries the marker for the next call.
    ///
    /// Any transport error or non-2xx status is returned as an error; the
    /// call is never retried here.
    async fn list_page(&self, marker: Option<&str>) -> Result<Page>;

    /// Delete one blob together with its snapshots.
    async fn delete_object(&self, name: &str) -> Result<()>;
}

dyn_clone::clone_trait_object!(StorageTrait);

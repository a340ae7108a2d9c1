//! Shared test utilities for the azrm-rs library crate.
//!
//! `MockStorage` is an in-memory container: listing pages are cut from the
//! current contents using the last returned name as marker (the way the blob
//! service pages), and successful deletes remove names, so later cycles see
//! only what is left.

use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::Config;
use crate::storage::StorageTrait;
use crate::types::error::AzrmError;
use crate::types::{Mode, Page, SasToken, StorageCredential};

/// Initialise a dummy tracing subscriber for tests.
///
/// Uses `try_init` so that only the first call in a process actually
/// installs the subscriber; subsequent calls are silently ignored.
pub(crate) fn init_dummy_tracing_subscriber() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("dummy=trace")
        .try_init();
}

/// In-memory log sink for asserting what a run wrote at a given level.
#[derive(Clone, Default)]
pub(crate) struct CapturedLog(Arc<Mutex<Vec<u8>>>);

impl CapturedLog {
    /// A subscriber writing events up to `max_level` into this sink; install
    /// it with `tracing::subscriber::set_default`.
    pub(crate) fn subscriber(
        &self,
        max_level: tracing::Level,
    ) -> impl tracing::Subscriber + Send + Sync {
        let writer = self.clone();
        tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(max_level)
            .finish()
    }

    pub(crate) fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
    }
}

impl std::io::Write for CapturedLog {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Create a default [`Config`] suitable for most unit / property tests.
///
/// Key defaults: account=`"testaccount"`, container=`"test-container"`,
/// `mode=delete`, `concurrency=4`, and waits shortened to 10ms.
pub(crate) fn make_test_config() -> Config {
    let mut config = Config::for_container(
        "testaccount",
        "test-container",
        StorageCredential::SasToken(SasToken::new("sv=2017-07-29&sig=test")),
    );
    config.mode = Mode::Delete;
    config.concurrency = 4;
    config.worker_idle_wait_milliseconds = 10;
    config.backpressure_wait_milliseconds = 10;
    config.progress_interval_milliseconds = 50;
    config
}

#[derive(Clone)]
pub(crate) struct MockStorage {
    container: Arc<Mutex<BTreeSet<String>>>,
    prefix: Option<String>,
    page_size: usize,
    failing_names: Arc<HashSet<String>>,
    fail_listing_on_call: Option<u32>,
    delete_delay: Option<Duration>,
    pub list_calls: Arc<AtomicU32>,
    pub delete_attempts: Arc<Mutex<Vec<String>>>,
}

impl MockStorage {
    pub(crate) fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            container: Arc::new(Mutex::new(names.into_iter().map(Into::into).collect())),
            prefix: None,
            page_size: 5000,
            failing_names: Arc::new(HashSet::new()),
            fail_listing_on_call: None,
            delete_delay: None,
            list_calls: Arc::new(AtomicU32::new(0)),
            delete_attempts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = Some(prefix.to_string());
        self
    }

    pub(crate) fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Deletes of these names answer 404 and leave the name in place.
    pub(crate) fn with_failing_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failing_names = Arc::new(names.into_iter().map(Into::into).collect());
        self
    }

    /// The n-th list call (1-based) answers 500.
    pub(crate) fn with_listing_failure_on_call(mut self, call: u32) -> Self {
        self.fail_listing_on_call = Some(call);
        self
    }

    pub(crate) fn with_delete_delay(mut self, delay: Duration) -> Self {
        self.delete_delay = Some(delay);
        self
    }

    pub(crate) fn remaining(&self) -> Vec<String> {
        self.container.lock().unwrap().iter().cloned().collect()
    }

    pub(crate) fn attempted(&self) -> Vec<String> {
        self.delete_attempts.lock().unwrap().clone()
    }

    pub(crate) fn list_call_count(&self) -> u32 {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageTrait for MockStorage {
    async fn list_page(&self, marker: Option<&str>) -> Result<Page> {
        let call = self.list_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_listing_on_call == Some(call) {
            return Err(AzrmError::Service {
                status: 500,
                reason: "Internal Server Error".to_string(),
            }
            .into());
        }

        let container = self.container.lock().unwrap();
        let prefix = self.prefix.as_deref().unwrap_or_default();
        let mut matching = container
            .iter()
            .filter(|name| name.starts_with(prefix))
            .filter(|name| marker.is_none_or(|marker| name.as_str() > marker));

        let names: Vec<String> = matching.by_ref().take(self.page_size).cloned().collect();
        let has_more = matching.next().is_some();

        Ok(Page {
            next_marker: if has_more { names.last().cloned() } else { None },
            names,
        })
    }

    async fn delete_object(&self, name: &str) -> Result<()> {
        self.delete_attempts.lock().unwrap().push(name.to_string());
        if let Some(delay) = self.delete_delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing_names.contains(name) {
            return Err(AzrmError::Service {
                status: 404,
                reason: "Not Found".to_string(),
            }
            .into());
        }

        self.container.lock().unwrap().remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_pages_by_marker() {
        let storage = MockStorage::new(["a", "b", "c", "d", "e"]).with_page_size(2);

        let first = storage.list_page(None).await.unwrap();
        assert_eq!(first.names, vec!["a", "b"]);
        assert_eq!(first.next_marker.as_deref(), Some("b"));

        let second = storage.list_page(Some("b")).await.unwrap();
        assert_eq!(second.names, vec!["c", "d"]);

        let last = storage.list_page(Some("d")).await.unwrap();
        assert_eq!(last.names, vec!["e"]);
        assert!(last.next_marker.is_none());
        assert_eq!(storage.list_call_count(), 3);
    }

    #[tokio::test]
    async fn mock_exact_page_boundary_has_no_marker() {
        let storage = MockStorage::new(["a", "b"]).with_page_size(2);
        let page = storage.list_page(None).await.unwrap();
        assert_eq!(page.names.len(), 2);
        assert!(page.next_marker.is_none());
    }
}

use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info};

use crate::stage::Stage;
use crate::types::error::AzrmError;

/// Pages through the container and feeds the delete buffer.
///
/// ## Pipeline role
///
/// ```text
/// ObjectLister → DeleteBuffer → ObjectDeleter slots
/// ```
///
/// The lister owns the pagination loop; the storage only answers one page at
/// a time. Before every fetch the buffer size is checked against
/// `max_buffered_objects` and the loop sleeps while it is above it. That
/// check is the only backpressure there is.
pub struct ObjectLister {
    stage: Stage,
}

impl ObjectLister {
    pub fn new(stage: Stage) -> Self {
        Self { stage }
    }

    /// List every blob under the prefix into the buffer, then mark the
    /// buffer as complete.
    ///
    /// A failed page aborts the listing and is returned as-is; the buffer is
    /// left open so the caller decides what to do with the workers. A
    /// cancelled run stops the listing with [`AzrmError::Cancelled`].
    pub async fn list_target(&self) -> Result<()> {
        debug!("list target objects has started.");

        let mut marker: Option<String> = None;
        loop {
            if !self.wait_for_buffer_space().await {
                info!("listing cancelled.");
                return Err(AzrmError::Cancelled.into());
            }

            debug!(
                prefix = self.stage.config.prefix.as_deref().unwrap_or_default(),
                "getting another batch of blobs..."
            );
            let page = self.stage.target.list_page(marker.as_deref()).await?;

            let count = page.names.len();
            self.stage.buffer.extend(page.names);
            self.stage.stats.add_listed(count as u64);
            debug!(count, "a batch of blobs has been buffered.");

            match page.next_marker {
                Some(next) => marker = Some(next),
                None => break,
            }
        }

        self.stage.buffer.mark_listing_done();
        debug!(
            listed = self.stage.stats.listed_count(),
            "list target objects has been completed."
        );
        Ok(())
    }

    /// Page through the container without deleting anything, logging each
    /// name. Returns how many blobs were seen.
    pub async fn enumerate(&self) -> Result<u64> {
        let mut marker: Option<String> = None;
        let mut count = 0u64;
        loop {
            if self.stage.is_cancelled() {
                return Err(AzrmError::Cancelled.into());
            }

            let page = self.stage.target.list_page(marker.as_deref()).await?;
            for name in &page.names {
                info!(name = name.as_str(), "{}", name);
            }
            count += page.names.len() as u64;
            self.stage.stats.add_listed(page.names.len() as u64);

            match page.next_marker {
                Some(next) => marker = Some(next),
                None => break,
            }
        }

        Ok(count)
    }

    /// Sleep while the buffer is over capacity. Returns `false` if the run
    /// was cancelled meanwhile.
    async fn wait_for_buffer_space(&self) -> bool {
        let wait = Duration::from_millis(self.stage.config.backpressure_wait_milliseconds);
        while self.stage.buffer.len() > self.stage.config.max_buffered_objects {
            debug!(
                buffered = self.stage.buffer.len(),
                "waiting for the buffer to empty some..."
            );
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = self.stage.cancellation_token.cancelled() => return false,
            }
        }

        !self.stage.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{DeleteBuffer, PopResult};
    use crate::config::Config;
    use crate::test_utils::{MockStorage, init_dummy_tracing_subscriber, make_test_config};
    use crate::types::RunStatistics;
    use crate::types::error::is_cancelled_error;
    use crate::types::token::create_pipeline_cancellation_token;
    use proptest::prelude::*;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn create_lister(config: Config, storage: MockStorage) -> (ObjectLister, Arc<DeleteBuffer>) {
        let buffer = Arc::new(DeleteBuffer::new());
        let stage = Stage::new(
            config,
            Box::new(storage),
            buffer.clone(),
            Arc::new(RunStatistics::new()),
            create_pipeline_cancellation_token(),
        );
        (ObjectLister::new(stage), buffer)
    }

    fn drain(buffer: &DeleteBuffer) -> Vec<String> {
        let mut names = Vec::new();
        while let PopResult::Name(name) = buffer.pop() {
            names.push(name);
        }
        names
    }

    #[tokio::test]
    async fn list_target_follows_markers() {
        init_dummy_tracing_subscriber();

        let storage = MockStorage::new(["a", "b", "c", "d", "e"]).with_page_size(2);
        let (lister, buffer) = create_lister(make_test_config(), storage.clone());

        lister.list_target().await.unwrap();

        assert_eq!(storage.list_call_count(), 3);
        assert!(buffer.is_listing_done());
        assert_eq!(lister.stage.stats.listed_count(), 5);

        let mut names = drain(&buffer);
        names.sort();
        assert_eq!(names, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(buffer.pop(), PopResult::Exhausted);
    }

    #[tokio::test]
    async fn list_target_empty_container() {
        init_dummy_tracing_subscriber();

        let storage = MockStorage::new(Vec::<String>::new());
        let (lister, buffer) = create_lister(make_test_config(), storage.clone());

        lister.list_target().await.unwrap();

        assert_eq!(storage.list_call_count(), 1);
        assert_eq!(buffer.pop(), PopResult::Exhausted);
    }

    #[tokio::test]
    async fn list_target_failure_propagates_and_leaves_buffer_open() {
        init_dummy_tracing_subscriber();

        let storage = MockStorage::new(["a", "b", "c"])
            .with_page_size(1)
            .with_listing_failure_on_call(2);
        let (lister, buffer) = create_lister(make_test_config(), storage);

        let error = lister.list_target().await.unwrap_err();
        assert!(error.to_string().contains("500"));
        assert!(!buffer.is_listing_done());
        assert_eq!(buffer.len(), 1);
    }

    #[tokio::test]
    async fn list_target_waits_while_buffer_is_full() {
        init_dummy_tracing_subscriber();

        let mut config = make_test_config();
        config.max_buffered_objects = 2;
        let storage = MockStorage::new(["a", "b", "c", "d", "e", "f"]).with_page_size(3);
        let (lister, buffer) = create_lister(config, storage.clone());

        let handle = tokio::spawn(async move { lister.list_target().await });

        // The first page (3 names) puts the buffer over capacity, so the
        // second fetch must not happen until something is popped.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(storage.list_call_count(), 1);
        assert_eq!(buffer.len(), 3);

        assert!(matches!(buffer.pop(), PopResult::Name(_)));
        handle.await.unwrap().unwrap();

        assert_eq!(storage.list_call_count(), 2);
        assert_eq!(buffer.len(), 5);
    }

    #[tokio::test]
    async fn list_target_stops_when_cancelled_during_backpressure() {
        init_dummy_tracing_subscriber();

        let mut config = make_test_config();
        config.max_buffered_objects = 1;
        let storage = MockStorage::new(["a", "b", "c", "d"]).with_page_size(2);
        let (lister, buffer) = create_lister(config, storage.clone());
        let token = lister.stage.cancellation_token.clone();

        let handle = tokio::spawn(async move { lister.list_target().await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();

        let error = handle.await.unwrap().unwrap_err();
        assert!(is_cancelled_error(&error));
        assert_eq!(storage.list_call_count(), 1);
        assert!(!buffer.is_listing_done());
    }

    #[tokio::test]
    async fn enumerate_counts_without_buffering() {
        init_dummy_tracing_subscriber();

        let storage = MockStorage::new(["a", "b", "c"]).with_page_size(2);
        let (lister, buffer) = create_lister(make_test_config(), storage.clone());

        assert_eq!(lister.enumerate().await.unwrap(), 3);
        assert!(buffer.is_empty());
        assert!(storage.attempted().is_empty());
    }

    #[tokio::test]
    async fn enumerate_with_prefix() {
        init_dummy_tracing_subscriber();

        let storage = MockStorage::new(["a", "b", "b/1", "c"]).with_prefix("b");
        let (lister, _) = create_lister(make_test_config(), storage);

        assert_eq!(lister.enumerate().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn enumerate_stops_when_cancelled() {
        init_dummy_tracing_subscriber();

        let storage = MockStorage::new(["a", "b"]);
        let (lister, _) = create_lister(make_test_config(), storage.clone());
        lister.stage.cancellation_token.cancel();

        let error = lister.enumerate().await.unwrap_err();
        assert!(is_cancelled_error(&error));
        assert_eq!(storage.list_call_count(), 0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn pagination_enumerates_each_matching_name_once(
            names in proptest::collection::btree_set("[a-c]{1,4}", 0..60),
            page_size in 1usize..10,
            prefix in proptest::option::of("[a-c]{1,2}"),
        ) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();

            rt.block_on(async {
                let mut storage = MockStorage::new(names.clone()).with_page_size(page_size);
                if let Some(prefix) = &prefix {
                    storage = storage.with_prefix(prefix);
                }
                let (lister, buffer) = create_lister(make_test_config(), storage.clone());

                lister.list_target().await.unwrap();

                let listed = drain(&buffer);
                let unique: BTreeSet<String> = listed.iter().cloned().collect();
                let expected: BTreeSet<String> = names
                    .iter()
                    .filter(|name| prefix.as_deref().is_none_or(|p| name.starts_with(p)))
                    .cloned()
                    .collect();

                assert_eq!(listed.len(), unique.len());
                assert_eq!(unique, expected);
                assert!(storage.list_call_count() as usize <= expected.len() / page_size + 1);
            });
        }
    }
}

//! Deletion pipeline orchestrator.
//!
//! Runs one or more list-then-drain cycles. In each cycle the lister and
//! `concurrency` delete slots share one [`DeleteBuffer`]; the lister pages
//! through the container while the slots delete, and the cycle ends when the
//! listing is complete and the buffer is empty.
//!
//! ```text
//! Initializing → Listing → Draining → Retrying → Listing → ... → Finished
//! ```
//!
//! Fatal failures (a failed page, or a failed delete under the halt policy)
//! cancel the shared token, are recorded, and stop the run. Nothing in here
//! exits the process; the caller inspects [`DeletionPipeline::has_error`].

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::buffer::DeleteBuffer;
use crate::config::Config;
use crate::deleter::ObjectDeleter;
use crate::lister::ObjectLister;
use crate::progress::ProgressReporter;
use crate::stage::Stage;
use crate::storage::{self, Storage};
use crate::types::error::is_cancelled_error;
use crate::types::token::PipelineCancellationToken;
use crate::types::{Mode, RunStatistics, RunStatisticsSnapshot};

/// Where the retry controller is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Initializing,
    /// The lister is paging; delete slots are already draining behind it.
    Listing,
    /// The listing is complete; waiting for the slots to empty the buffer.
    Draining,
    Retrying,
    Finished,
}

/// The core deletion pipeline orchestrator.
///
/// ## Usage
///
/// ```no_run
/// # async fn example() {
/// # use azrm_rs::{Config, DeletionPipeline, create_pipeline_cancellation_token};
/// # let config: Config = todo!();
/// let cancellation_token = create_pipeline_cancellation_token();
/// let mut pipeline = DeletionPipeline::new(config, cancellation_token).unwrap();
/// pipeline.run().await;
/// if pipeline.has_error() {
///     eprintln!("{:?}", pipeline.get_errors_and_consume().unwrap()[0]);
/// }
/// # }
/// ```
pub struct DeletionPipeline {
    config: Config,
    target: Storage,
    cancellation_token: PipelineCancellationToken,
    buffer: Arc<DeleteBuffer>,
    stats: Arc<RunStatistics>,
    state: PipelineState,
    has_error: Arc<AtomicBool>,
    has_panic: Arc<AtomicBool>,
    errors: Arc<Mutex<VecDeque<anyhow::Error>>>,
    completed_cycles: u32,
    deleted_in_finished_cycles: u64,
    ready: bool,
}

impl DeletionPipeline {
    /// Create a pipeline against the blob service described by `config`.
    ///
    /// Fails only if the storage client cannot be built (for example an
    /// account key that is not base64).
    pub fn new(config: Config, cancellation_token: PipelineCancellationToken) -> Result<Self> {
        let target = storage::create_storage(&config)?;
        Ok(Self::with_storage(config, target, cancellation_token))
    }

    /// Create a pipeline over an arbitrary [`Storage`].
    pub fn with_storage(
        config: Config,
        target: Storage,
        cancellation_token: PipelineCancellationToken,
    ) -> Self {
        Self {
            config,
            target,
            cancellation_token,
            buffer: Arc::new(DeleteBuffer::new()),
            stats: Arc::new(RunStatistics::new()),
            state: PipelineState::Initializing,
            has_error: Arc::new(AtomicBool::new(false)),
            has_panic: Arc::new(AtomicBool::new(false)),
            errors: Arc::new(Mutex::new(VecDeque::new())),
            completed_cycles: 0,
            deleted_in_finished_cycles: 0,
            ready: true,
        }
    }

    /// Run the pipeline to completion.
    ///
    /// In delete mode this runs `retries + 1` cycles unless a fatal error or
    /// cancellation stops it earlier. In test mode it pages through the
    /// container once and only logs.
    pub async fn run(&mut self) {
        assert!(self.ready, "DeletionPipeline::run() called more than once");
        self.ready = false;

        match self.config.mode {
            Mode::Test => self.run_test_mode().await,
            Mode::Delete => self.run_cycles().await,
        }

        self.state = PipelineState::Finished;
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Cycles that ran to the end without a fatal error or cancellation.
    pub fn completed_cycles(&self) -> u32 {
        self.completed_cycles
    }

    /// Blobs confirmed deleted across every cycle so far.
    pub fn deleted_count(&self) -> u64 {
        self.deleted_in_finished_cycles + self.stats.deleted_count()
    }

    /// Counters of the current (or last) cycle.
    pub fn statistics(&self) -> RunStatisticsSnapshot {
        self.stats.snapshot()
    }

    /// A reporter over this pipeline's counters, usable while `run()` holds
    /// the pipeline (for example from an interrupt handler).
    pub fn progress_reporter(&self) -> ProgressReporter {
        ProgressReporter::new(self.stats.clone())
    }

    /// Check if any error occurred during the pipeline execution.
    pub fn has_error(&self) -> bool {
        self.has_error.load(Ordering::SeqCst)
    }

    /// Check if any spawned task panicked during the pipeline execution.
    pub fn has_panic(&self) -> bool {
        self.has_panic.load(Ordering::SeqCst)
    }

    /// Consume and return all accumulated errors.
    ///
    /// Returns `None` if no errors occurred.
    pub fn get_errors_and_consume(&self) -> Option<Vec<anyhow::Error>> {
        if !self.has_error() {
            return None;
        }
        let mut error_list = self.errors.lock().unwrap();
        let mut errors = Vec::with_capacity(error_list.len());
        while let Some(e) = error_list.pop_front() {
            errors.push(e);
        }
        Some(errors)
    }

    /// Get error messages without consuming them.
    pub fn get_error_messages(&self) -> Option<Vec<String>> {
        if !self.has_error() {
            return None;
        }
        let error_list = self.errors.lock().unwrap();
        Some(error_list.iter().map(|e| format!("{e:#}")).collect())
    }

    // -----------------------------------------------------------------------
    // Internal methods
    // -----------------------------------------------------------------------

    async fn run_test_mode(&mut self) {
        self.stats.reset(0);
        self.state = PipelineState::Listing;

        let lister = ObjectLister::new(self.create_stage());
        match lister.enumerate().await {
            Ok(count) => {
                self.completed_cycles = 1;
                info!(count, "{} blob(s) would have been deleted.", count);
            }
            Err(e) if is_cancelled_error(&e) => {
                info!("listing cancelled.");
            }
            Err(e) => {
                debug!("object listing failed: {:#}", e);
                self.record_error(e);
            }
        }
    }

    async fn run_cycles(&mut self) {
        for retry_index in 0..=self.config.retries {
            if retry_index > 0 {
                self.state = PipelineState::Retrying;
                info!(retry_index, "beginning retry attempt {}.", retry_index);
            }

            self.execute_cycle(retry_index).await;

            if self.has_error() || self.cancellation_token.is_cancelled() {
                return;
            }
            self.completed_cycles += 1;
        }
    }

    /// One full list-then-drain pass.
    async fn execute_cycle(&mut self, retry_index: u32) {
        self.deleted_in_finished_cycles += self.stats.deleted_count();
        self.stats.reset(retry_index);
        self.buffer.reset();

        self.state = PipelineState::Listing;
        debug!(retry_index, "deletion cycle has started.");

        let progress_token = self.cancellation_token.child_token();
        let progress_handle = if self.config.show_no_progress {
            None
        } else {
            Some(self.progress_reporter().spawn(
                Duration::from_millis(self.config.progress_interval_milliseconds),
                progress_token.clone(),
            ))
        };

        let lister_handle = self.list_target();
        let worker_handles = self.delete_objects();

        self.join_supervised(lister_handle).await;
        self.state = PipelineState::Draining;
        for handle in worker_handles {
            self.join_supervised(handle).await;
        }

        progress_token.cancel();
        if let Some(handle) = progress_handle {
            let _ = handle.await;
        }

        if self.has_error() || self.cancellation_token.is_cancelled() {
            return;
        }

        info!(retry_index, "delete operation completed");
        self.progress_reporter().report();
    }

    fn create_stage(&self) -> Stage {
        Stage::new(
            self.config.clone(),
            dyn_clone::clone_box(&*self.target),
            self.buffer.clone(),
            self.stats.clone(),
            self.cancellation_token.clone(),
        )
    }

    /// Spawn the ObjectLister.
    fn list_target(&self) -> JoinHandle<()> {
        let lister = ObjectLister::new(self.create_stage());
        self.spawn_supervised("object lister".to_string(), async move {
            lister.list_target().await
        })
    }

    /// Spawn `concurrency` ObjectDeleter slots over the shared buffer.
    fn delete_objects(&self) -> Vec<JoinHandle<()>> {
        (0..self.config.concurrency)
            .map(|slot_index| {
                let deleter = ObjectDeleter::new(self.create_stage(), slot_index);
                self.spawn_supervised(format!("delete worker {slot_index}"), async move {
                    deleter.delete().await
                })
            })
            .collect()
    }

    /// Spawn `task` with the double-spawn pattern so that both errors and
    /// panics end up in the error list and cancel the run.
    fn spawn_supervised<F>(&self, task_name: String, task: F) -> JoinHandle<()>
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let has_error = self.has_error.clone();
        let has_panic = self.has_panic.clone();
        let error_list = self.errors.clone();
        let cancellation_token = self.cancellation_token.clone();

        tokio::spawn(async move {
            let join_result = tokio::spawn(task).await;

            match join_result {
                Ok(Ok(())) => {
                    debug!("{} completed successfully.", task_name);
                }
                Ok(Err(e)) => {
                    if is_cancelled_error(&e) {
                        info!("{} cancelled.", task_name);
                    } else {
                        cancellation_token.cancel();
                        has_error.store(true, Ordering::SeqCst);
                        debug!("{} failed: {:#}", task_name, e);
                        error_list.lock().unwrap().push_back(e);
                    }
                }
                Err(e) => {
                    cancellation_token.cancel();
                    has_error.store(true, Ordering::SeqCst);
                    has_panic.store(true, Ordering::SeqCst);
                    error!("{} task panicked: {}", task_name, e);
                    error_list
                        .lock()
                        .unwrap()
                        .push_back(anyhow::anyhow!("{} panicked: {}", task_name, e));
                }
            }
        })
    }

    async fn join_supervised(&self, handle: JoinHandle<()>) {
        if let Err(e) = handle.await {
            self.has_panic.store(true, Ordering::SeqCst);
            error!("supervisor task panicked: {}", e);
            self.record_error(anyhow::anyhow!("supervisor task panicked: {}", e));
        }
    }

    /// Record an error and set the error flag.
    fn record_error(&self, error: anyhow::Error) {
        self.has_error.store(true, Ordering::SeqCst);
        self.errors.lock().unwrap().push_back(error);
    }
}

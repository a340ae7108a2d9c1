use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use crate::types::token::PipelineCancellationToken;
use crate::types::{RunStatistics, RunStatisticsSnapshot};

/// Periodic read-only observer of the cycle counters.
///
/// Each report is one line with the deleted count, elapsed minutes, the
/// throughput and the number of open file descriptors of the process (a
/// cheap way to notice leaked sockets).
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    stats: Arc<RunStatistics>,
}

impl ProgressReporter {
    pub fn new(stats: Arc<RunStatistics>) -> Self {
        Self { stats }
    }

    /// Log one progress line and return the snapshot it was built from.
    pub fn report(&self) -> RunStatisticsSnapshot {
        let snapshot = self.stats.snapshot();
        let open_fds = open_file_descriptor_count();
        info!(
            deleted = snapshot.deleted_count,
            failed = snapshot.failed_count,
            listed = snapshot.listed_count,
            retry_index = snapshot.retry_index,
            open_fds = open_fds,
            "{}",
            format_progress(&snapshot, open_fds)
        );
        snapshot
    }

    /// Report every `interval` until `cancellation_token` is cancelled.
    pub fn spawn(
        &self,
        interval: Duration,
        cancellation_token: PipelineCancellationToken,
    ) -> JoinHandle<()> {
        let reporter = self.clone();
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        reporter.report();
                    }
                    _ = cancellation_token.cancelled() => break,
                }
            }
        })
    }
}

/// `"{count} blob(s) deleted after {minutes} minutes, {rate}/sec, file desc: {fds}."`
///
/// The rate is left out until something has been deleted, the descriptor
/// count when the platform does not expose it.
pub fn format_progress(snapshot: &RunStatisticsSnapshot, open_fds: Option<usize>) -> String {
    let minutes = snapshot.elapsed.as_secs_f64() / 60.0;
    let mut line = format!(
        "{} blob(s) deleted after {:.2} minutes",
        snapshot.deleted_count, minutes
    );
    if let Some(rate) = snapshot.objects_per_sec() {
        line.push_str(&format!(", {rate}/sec"));
    }
    if let Some(open_fds) = open_fds {
        line.push_str(&format!(", file desc: {open_fds}"));
    }
    line.push('.');
    line
}

/// Number of open file descriptors of this process, where it can be read.
pub fn open_file_descriptor_count() -> Option<usize> {
    ["/proc/self/fd", "/dev/fd"]
        .iter()
        .find_map(|dir| std::fs::read_dir(dir).ok())
        .map(|entries| entries.count())
}

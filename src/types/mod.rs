use std::fmt;
use std::fmt::{Debug, Formatter};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;
use zeroize_derive::{Zeroize, ZeroizeOnDrop};

pub mod error;
pub mod token;

/// Name of one blob inside the target container.
///
/// Names are unique within a listing page but are not deduplicated across
/// pages or retry cycles.
pub type ObjectName = String;

/// One page of a container listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub names: Vec<ObjectName>,
    /// Continuation marker for the next page. `None` ends the listing.
    pub next_marker: Option<String>,
}

/// What a run does with the listed blobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Mode {
    /// List only and report what would have been deleted.
    #[default]
    Test,
    /// List and delete.
    Delete,
}

/// What a delete worker does when a delete call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OnErrorPolicy {
    /// Stop the whole run at the first failure.
    #[default]
    Halt,
    /// Log the failure and move on to the next blob.
    Continue,
}

/// How requests against the blob service are authorized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageCredential {
    /// Sign every request with the account key (Shared Key scheme).
    SharedKey(AccountKey),
    /// Append a pre-issued shared access signature to every URL.
    SasToken(SasToken),
}

/// Base64 encoded storage account key, cleared from memory on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct AccountKey {
    pub key: String,
}

impl Debug for AccountKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountKey")
            .field("key", &"** redacted **")
            .finish()
    }
}

/// Shared access signature query string (without the leading `?`),
/// cleared from memory on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SasToken {
    pub token: String,
}

impl SasToken {
    pub fn new(token: &str) -> Self {
        Self {
            token: token.trim_start_matches('?').to_string(),
        }
    }
}

impl Debug for SasToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SasToken")
            .field("token", &"** redacted **")
            .finish()
    }
}

/// Counters of the current retry cycle.
///
/// Workers increment, the retry controller resets, the progress reporter
/// only reads.
#[derive(Debug)]
pub struct RunStatistics {
    start_time: Mutex<Instant>,
    deleted_count: AtomicU64,
    failed_count: AtomicU64,
    listed_count: AtomicU64,
    retry_index: AtomicU32,
}

/// Point-in-time copy of [`RunStatistics`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunStatisticsSnapshot {
    pub elapsed: Duration,
    pub deleted_count: u64,
    pub failed_count: u64,
    pub listed_count: u64,
    pub retry_index: u32,
}

impl RunStatisticsSnapshot {
    /// Deleted blobs per second, `None` before anything was deleted.
    pub fn objects_per_sec(&self) -> Option<u64> {
        if self.deleted_count == 0 {
            return None;
        }
        let elapsed_secs = self.elapsed.as_secs_f64();
        if elapsed_secs < 1.0 {
            return Some(self.deleted_count);
        }
        Some((self.deleted_count as f64 / elapsed_secs).round() as u64)
    }
}

impl Default for RunStatistics {
    fn default() -> Self {
        Self::new()
    }
}

impl RunStatistics {
    pub fn new() -> Self {
        Self {
            start_time: Mutex::new(Instant::now()),
            deleted_count: AtomicU64::new(0),
            failed_count: AtomicU64::new(0),
            listed_count: AtomicU64::new(0),
            retry_index: AtomicU32::new(0),
        }
    }

    /// Start a new cycle: zero the counters and restart the clock.
    pub fn reset(&self, retry_index: u32) {
        *self.start_time.lock().unwrap() = Instant::now();
        self.deleted_count.store(0, Ordering::SeqCst);
        self.failed_count.store(0, Ordering::SeqCst);
        self.listed_count.store(0, Ordering::SeqCst);
        self.retry_index.store(retry_index, Ordering::SeqCst);
    }

    pub fn increment_deleted(&self) {
        self.deleted_count.fetch_add(1, Ordering::SeqCst);
    }

    pub fn increment_failed(&self) {
        self.failed_count.fetch_add(1, Ordering::SeqCst);
    }

    pub fn add_listed(&self, count: u64) {
        self.listed_count.fetch_add(count, Ordering::SeqCst);
    }

    pub fn deleted_count(&self) -> u64 {
        self.deleted_count.load(Ordering::SeqCst)
    }

    pub fn failed_count(&self) -> u64 {
        self.failed_count.load(Ordering::SeqCst)
    }

    pub fn listed_count(&self) -> u64 {
        self.listed_count.load(Ordering::SeqCst)
    }

    pub fn retry_index(&self) -> u32 {
        self.retry_index.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> RunStatisticsSnapshot {
        RunStatisticsSnapshot {
            elapsed: self.start_time.lock().unwrap().elapsed(),
            deleted_count: self.deleted_count(),
            failed_count: self.failed_count(),
            listed_count: self.listed_count(),
            retry_index: self.retry_index(),
        }
    }
}

pub mod args;

use crate::types::{AccountKey, Mode, OnErrorPolicy, StorageCredential};

pub(crate) const DEFAULT_CONCURRENCY: u16 = 100;
pub(crate) const DEFAULT_MAX_BUFFERED_OBJECTS: usize = 50_000;
const DEFAULT_WAIT_MILLISECONDS: u64 = 1000;
const DEFAULT_PROGRESS_INTERVAL_MILLISECONDS: u64 = 1000;

/// Main configuration for the azrm-rs deletion pipeline.
///
/// Holds the target account/container, the credential, the worker pool
/// width, the failure policy and the retry budget. Usually built from
/// [`CLIArgs`](crate::CLIArgs) via `Config::try_from`, but library users can
/// start from [`Config::for_container`] and adjust fields.
///
/// ```
/// use azrm_rs::Config;
/// use azrm_rs::types::{AccountKey, Mode, StorageCredential};
///
/// let mut config = Config::for_container(
///     "myaccount",
///     "mycontainer",
///     StorageCredential::SharedKey(AccountKey {
///         key: "YXpybS10ZXN0LWtleS0wMTIzNDU2Nzg5".to_string(),
///     }),
/// );
/// config.mode = Mode::Delete;
/// config.prefix = Some("20180101T000000/input".to_string());
/// assert_eq!(config.concurrency, 100);
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub account: String,
    pub container: String,
    pub credential: StorageCredential,
    pub prefix: Option<String>,
    /// Blob service endpoint. `None` means `https://<account>.blob.core.windows.net`.
    pub endpoint_url: Option<String>,
    pub mode: Mode,
    pub concurrency: u16,
    pub on_error: OnErrorPolicy,
    pub retries: u32,
    /// Soft capacity of the pending buffer; the lister pauses above it.
    pub max_buffered_objects: usize,
    pub worker_idle_wait_milliseconds: u64,
    pub backpressure_wait_milliseconds: u64,
    pub progress_interval_milliseconds: u64,
    pub show_no_progress: bool,
    pub timeout_config: TimeoutConfig,
    pub tracing_config: Option<TracingConfig>,
}

impl Config {
    /// Create a `Config` with CLI defaults for the given account and container.
    ///
    /// The mode defaults to [`Mode::Test`]; set it to [`Mode::Delete`] to
    /// actually remove blobs.
    pub fn for_container(account: &str, container: &str, credential: StorageCredential) -> Self {
        Config {
            account: account.to_string(),
            container: container.to_string(),
            credential,
            prefix: None,
            endpoint_url: None,
            mode: Mode::default(),
            concurrency: DEFAULT_CONCURRENCY,
            on_error: OnErrorPolicy::default(),
            retries: 0,
            max_buffered_objects: DEFAULT_MAX_BUFFERED_OBJECTS,
            worker_idle_wait_milliseconds: DEFAULT_WAIT_MILLISECONDS,
            backpressure_wait_milliseconds: DEFAULT_WAIT_MILLISECONDS,
            progress_interval_milliseconds: DEFAULT_PROGRESS_INTERVAL_MILLISECONDS,
            show_no_progress: false,
            timeout_config: TimeoutConfig::default(),
            tracing_config: None,
        }
    }

    /// Base URL of the blob service, without a trailing slash.
    pub fn service_url(&self) -> String {
        match &self.endpoint_url {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}.blob.core.windows.net", self.account),
        }
    }

    /// Idle sockets kept per host: one per worker slot plus headroom for listing.
    pub fn connection_pool_size(&self) -> usize {
        self.concurrency as usize + 50
    }

    pub fn is_shared_key(&self) -> bool {
        matches!(self.credential, StorageCredential::SharedKey(_))
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::for_container(
            "",
            "",
            StorageCredential::SharedKey(AccountKey { key: String::new() }),
        )
    }
}

/// Optional per-request limits. Unset means a request may wait forever.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeoutConfig {
    pub operation_timeout_milliseconds: Option<u64>,
    pub connect_timeout_milliseconds: Option<u64>,
}

/// Tracing (logging) configuration.
#[derive(Debug, Clone, Copy)]
pub struct TracingConfig {
    pub tracing_level: log::Level,
    pub json_tracing: bool,
    pub http_tracing: bool,
    pub span_events_tracing: bool,
    pub disable_color_tracing: bool,
}

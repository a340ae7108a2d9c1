use crate::config::{
    Config, DEFAULT_CONCURRENCY, DEFAULT_MAX_BUFFERED_OBJECTS, TimeoutConfig, TracingConfig,
};
use crate::types::error::AzrmError;
use crate::types::{AccountKey, Mode, OnErrorPolicy, SasToken, StorageCredential};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use clap::Parser;
use clap::builder::NonEmptyStringValueParser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use std::ffi::OsString;

pub mod value_parser;


// ---------------------------------------------------------------------------
// Default constants
// ---------------------------------------------------------------------------

const DEFAULT_RETRIES: u32 = 0;
const DEFAULT_SHOW_NO_PROGRESS: bool = false;
const DEFAULT_JSON_TRACING: bool = false;
const DEFAULT_HTTP_TRACING: bool = false;
const DEFAULT_SPAN_EVENTS_TRACING: bool = false;
const DEFAULT_DISABLE_COLOR_TRACING: bool = false;

// ---------------------------------------------------------------------------
// Error messages
// ---------------------------------------------------------------------------

const ERROR_MESSAGE_ACCOUNT_MISSING: &str =
    "You must specify STORAGE_ACCOUNT in either .env or command line.";
const ERROR_MESSAGE_CONTAINER_MISSING: &str =
    "You must specify STORAGE_CONTAINER in either .env or command line.";
const ERROR_MESSAGE_CREDENTIAL_MISSING: &str =
    "You must specify either STORAGE_KEY or STORAGE_SAS in either .env or command line.";
const ERROR_MESSAGE_INVALID_KEY: &str = "STORAGE_KEY must be a base64 encoded account key";
const ERROR_MESSAGE_CONCURRENCY_ZERO: &str = "Concurrency must be at least 1.";
const ERROR_MESSAGE_MAX_BUFFERED_OBJECTS_ZERO: &str = "Max buffered objects must be at least 1.";

// ---------------------------------------------------------------------------
// CLIArgs (clap-derived argument struct)
// ---------------------------------------------------------------------------

/// azrm - Bulk deletion of blobs from an Azure Storage container.
///
/// Lists every blob in the container (optionally under a prefix) and deletes
/// them with a fixed number of concurrent requests. Every option can also be
/// set through the environment variable shown, or a `.env` file.
///
/// Example:
///   azrm -a myaccount -c mycontainer -k <KEY> -p 20180101T000000/input
///   azrm -a myaccount -c mycontainer -s '?sv=...' -m delete -x 200 -e continue -r 2
#[derive(Parser, Clone, Debug)]
#[command(name = "azrm", version, about, long_about = None)]
pub struct CLIArgs {
    // -----------------------------------------------------------------------
    // Target
    // -----------------------------------------------------------------------
    /// The name of the Azure Storage Account. Required.
    #[arg(short = 'a', long, env = "STORAGE_ACCOUNT", value_parser = NonEmptyStringValueParser::new(), help_heading = "Target")]
    pub account: Option<String>,

    /// The name of the Azure Storage Account Container. Required.
    #[arg(short = 'c', long, env = "STORAGE_CONTAINER", value_parser = NonEmptyStringValueParser::new(), help_heading = "Target")]
    pub container: Option<String>,

    /// Only delete blobs with this prefix. Ex. "20180101T000000/input".
    #[arg(short = 'p', long, env = "PREFIX", value_parser = NonEmptyStringValueParser::new(), help_heading = "Target")]
    pub prefix: Option<String>,

    /// Blob service endpoint. Defaults to https://<account>.blob.core.windows.net.
    #[arg(long, env = "STORAGE_ENDPOINT_URL", value_parser = value_parser::url::check_scheme, help_heading = "Target")]
    pub endpoint_url: Option<String>,

    // -----------------------------------------------------------------------
    // Credentials
    // -----------------------------------------------------------------------
    /// The Shared Access Signature query string. Takes precedence over --key.
    #[arg(short = 's', long, env = "STORAGE_SAS", value_parser = NonEmptyStringValueParser::new(), help_heading = "Credentials")]
    pub sas: Option<String>,

    /// The Azure Storage Account key (base64).
    #[arg(short = 'k', long, env = "STORAGE_KEY", value_parser = NonEmptyStringValueParser::new(), help_heading = "Credentials")]
    pub key: Option<String>,

    // -----------------------------------------------------------------------
    // Deletion
    // -----------------------------------------------------------------------
    /// "delete", or "test" which only shows what would be deleted.
    #[arg(short = 'm', long, env = "MODE", value_enum, ignore_case = true, default_value_t = Mode::Test, help_heading = "Deletion")]
    pub mode: Mode,

    /// "halt" stops at the first failed delete, "continue" logs it and moves on.
    #[arg(short = 'e', long, env = "ON_ERROR", value_enum, ignore_case = true, default_value_t = OnErrorPolicy::Halt, help_heading = "Deletion")]
    pub on_error: OnErrorPolicy,

    /// Number of additional full list-and-delete passes after the first.
    #[arg(short = 'r', long, env = "RETRIES", default_value_t = DEFAULT_RETRIES, help_heading = "Deletion")]
    pub retries: u32,

    // -----------------------------------------------------------------------
    // Performance
    // -----------------------------------------------------------------------
    /// The number of delete operations to perform at a time.
    #[arg(short = 'x', long, env = "CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY, help_heading = "Performance")]
    pub concurrency: u16,

    /// Listing pauses while more than this many blobs wait to be deleted.
    #[arg(long, env = "MAX_BUFFERED_OBJECTS", default_value_t = DEFAULT_MAX_BUFFERED_OBJECTS, help_heading = "Performance")]
    pub max_buffered_objects: usize,

    // -----------------------------------------------------------------------
    // Timeout
    // -----------------------------------------------------------------------
    /// Per-request timeout in milliseconds. Unset: wait forever.
    #[arg(long, env = "OPERATION_TIMEOUT_MILLISECONDS", help_heading = "Timeout")]
    pub operation_timeout_milliseconds: Option<u64>,

    /// Connection timeout in milliseconds.
    #[arg(long, env = "CONNECT_TIMEOUT_MILLISECONDS", help_heading = "Timeout")]
    pub connect_timeout_milliseconds: Option<u64>,

    // -----------------------------------------------------------------------
    // Logging
    // -----------------------------------------------------------------------
    /// Minimum level to log (error, warn, info, verbose, debug, silly). Overrides -v/-q.
    #[arg(short = 'l', long, env = "LOG_LEVEL", value_parser = value_parser::log_level::parse_log_level, help_heading = "Logging")]
    pub log_level: Option<log::Level>,

    #[command(flatten)]
    pub verbosity: Verbosity<InfoLevel>,

    /// Don't log the periodic progress line.
    #[arg(long, env, default_value_t = DEFAULT_SHOW_NO_PROGRESS, help_heading = "Logging")]
    pub show_no_progress: bool,

    /// Output logs in JSON format.
    #[arg(long, env, default_value_t = DEFAULT_JSON_TRACING, help_heading = "Logging")]
    pub json_tracing: bool,

    /// Include HTTP client internals in the log.
    #[arg(long, env, default_value_t = DEFAULT_HTTP_TRACING, help_heading = "Logging")]
    pub http_tracing: bool,

    /// Enable tracing span events.
    #[arg(long, env, default_value_t = DEFAULT_SPAN_EVENTS_TRACING, help_heading = "Logging")]
    pub span_events_tracing: bool,

    /// Disable colored output in logs.
    #[arg(long, env, default_value_t = DEFAULT_DISABLE_COLOR_TRACING, help_heading = "Logging")]
    pub disable_color_tracing: bool,
}

// ---------------------------------------------------------------------------
// parse_from_args (public API)
// ---------------------------------------------------------------------------

/// Parse command-line arguments into a `CLIArgs` struct.
///
/// # Example
///
/// ```
/// use azrm_rs::config::args::parse_from_args;
///
/// let args = vec!["azrm", "-a", "myaccount", "-c", "mycontainer", "-m", "delete"];
/// let cli_args = parse_from_args(args).unwrap();
/// assert_eq!(cli_args.account.as_deref(), Some("myaccount"));
/// ```
pub fn parse_from_args<I, T>(args: I) -> Result<CLIArgs, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    CLIArgs::try_parse_from(args)
}

/// Parse arguments and build a Config in one step.
///
/// Both unparseable arguments and failed validation come back as
/// [`AzrmError::InvalidConfig`].
pub fn build_config_from_args<I, T>(args: I) -> Result<Config, AzrmError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli_args =
        CLIArgs::try_parse_from(args).map_err(|e| AzrmError::InvalidConfig(e.to_string()))?;
    Config::try_from(cli_args)
}

fn invalid_config(message: &str) -> AzrmError {
    AzrmError::InvalidConfig(message.to_string())
}

// ---------------------------------------------------------------------------
// Validation and Config conversion
// ---------------------------------------------------------------------------

impl CLIArgs {
    fn validate(&self) -> Result<(), AzrmError> {
        if self.concurrency == 0 {
            return Err(invalid_config(ERROR_MESSAGE_CONCURRENCY_ZERO));
        }
        if self.max_buffered_objects == 0 {
            return Err(invalid_config(ERROR_MESSAGE_MAX_BUFFERED_OBJECTS_ZERO));
        }
        Ok(())
    }

    fn build_credential(&self) -> Result<StorageCredential, AzrmError> {
        if let Some(ref sas) = self.sas {
            return Ok(StorageCredential::SasToken(SasToken::new(sas)));
        }

        let Some(ref key) = self.key else {
            return Err(invalid_config(ERROR_MESSAGE_CREDENTIAL_MISSING));
        };
        BASE64_STANDARD
            .decode(key.trim())
            .map_err(|e| AzrmError::InvalidConfig(format!("{ERROR_MESSAGE_INVALID_KEY}: {e}")))?;

        Ok(StorageCredential::SharedKey(AccountKey {
            key: key.trim().to_string(),
        }))
    }

    fn build_tracing_config(&self) -> Option<TracingConfig> {
        let log_level = self.log_level.or_else(|| self.verbosity.log_level())?;

        Some(TracingConfig {
            tracing_level: log_level,
            json_tracing: self.json_tracing,
            http_tracing: self.http_tracing,
            span_events_tracing: self.span_events_tracing,
            disable_color_tracing: self.disable_color_tracing,
        })
    }
}

impl TryFrom<CLIArgs> for Config {
    type Error = AzrmError;

    fn try_from(args: CLIArgs) -> Result<Self, Self::Error> {
        let account = args
            .account
            .clone()
            .ok_or_else(|| invalid_config(ERROR_MESSAGE_ACCOUNT_MISSING))?;
        let container = args
            .container
            .clone()
            .ok_or_else(|| invalid_config(ERROR_MESSAGE_CONTAINER_MISSING))?;
        let credential = args.build_credential()?;

        args.validate()?;

        let mut config = Config::for_container(&account, &container, credential);
        config.prefix = args.prefix.clone();
        config.endpoint_url = args.endpoint_url.clone();
        config.mode = args.mode;
        config.concurrency = args.concurrency;
        config.on_error = args.on_error;
        config.retries = args.retries;
        config.max_buffered_objects = args.max_buffered_objects;
        config.show_no_progress = args.show_no_progress;
        config.timeout_config = TimeoutConfig {
            operation_timeout_milliseconds: args.operation_timeout_milliseconds,
            connect_timeout_milliseconds: args.connect_timeout_milliseconds,
        };
        config.tracing_config = args.build_tracing_config();

        Ok(config)
    }
}

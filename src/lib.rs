/*!
# Overview
azrm-rs is a fast bulk deletion tool for Azure Blob Storage.
It deletes every blob in a container, or every blob under a name prefix,
with many concurrent delete requests against the blob service REST API.

## Features
- **High Performance**: One lister pages through the container while up to
  `concurrency` workers delete in parallel over a pooled HTTP client
- **Bounded Memory**: The listing pauses while too many names are buffered
- **Test Mode by Default**: Nothing is deleted unless the mode is `delete`
- **Error Policy**: Halt on the first failed delete, or log it and continue
- **Retry Cycles**: Re-list and retry what is left, `retries` more times
- **Shared Key or SAS**: Requests are signed with the account key, or carry
  a SAS token
- **Library-First**: The azrm CLI is a thin wrapper over this crate

## As a Library

```toml
[dependencies]
azrm-rs = "0.1"
tokio = { version = "1", features = ["full"] }
```

```no_run
use azrm_rs::config::args::build_config_from_args;
use azrm_rs::{DeletionPipeline, create_pipeline_cancellation_token};

#[tokio::main]
async fn main() {
    let args = vec![
        "azrm",
        "--account", "myaccount",
        "--container", "logs",
        "--prefix", "2019/",
        "--sas", "sv=2017-07-29&sig=...",
        "--mode", "delete",
    ];

    let config = build_config_from_args(args).unwrap();
    let cancellation_token = create_pipeline_cancellation_token();
    let mut pipeline = DeletionPipeline::new(config, cancellation_token).unwrap();
    pipeline.run().await;

    if pipeline.has_error() {
        eprintln!("{:?}", pipeline.get_errors_and_consume().unwrap()[0]);
    }
}
```
*/

pub mod buffer;
pub mod config;
pub mod deleter;
pub mod lister;
pub mod pipeline;
pub mod progress;
pub mod stage;
pub mod storage;
pub mod types;

#[cfg(test)]
mod test_utils;

pub use config::Config;
pub use config::args::{CLIArgs, build_config_from_args, parse_from_args};
pub use pipeline::{DeletionPipeline, PipelineState};
pub use progress::ProgressReporter;
pub use types::error::{AzrmError, exit_code_from_error, is_cancelled_error};
pub use types::token::{PipelineCancellationToken, create_pipeline_cancellation_token};
pub use types::{Mode, OnErrorPolicy, RunStatisticsSnapshot};

use anyhow::Result;
use clap::Parser;
use tracing::{debug, error, info, trace};

use azrm_rs::config::Config;
use azrm_rs::types::StorageCredential;
use azrm_rs::{
    CLIArgs, DeletionPipeline, create_pipeline_cancellation_token, exit_code_from_error,
};

mod ctrl_c_handler;
mod tracing_init;

/// azrm - Fast bulk deletion of Azure blobs.
///
/// This binary is a thin wrapper over the azrm-rs library.
/// All core functionality is implemented in the library crate.
#[cfg_attr(coverage_nightly, coverage(off))]
#[tokio::main]
async fn main() {
    // Values from .env act as environment variables; real ones win.
    dotenvy::dotenv().ok();

    let config = load_config_exit_if_err();

    start_tracing_if_necessary(&config);

    trace!("config = {:?}", config);

    if let Err(e) = run(config).await {
        std::process::exit(exit_code_from_error(&e));
    }
}

/// Unparseable arguments exit through clap (code 2); a parsed but invalid
/// configuration prints the same style of message and exits with the
/// configuration error's code.
#[cfg_attr(coverage_nightly, coverage(off))]
fn load_config_exit_if_err() -> Config {
    match Config::try_from(CLIArgs::parse()) {
        Ok(config) => config,
        Err(e) => {
            let _ = clap::Error::raw(clap::error::ErrorKind::ValueValidation, e.to_string())
                .print();
            std::process::exit(e.exit_code());
        }
    }
}

fn start_tracing_if_necessary(config: &Config) -> bool {
    if config.tracing_config.is_none() {
        return false;
    }

    tracing_init::init_tracing(config.tracing_config.as_ref().unwrap());
    true
}

fn log_settings(config: &Config) {
    let (sas, key) = match &config.credential {
        StorageCredential::SasToken(_) => ("defined", "undefined"),
        StorageCredential::SharedKey(_) => ("undefined", "defined"),
    };

    info!(
        account = config.account.as_str(),
        container = config.container.as_str(),
        prefix = config.prefix.as_deref().unwrap_or_default(),
        endpoint = config.service_url().as_str(),
        sas = sas,
        key = key,
        mode = ?config.mode,
        concurrency = config.concurrency,
        on_error = ?config.on_error,
        retries = config.retries,
        max_buffered_objects = config.max_buffered_objects,
        "starting azrm."
    );
}

async fn run(config: Config) -> Result<()> {
    log_settings(&config);

    let cancellation_token = create_pipeline_cancellation_token();

    let start_time = tokio::time::Instant::now();
    debug!("deletion pipeline start.");

    let mut pipeline = DeletionPipeline::new(config, cancellation_token.clone())?;
    ctrl_c_handler::spawn_ctrl_c_handler(cancellation_token, pipeline.progress_reporter());

    pipeline.run().await;

    let duration_sec = format!("{:.3}", start_time.elapsed().as_secs_f32());

    if pipeline.has_error() {
        let mut errors = pipeline.get_errors_and_consume().unwrap_or_default();
        error!(
            duration_sec = duration_sec,
            "There was a fatal error. Program aborting after {} deleted.",
            pipeline.deleted_count()
        );
        return Err(if errors.is_empty() {
            anyhow::anyhow!("azrm failed.")
        } else {
            errors.remove(0)
        });
    }

    debug!(duration_sec = duration_sec, "azrm has been completed.");

    Ok(())
}

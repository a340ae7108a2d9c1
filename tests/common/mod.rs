//! Shared integration test infrastructure for azrm-rs.
//!
//! Provides `TestHelper`, which runs a `wiremock` server standing in for the
//! blob service and drives the deletion pipeline against it.

#![allow(dead_code)]

use std::process::Output;

use azrm_rs::config::args::build_config_from_args;
use azrm_rs::{Config, DeletionPipeline, RunStatisticsSnapshot, create_pipeline_cancellation_token};
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

pub const ACCOUNT: &str = "testaccount";
pub const CONTAINER: &str = "test-container";
pub const SAS: &str = "sv=2017-07-29&sig=test";
pub const ACCOUNT_KEY: &str = "YXpybS10ZXN0LWtleS0wMTIzNDU2Nzg5";

/// Variables the `azrm` binary reads; cleared so the host environment
/// cannot leak into a run.
const AZRM_ENV_VARS: &[&str] = &[
    "STORAGE_ACCOUNT",
    "STORAGE_CONTAINER",
    "STORAGE_SAS",
    "STORAGE_KEY",
    "STORAGE_ENDPOINT_URL",
    "PREFIX",
    "MODE",
    "ON_ERROR",
    "RETRIES",
    "CONCURRENCY",
    "MAX_BUFFERED_OBJECTS",
    "LOG_LEVEL",
    "RUST_LOG",
];

/// Result of running a deletion pipeline.
#[derive(Debug)]
pub struct PipelineResult {
    /// Counters of the last cycle.
    pub stats: RunStatisticsSnapshot,
    /// Deleted across every cycle.
    pub deleted: u64,
    pub completed_cycles: u32,
    pub has_error: bool,
    pub has_panic: bool,
    /// Error messages collected from the pipeline (empty if no errors).
    pub errors: Vec<String>,
}

pub struct TestHelper {
    pub server: MockServer,
}

impl TestHelper {
    pub async fn new() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Build a config pointing at the mock server, authorized with a SAS
    /// token and in delete mode. `extra_args` go last and can override.
    pub fn build_config(&self, extra_args: Vec<&str>) -> Config {
        let uri = self.server.uri();
        let mut args = vec![
            "azrm",
            "--account",
            ACCOUNT,
            "--container",
            CONTAINER,
            "--endpoint-url",
            uri.as_str(),
            "--mode",
            "delete",
            "--show-no-progress",
        ];
        if !extra_args.iter().any(|arg| *arg == "--key") {
            args.extend(["--sas", SAS]);
        }
        args.extend(extra_args);

        build_config_from_args(args).unwrap()
    }

    /// Run the `azrm` binary against the mock server with the same base
    /// arguments as [`TestHelper::build_config`].
    pub async fn run_binary(&self, extra_args: Vec<&str>) -> Output {
        let uri = self.server.uri();
        let mut args = vec![
            "--account",
            ACCOUNT,
            "--container",
            CONTAINER,
            "--endpoint-url",
            uri.as_str(),
            "--mode",
            "delete",
            "--show-no-progress",
            "--sas",
            SAS,
        ];
        args.extend(extra_args);

        run_azrm(args).await
    }

    pub async fn run_pipeline(config: Config) -> PipelineResult {
        let cancellation_token = create_pipeline_cancellation_token();
        let mut pipeline = DeletionPipeline::new(config, cancellation_token).unwrap();
        pipeline.run().await;

        PipelineResult {
            stats: pipeline.statistics(),
            deleted: pipeline.deleted_count(),
            completed_cycles: pipeline.completed_cycles(),
            has_error: pipeline.has_error(),
            has_panic: pipeline.has_panic(),
            errors: pipeline.get_error_messages().unwrap_or_default(),
        }
    }

    /// Answer the first List Blobs call (no marker) with `names`.
    pub async fn mount_first_page(&self, names: &[&str], next_marker: Option<&str>) {
        Mock::given(method("GET"))
            .and(path(format!("/{CONTAINER}")))
            .and(query_param("restype", "container"))
            .and(query_param("comp", "list"))
            .and(query_param_is_missing("marker"))
            .respond_with(list_response(names, next_marker))
            .mount(&self.server)
            .await;
    }

    /// Answer the List Blobs call carrying `marker` with `names`.
    pub async fn mount_page(&self, marker: &str, names: &[&str], next_marker: Option<&str>) {
        Mock::given(method("GET"))
            .and(path(format!("/{CONTAINER}")))
            .and(query_param("restype", "container"))
            .and(query_param("comp", "list"))
            .and(query_param("marker", marker))
            .respond_with(list_response(names, next_marker))
            .mount(&self.server)
            .await;
    }

    /// Answer every Delete Blob call for `encoded_name` with `status`.
    pub async fn mount_delete(&self, encoded_name: &str, status: u16) {
        Mock::given(method("DELETE"))
            .and(path(format!("/{CONTAINER}/{encoded_name}")))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    pub async fn received(&self) -> Vec<Request> {
        self.server.received_requests().await.unwrap_or_default()
    }

    pub async fn delete_requests(&self) -> Vec<Request> {
        self.received()
            .await
            .into_iter()
            .filter(|request| request.method.as_str() == "DELETE")
            .collect()
    }
}

/// Run the `azrm` binary with exactly `args`, outside any `.env` and with
/// the azrm environment variables removed.
pub async fn run_azrm(args: Vec<&str>) -> Output {
    let mut command = tokio::process::Command::new(env!("CARGO_BIN_EXE_azrm"));
    command.args(args).current_dir(std::env::temp_dir());
    for name in AZRM_ENV_VARS {
        command.env_remove(name);
    }

    command.output().await.unwrap()
}

/// A List Blobs body the way the service returns it.
pub fn list_blobs_xml(names: &[&str], next_marker: Option<&str>) -> String {
    let blobs: String = names
        .iter()
        .map(|name| {
            format!(
                "<Blob><Name>{}</Name><Properties><BlobType>BlockBlob</BlobType></Properties></Blob>",
                escape_xml(name)
            )
        })
        .collect();
    let next_marker = match next_marker {
        Some(marker) => format!("<NextMarker>{marker}</NextMarker>"),
        None => "<NextMarker />".to_string(),
    };

    format!(
        r#"<?xml version="1.0" encoding="utf-8"?><EnumerationResults ServiceEndpoint="https://{ACCOUNT}.blob.core.windows.net/" ContainerName="{CONTAINER}"><Blobs>{blobs}</Blobs>{next_marker}</EnumerationResults>"#
    )
}

fn list_response(names: &[&str], next_marker: Option<&str>) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "application/xml")
        .set_body_string(list_blobs_xml(names, next_marker))
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub mod client_builder;
pub mod list_response;
pub mod signer;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, Response};
use std::sync::Arc;
use tracing::{debug, error, trace};

use crate::config::Config;
use crate::storage::azure::list_response::parse_list_blobs_response;
use crate::storage::azure::signer::{SharedKeySigner, SigningRequest};
use crate::storage::{Storage, StorageTrait};
use crate::types::error::AzrmError;
use crate::types::{Page, SasToken, StorageCredential};

/// REST protocol version sent with every request.
pub const AZURE_STORAGE_API_VERSION: &str = "2017-07-29";

const RFC1123_FMT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Unreserved characters stay as they are. `/` is kept in blob paths so
/// virtual directories map onto URL segments.
const QUERY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');
const BLOB_PATH_ENCODE_SET: &AsciiSet = &QUERY_ENCODE_SET.remove(b'/');

#[derive(Clone)]
enum RequestAuth {
    SharedKey(Arc<SharedKeySigner>),
    SasToken(Arc<SasToken>),
}

/// Blob service client for one container.
#[derive(Clone)]
pub struct AzureBlobStorage {
    client: reqwest::Client,
    service_url: String,
    container: String,
    prefix: Option<String>,
    auth: RequestAuth,
}

/// Create the storage used by the pipeline from `config`.
pub fn create_storage(config: &Config) -> Result<Storage> {
    Ok(Box::new(AzureBlobStorage::new(config)?))
}

impl AzureBlobStorage {
    pub fn new(config: &Config) -> Result<Self> {
        let auth = match &config.credential {
            StorageCredential::SasToken(token) => RequestAuth::SasToken(Arc::new(token.clone())),
            StorageCredential::SharedKey(key) => {
                RequestAuth::SharedKey(Arc::new(SharedKeySigner::new(&config.account, key)?))
            }
        };

        Ok(Self {
            client: config.create_client()?,
            service_url: config.service_url(),
            container: config.container.clone(),
            prefix: config.prefix.clone(),
            auth,
        })
    }

    fn container_path(&self) -> String {
        format!("/{}", self.container)
    }

    fn blob_path(&self, name: &str) -> String {
        format!(
            "/{}/{}",
            self.container,
            utf8_percent_encode(name, BLOB_PATH_ENCODE_SET)
        )
    }

    fn build_url(&self, resource_path: &str, query: &[(String, String)]) -> String {
        let mut parts = Vec::with_capacity(query.len() + 1);
        if let RequestAuth::SasToken(sas) = &self.auth {
            parts.push(sas.token.clone());
        }
        parts.extend(query.iter().map(|(key, value)| {
            format!("{key}={}", utf8_percent_encode(value, QUERY_ENCODE_SET))
        }));

        let mut url = format!("{}{}", self.service_url, resource_path);
        if !parts.is_empty() {
            url.push('?');
            url.push_str(&parts.join("&"));
        }
        url
    }

    /// Send a body-less request and map any non-2xx answer to an error.
    async fn send(
        &self,
        method: Method,
        resource_path: &str,
        query: &[(String, String)],
        extra_headers: &[(&str, &str)],
    ) -> Result<Response> {
        let mut headers = vec![
            ("x-ms-date".to_string(), Utc::now().format(RFC1123_FMT).to_string()),
            (
                "x-ms-version".to_string(),
                AZURE_STORAGE_API_VERSION.to_string(),
            ),
        ];
        headers.extend(
            extra_headers
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string())),
        );

        let url = self.build_url(resource_path, query);
        trace!(method = %method, url = %url, "sending request.");

        let mut request = self.client.request(method.clone(), &url);
        if let RequestAuth::SharedKey(signer) = &self.auth {
            let authorization = signer.authorization(&SigningRequest {
                method: method.as_str(),
                resource_path,
                headers: &headers,
                query,
                content_length: None,
            })?;
            request = request.header(AUTHORIZATION, authorization);
        }
        for (key, value) in &headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| AzrmError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AzrmError::Service {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            }
            .into());
        }

        Ok(response)
    }

    async fn fetch_page(&self, query: &[(String, String)]) -> Result<Page> {
        let response = self
            .send(Method::GET, &self.container_path(), query, &[])
            .await?;
        let body = response
            .text()
            .await
            .map_err(|e| AzrmError::Transport(e.to_string()))?;

        parse_list_blobs_response(&body)
    }
}

#[async_trait]
impl StorageTrait for AzureBlobStorage {
    async fn list_page(&self, marker: Option<&str>) -> Result<Page> {
        let mut query = vec![
            ("restype".to_string(), "container".to_string()),
            ("comp".to_string(), "list".to_string()),
        ];
        if let Some(prefix) = &self.prefix {
            query.push(("prefix".to_string(), prefix.clone()));
        }
        if let Some(marker) = marker {
            query.push(("marker".to_string(), marker.to_string()));
        }

        let prefix = self.prefix.as_deref().unwrap_or_default();
        self.fetch_page(&query).await.map_err(|e| {
            let status = e.downcast_ref::<AzrmError>().and_then(AzrmError::status);
            error!(
                container = self.container,
                prefix = prefix,
                status = status,
                "failed to list blobs (prefix: \"{}\"): {}",
                prefix,
                e
            );
            e.context(format!("List Blobs failed for prefix \"{prefix}\"."))
        })
    }

    async fn delete_object(&self, name: &str) -> Result<()> {
        self.send(
            Method::DELETE,
            &self.blob_path(name),
            &[],
            &[("x-ms-delete-snapshots", "include")],
        )
        .await
        .map(|_| ())
        .map_err(|e| {
            let status = e.downcast_ref::<AzrmError>().and_then(AzrmError::status);
            debug!(
                container = self.container,
                name = name,
                status = status,
                "failed to delete \"{}\": {}",
                name,
                e
            );
            e.context(format!("Delete Blob failed for \"{name}\"."))
        })
    }
}

//! Shared Key request signing for the Blob service.
//!
//! The canonical string layout is fixed by the service and every field
//! position matters:
//!
//! ```text
//! VERB
//! Content-Encoding      (always empty)
//! Content-Language      (always empty)
//! Content-Length        (empty when there is no body, never "0" for none)
//! Content-MD5           (always empty)
//! Content-Type
//! Date                  (always empty, x-ms-date is used instead)
//! If-Modified-Since     (always empty)
//! If-Match              (always empty)
//! If-None-Match
//! If-Unmodified-Since   (always empty)
//! Range                 (always empty)
//! x-ms-* headers, one "name:value" per line, sorted
//! /account/container[/blob]
//! query "name:value" lines, sorted, only when there are any
//! ```

use anyhow::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::types::AccountKey;
use crate::types::error::AzrmError;

type HmacSha256 = Hmac<Sha256>;

const CUSTOM_HEADER_PREFIX: &str = "x-ms-";

/// Everything about one outgoing request that takes part in the signature.
#[derive(Debug, Clone, Copy)]
pub struct SigningRequest<'a> {
    pub method: &'a str,
    /// `/container[/blob]`, in the same encoded form as the request URL.
    pub resource_path: &'a str,
    /// Header names are matched case-insensitively.
    pub headers: &'a [(String, String)],
    /// Decoded query parameters.
    pub query: &'a [(String, String)],
    /// Byte length of the body, `None` when the request has no body at all.
    pub content_length: Option<usize>,
}

impl SigningRequest<'_> {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Build the canonical string for `request` against `account`.
pub fn string_to_sign(account: &str, request: &SigningRequest<'_>) -> String {
    let mut custom_headers: Vec<String> = request
        .headers
        .iter()
        .map(|(key, value)| (key.to_ascii_lowercase(), value))
        .filter(|(key, _)| key.starts_with(CUSTOM_HEADER_PREFIX))
        .map(|(key, value)| format!("{key}:{value}"))
        .collect();
    custom_headers.sort();

    let mut query_params: Vec<String> = request
        .query
        .iter()
        .map(|(key, value)| format!("{key}:{value}"))
        .collect();
    query_params.sort();

    let content_length = request
        .content_length
        .map(|length| length.to_string())
        .unwrap_or_default();
    let content_type = request.header("content-type").unwrap_or_default();
    let if_none_match = request.header("if-none-match").unwrap_or_default();

    let mut canonical = format!(
        "{method}\n\n\n{content_length}\n\n{content_type}\n\n\n\n{if_none_match}\n\n\n{headers}\n/{account}{resource}",
        method = request.method,
        headers = custom_headers.join("\n"),
        resource = request.resource_path,
    );
    for param in &query_params {
        canonical.push('\n');
        canonical.push_str(param);
    }

    canonical
}

/// Signs requests with a storage account key.
pub struct SharedKeySigner {
    account: String,
    key: Zeroizing<Vec<u8>>,
}

impl SharedKeySigner {
    pub fn new(account: &str, account_key: &AccountKey) -> Result<Self> {
        let key = BASE64_STANDARD
            .decode(account_key.key.trim())
            .map_err(|e| AzrmError::Signing(format!("account key is not valid base64: {e}")))?;

        Ok(Self {
            account: account.to_string(),
            key: Zeroizing::new(key),
        })
    }

    /// Base64 HMAC-SHA256 of the canonical string.
    pub fn sign(&self, request: &SigningRequest<'_>) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| AzrmError::Signing(e.to_string()))?;
        mac.update(string_to_sign(&self.account, request).as_bytes());

        Ok(BASE64_STANDARD.encode(mac.finalize().into_bytes()))
    }

    /// Value of the `Authorization` header for `request`.
    pub fn authorization(&self, request: &SigningRequest<'_>) -> Result<String> {
        Ok(format!("SharedKey {}:{}", self.account, self.sign(request)?))
    }
}

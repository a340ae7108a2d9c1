use anyhow::{Context, Result};
use serde::Deserialize;

use crate::types::Page;

/// `<EnumerationResults>` body of a List Blobs call. Only the fields the
/// pipeline needs are decoded; everything else is skipped.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EnumerationResults {
    #[serde(default)]
    blobs: Blobs,
    #[serde(default)]
    next_marker: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Blobs {
    #[serde(rename = "Blob", default)]
    blobs: Vec<Blob>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Blob {
    name: String,
}

/// Decode one listing page. An empty `<NextMarker />` ends the listing.
pub fn parse_list_blobs_response(body: &str) -> Result<Page> {
    let results: EnumerationResults =
        quick_xml::de::from_str(body).context("failed to parse the List Blobs response.")?;

    Ok(Page {
        names: results.blobs.blobs.into_iter().map(|blob| blob.name).collect(),
        next_marker: results.next_marker.filter(|marker| !marker.is_empty()),
    })
}

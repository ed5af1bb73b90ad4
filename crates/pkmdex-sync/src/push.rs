//! Upload of an export document to the web viewer.

use std::time::Duration;

use reqwest::Client;

use pkmdex_core::ExportDocument;

use crate::error::{SyncError, SyncResult};

/// POST `doc` as JSON to `url` with a bearer token.
///
/// Local state is never touched; any non-2xx answer is an error.
pub async fn push_export(
    doc: &ExportDocument,
    url: &str,
    api_key: &str,
    timeout: Duration,
) -> SyncResult<()> {
    let http = Client::builder()
        .timeout(timeout)
        .user_agent(concat!("pkmdex/", env!("CARGO_PKG_VERSION")))
        .build()?;

    log::info!(
        "Pushing {} owned entries to {}",
        doc.owned_entries.len(),
        url
    );
    let response = http
        .post(url)
        .bearer_auth(api_key)
        .json(doc)
        .send()
        .await
        .map_err(|e| SyncError::Push {
            url: url.to_string(),
            message: e.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SyncError::Push {
            url: url.to_string(),
            message: format!("HTTP {}: {}", status.as_u16(), body.chars().take(200).collect::<String>()),
        });
    }
    Ok(())
}

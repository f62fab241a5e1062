//! Download stage: turn a completed job into a spreadsheet URL.

use crate::api::ApiClient;
use crate::error::D2xError;
use tracing::{debug, warn};

/// Fetch the download URL of a completed job.
///
/// A response without `downloadUrl` is an error even when the HTTP call
/// itself succeeded.
pub async fn fetch_download_url(client: &ApiClient, job_id: &str) -> Result<String, D2xError> {
    let response = client.download_url(job_id).await?;
    debug!(
        "Download response for {}: status={} code={}",
        job_id, response.status, response.status_code
    );

    match response.download_url.filter(|u| !u.is_empty()) {
        Some(url) => Ok(url),
        None => {
            if let Some(reason) = response.error.as_deref().or(response.message.as_deref()) {
                warn!("No download URL for {}: {}", job_id, reason);
            }
            Err(D2xError::MissingDownloadUrl {
                job_id: job_id.to_string(),
            })
        }
    }
}

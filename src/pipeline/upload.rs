//! Upload stage: presigned URL, then a direct PUT to object storage.
//!
//! File bytes never pass through the application server. The API only hands
//! out a short-lived URL plus the storage key; the key is what job creation
//! refers to afterwards.

use crate::api::ApiClient;
use crate::error::D2xError;
use crate::pipeline::input::DocumentFile;
use tracing::{debug, info};

/// Upload `doc` and return its storage key.
pub async fn upload_document(client: &ApiClient, doc: DocumentFile) -> Result<String, D2xError> {
    let DocumentFile {
        file_name,
        content_type,
        bytes,
    } = doc;

    let target = client.request_upload_url(&file_name, &content_type).await?;
    debug!("Presigned target for {}: key={}", file_name, target.key);

    let size = bytes.len();
    client.upload_object(&target, &content_type, bytes).await?;
    info!("Uploaded {} ({} bytes) as {}", file_name, size, target.key);

    Ok(target.key)
}

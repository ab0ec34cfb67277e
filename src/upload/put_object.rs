//! PutObject handler
//!
//! Uploads one fully materialized member in a single request.

use crate::error::ExtractError;
use crate::location::Location;
use crate::metrics;
use crate::s3::ObjectStore;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Instant;

/// Direct-put uploader bound to a destination region
pub struct PutObjectHandler {
    store: Arc<dyn ObjectStore>,
    region: String,
}

impl PutObjectHandler {
    /// Create a new PutObject handler
    pub fn new(store: Arc<dyn ObjectStore>, region: impl Into<String>) -> Self {
        Self {
            store,
            region: region.into(),
        }
    }

    /// Upload `body` to `target`
    #[tracing::instrument(
        name = "upload.put_object",
        skip(self, body),
        fields(
            s3.bucket = %target.container,
            s3.key = %target.key,
            upload.bytes = body.len()
        ),
        err
    )]
    pub async fn upload(&self, target: &Location, body: Bytes) -> Result<(), ExtractError> {
        let bytes_written = body.len() as u64;
        let start_time = Instant::now();

        let result = self.store.put_object(target, &self.region, body).await;

        let duration = start_time.elapsed();
        metrics::record_upload_duration("put_object", duration.as_secs_f64());

        match result {
            Ok(response) => {
                metrics::record_upload_success(bytes_written);
                tracing::info!(
                    etag = ?response.etag,
                    bytes_written = bytes_written,
                    duration_ms = duration.as_millis(),
                    "PutObject upload completed"
                );
                Ok(())
            }
            Err(e) => {
                metrics::record_upload_failure();
                tracing::error!(
                    error = %e,
                    duration_ms = duration.as_millis(),
                    "PutObject upload failed"
                );
                Err(ExtractError::Upload {
                    key: target.key.clone(),
                    message: e.to_string(),
                })
            }
        }
    }
}

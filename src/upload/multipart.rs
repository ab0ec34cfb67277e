//! Multipart upload coordinator
//!
//! Drives the S3 multipart protocol for one destination object:
//!
//! ```text
//! open ──> Open(upload_id) ──upload_part*──> complete ──> Completed
//!                    │                           │ (failure)
//!                    └─────────── abort <────────┘──────> Aborted
//! ```
//!
//! Exactly one of `complete` or `abort` is issued per session. Parts are
//! produced from a single ordered stream, so `upload_part` is never called
//! concurrently and numbers are assigned sequentially from 1.

use crate::error::ExtractError;
use crate::location::Location;
use crate::metrics;
use crate::s3::{CompletedPart, ObjectStore};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Instant;

/// Minimum part size (5MB) - S3 requirement for every part but the last
pub const MIN_PART_SIZE: usize = 5 * 1024 * 1024;

/// Maximum parts allowed
pub const MAX_PARTS: u32 = 10000;

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Completed,
    Aborted,
}

/// Acknowledged part; `etag` is whatever the store returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartRecord {
    pub part_number: u32,
    pub etag: Option<String>,
}

/// An open multipart upload and its acknowledged parts
pub struct MultipartSession {
    store: Arc<dyn ObjectStore>,
    region: String,
    destination: Location,
    upload_id: String,
    parts: Vec<PartRecord>,
    next_part_number: u32,
    bytes_uploaded: u64,
    state: SessionState,
}

impl MultipartSession {
    /// Begin a multipart upload to `destination`
    #[tracing::instrument(
        name = "upload.multipart.create",
        skip(store),
        fields(
            s3.bucket = %destination.container,
            s3.key = %destination.key
        ),
        err
    )]
    pub async fn open(
        store: Arc<dyn ObjectStore>,
        destination: Location,
        region: &str,
    ) -> Result<Self, ExtractError> {
        let upload_id = store
            .create_multipart_upload(&destination, region)
            .await
            .map_err(|e| ExtractError::UploadInit(e.to_string()))?;

        tracing::info!(
            bucket = %destination.container,
            key = %destination.key,
            upload_id = %upload_id,
            "Created multipart upload"
        );

        Ok(Self {
            store,
            region: region.to_string(),
            destination,
            upload_id,
            parts: Vec::new(),
            next_part_number: 1,
            bytes_uploaded: 0,
            state: SessionState::Open,
        })
    }

    pub fn upload_id(&self) -> &str {
        &self.upload_id
    }

    pub fn destination(&self) -> &Location {
        &self.destination
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn parts(&self) -> &[PartRecord] {
        &self.parts
    }

    pub fn bytes_uploaded(&self) -> u64 {
        self.bytes_uploaded
    }

    /// Upload the next part, numbering it after the previous one
    #[tracing::instrument(
        name = "upload.multipart.upload_part",
        skip(self, body),
        fields(
            upload_id = %self.upload_id,
            part_number = self.next_part_number,
            upload.bytes = body.len()
        ),
        err
    )]
    pub async fn upload_part(&mut self, body: Bytes) -> Result<u32, ExtractError> {
        let part_number = self.next_part_number;
        self.ensure_open("upload part")
            .map_err(|message| ExtractError::UploadPart {
                part_number,
                message,
            })?;

        if part_number > MAX_PARTS {
            return Err(ExtractError::UploadPart {
                part_number,
                message: format!("exceeds the limit of {} parts", MAX_PARTS),
            });
        }

        let size = body.len();
        let start_time = Instant::now();
        let result = self
            .store
            .upload_part(
                &self.destination,
                &self.region,
                &self.upload_id,
                part_number,
                body,
            )
            .await;
        metrics::record_upload_duration("upload_part", start_time.elapsed().as_secs_f64());

        let response = result.map_err(|e| ExtractError::UploadPart {
            part_number,
            message: e.to_string(),
        })?;
        metrics::record_upload_bytes(size as u64);

        self.next_part_number += 1;
        self.bytes_uploaded += size as u64;
        self.record_part(part_number, response.etag);

        tracing::info!(
            upload_id = %self.upload_id,
            part_number = part_number,
            size = size,
            total_bytes = self.bytes_uploaded,
            "Uploaded part"
        );

        Ok(part_number)
    }

    /// Record the acknowledgement for `part_number`.
    ///
    /// Acknowledgements may be recorded in any order; `complete` sorts them.
    pub fn record_part(&mut self, part_number: u32, etag: Option<String>) {
        match self.parts.iter_mut().find(|p| p.part_number == part_number) {
            Some(existing) => existing.etag = etag,
            None => self.parts.push(PartRecord { part_number, etag }),
        }
    }

    /// Assemble the recorded parts, sorted by part number
    #[tracing::instrument(
        name = "upload.multipart.complete",
        skip(self),
        fields(
            upload_id = %self.upload_id,
            parts_count = self.parts.len()
        ),
        err
    )]
    pub async fn complete(&mut self) -> Result<(), ExtractError> {
        self.ensure_open("complete")
            .map_err(ExtractError::UploadComplete)?;

        if self.parts.is_empty() {
            return Err(ExtractError::UploadComplete("No parts uploaded".into()));
        }

        let mut parts = self
            .parts
            .iter()
            .map(|part| {
                part.etag
                    .clone()
                    .map(|etag| CompletedPart {
                        part_number: part.part_number,
                        etag,
                    })
                    .ok_or_else(|| {
                        ExtractError::UploadComplete(format!(
                            "part {} has no ETag",
                            part.part_number
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        parts.sort_by_key(|part| part.part_number);

        let parts_count = parts.len();
        self.store
            .complete_multipart_upload(&self.destination, &self.region, &self.upload_id, parts)
            .await
            .map_err(|e| ExtractError::UploadComplete(e.to_string()))?;

        self.state = SessionState::Completed;
        metrics::record_multipart_upload_success(parts_count);

        tracing::info!(
            upload_id = %self.upload_id,
            parts = parts_count,
            bytes = self.bytes_uploaded,
            "Completed multipart upload"
        );

        Ok(())
    }

    /// Abort the upload.
    ///
    /// Best effort: a failure is logged and swallowed so it never replaces
    /// the error that caused the abort. No-op once the session is finished.
    pub async fn abort(&mut self) {
        if self.state != SessionState::Open {
            return;
        }
        self.state = SessionState::Aborted;
        metrics::record_multipart_upload_failure();

        match self
            .store
            .abort_multipart_upload(&self.destination, &self.region, &self.upload_id)
            .await
        {
            Ok(()) => tracing::info!(
                upload_id = %self.upload_id,
                parts = self.parts.len(),
                "Aborted multipart upload"
            ),
            Err(e) => tracing::error!(
                upload_id = %self.upload_id,
                error = %e,
                "Failed to abort multipart upload"
            ),
        }
    }

    fn ensure_open(&self, action: &str) -> Result<(), String> {
        match self.state {
            SessionState::Open => Ok(()),
            state => Err(format!("cannot {} on a {:?} session", action, state)),
        }
    }
}

impl Drop for MultipartSession {
    fn drop(&mut self) {
        if self.state == SessionState::Open {
            tracing::warn!(
                upload_id = %self.upload_id,
                bucket = %self.destination.container,
                key = %self.destination.key,
                "Multipart upload dropped while open; it stays orphaned until aborted"
            );
        }
    }
}

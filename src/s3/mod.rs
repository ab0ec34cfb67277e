//! Object store module
//!
//! Defines the [`ObjectStore`] seam the extraction pipeline talks to, and the
//! production implementation backed by the AWS SDK.
//!
//! # Operations
//!
//! | Operation | Span Name | Used by |
//! |-----------|-----------|---------|
//! | GetObject | `s3.get_object` | source read |
//! | PutObject | `s3.put_object` | direct-put of each member |
//! | CreateMultipartUpload | `s3.create_multipart_upload` | large gzip path |
//! | UploadPart | `s3.upload_part` | large gzip path |
//! | CompleteMultipartUpload | `s3.complete_multipart_upload` | large gzip path |
//! | AbortMultipartUpload | `s3.abort_multipart_upload` | failure unwinding |

use crate::location::Location;
use async_trait::async_trait;
use bytes::Bytes;
use std::pin::Pin;
use thiserror::Error;
use tokio::io::AsyncRead;

mod client;

pub use client::S3Store;

/// Object store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Request error: {0}")]
    RequestError(String),

    #[error("Response error: {0}")]
    ResponseError(String),
}

/// Readable body of a fetched object
pub type ByteReader = Pin<Box<dyn AsyncRead + Send>>;

/// Fetched object: its body and the size the store declared for it
pub struct ObjectBody {
    pub reader: ByteReader,
    pub declared_size: u64,
}

impl std::fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectBody")
            .field("reader", &"dyn AsyncRead")
            .field("declared_size", &self.declared_size)
            .finish()
    }
}

/// PutObject response
#[derive(Debug, Clone)]
pub struct PutObjectResponse {
    pub etag: Option<String>,
}

/// UploadPart response
#[derive(Debug, Clone)]
pub struct UploadPartResponse {
    pub etag: Option<String>,
}

/// Part presented to CompleteMultipartUpload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    pub part_number: u32,
    pub etag: String,
}

/// Storage operations the extraction pipeline depends on
///
/// Every call names the region explicitly; source and destination may live
/// in different regions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Open an object for streaming reads
    async fn get_object(&self, location: &Location, region: &str)
        -> Result<ObjectBody, StoreError>;

    /// Upload a complete object in one request
    async fn put_object(
        &self,
        location: &Location,
        region: &str,
        body: Bytes,
    ) -> Result<PutObjectResponse, StoreError>;

    /// Begin a multipart upload, returning its upload id
    async fn create_multipart_upload(
        &self,
        location: &Location,
        region: &str,
    ) -> Result<String, StoreError>;

    /// Upload one part of an open multipart upload
    async fn upload_part(
        &self,
        location: &Location,
        region: &str,
        upload_id: &str,
        part_number: u32,
        body: Bytes,
    ) -> Result<UploadPartResponse, StoreError>;

    /// Assemble the uploaded parts into the final object
    async fn complete_multipart_upload(
        &self,
        location: &Location,
        region: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<(), StoreError>;

    /// Discard an open multipart upload and its parts
    async fn abort_multipart_upload(
        &self,
        location: &Location,
        region: &str,
        upload_id: &str,
    ) -> Result<(), StoreError>;
}

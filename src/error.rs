//! Extraction error taxonomy
//!
//! Every failure in the pipeline surfaces as an [`ExtractError`]. The
//! responder is the only place that turns one into a status code.

use thiserror::Error;

/// Extraction errors
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Malformed locator: {0}")]
    MalformedLocator(String),

    #[error("{0}")]
    UnsupportedFormat(String),

    #[error("Failed to read source object: {0}")]
    SourceRead(String),

    #[error("Archive decode error: {0}")]
    ArchiveDecode(String),

    #[error("Decompression error: {0}")]
    Decompression(String),

    #[error("Upload failed for {key}: {message}")]
    Upload { key: String, message: String },

    #[error("Failed to start multipart upload: {0}")]
    UploadInit(String),

    #[error("Failed to upload part {part_number}: {message}")]
    UploadPart { part_number: u32, message: String },

    #[error("Failed to complete multipart upload: {0}")]
    UploadComplete(String),
}

impl ExtractError {
    /// Error class reported as `errorType` in failure envelopes
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "InvalidRequestError",
            Self::MalformedLocator(_) => "MalformedLocatorError",
            Self::UnsupportedFormat(_) => "UnsupportedFormatError",
            Self::SourceRead(_) => "SourceReadError",
            Self::ArchiveDecode(_) => "ArchiveDecodeError",
            Self::Decompression(_) => "DecompressionError",
            Self::Upload { .. } => "UploadError",
            Self::UploadInit(_) => "UploadInitError",
            Self::UploadPart { .. } => "UploadPartError",
            Self::UploadComplete(_) => "UploadCompleteError",
        }
    }

    /// Whether the failure stems from malformed or missing caller input
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest(_) | Self::MalformedLocator(_) | Self::UnsupportedFormat(_)
        )
    }

    /// HTTP-style status for this error
    pub fn status_code(&self) -> u16 {
        if self.is_client_error() {
            400
        } else {
            500
        }
    }
}

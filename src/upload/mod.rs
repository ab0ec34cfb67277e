//! Upload module
//!
//! Writes extracted members to the destination: one PutObject per member, or
//! a multipart upload for the streamed output of a large gzip object.

use crate::config::ExtractConfig;

pub mod multipart;
pub mod put_object;

/// How the output of a source object is written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStrategy {
    Direct,
    MultiPart,
}

/// Upload strategy chosen once per source object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadPlan {
    pub strategy: UploadStrategy,
    pub part_size_bytes: usize,
}

impl UploadPlan {
    /// Choose a plan from the source object's declared size.
    ///
    /// The declared size is the compressed size; the decompressed size is not
    /// known before reading. Objects strictly larger than the threshold go
    /// multipart.
    pub fn select(source_byte_size: u64, config: &ExtractConfig) -> Self {
        let strategy = if source_byte_size > config.multipart_threshold {
            UploadStrategy::MultiPart
        } else {
            UploadStrategy::Direct
        };

        Self {
            strategy,
            part_size_bytes: config.part_size,
        }
    }
}

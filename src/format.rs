//! Archive format detection from the source key suffix

use crate::error::ExtractError;
use serde::Serialize;
use std::fmt;

/// Extraction strategy selected for a source object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ArchiveFormat {
    #[serde(rename = ".zip")]
    Zip,
    #[serde(rename = ".gz")]
    Gzip,
    #[serde(rename = ".tar.gz")]
    TarGzip,
}

impl ArchiveFormat {
    /// Pick the format for `source_key`.
    ///
    /// `.tar.gz` is checked before `.gz`; a tarball must never reach the
    /// single-member gzip engine.
    pub fn detect(source_key: &str) -> Result<Self, ExtractError> {
        let lower = source_key.to_ascii_lowercase();

        if lower.ends_with(".tar.gz") {
            Ok(Self::TarGzip)
        } else if lower.ends_with(".gz") {
            Ok(Self::Gzip)
        } else if lower.ends_with(".zip") {
            Ok(Self::Zip)
        } else {
            Err(ExtractError::UnsupportedFormat(format!(
                "Unsupported file extension: '{}'. Only .zip, .gz, and .tar.gz files are supported",
                Self::suffix_of(source_key)
            )))
        }
    }

    /// Suffix reported back to callers (`fileType` in the response)
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Zip => ".zip",
            Self::Gzip => ".gz",
            Self::TarGzip => ".tar.gz",
        }
    }

    /// Label used for metrics and log fields
    pub fn label(&self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::Gzip => "gzip",
            Self::TarGzip => "tar_gzip",
        }
    }

    fn suffix_of(key: &str) -> &str {
        let file_name = key.rsplit('/').next().unwrap_or(key);
        match file_name.rfind('.') {
            Some(idx) if idx > 0 => &file_name[idx..],
            _ => file_name,
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

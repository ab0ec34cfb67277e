//! Unpackr Library
//!
//! Extracts archives stored in S3 into another S3 location.
//!
//! # Features
//!
//! - **Formats**: `.zip`, `.gz` and `.tar.gz`, chosen by the source key suffix
//! - **Streaming**: Decoders pull the source body on demand with backpressure
//! - **Large Gzip**: Multipart upload in fixed-size parts above a size threshold
//! - **Cross-Region**: Independent source and destination regions
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use unpackr::{config::Config, pipeline::{ExtractJob, Extractor}, s3::S3Store};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let store = S3Store::from_env(&config.s3).await;
//!     let extractor = Extractor::new(Arc::new(store), config.extract);
//!
//!     let result = extractor
//!         .run(&ExtractJob {
//!             source_uri: "s3://incoming/batch.tar.gz".into(),
//!             destination_uri: "s3://extracted/batch/".into(),
//!             source_region: "us-east-1".into(),
//!             destination_region: "us-east-1".into(),
//!         })
//!         .await?;
//!     println!("{:?}", result.processed_files);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod format;
pub mod handler;
pub mod location;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod s3;
pub mod upload;

// Re-export commonly used types
pub use config::Config;
pub use error::ExtractError;
pub use format::ArchiveFormat;
pub use handler::Handler;
pub use location::Location;
pub use pipeline::{ExtractJob, Extractor, ProcessingResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

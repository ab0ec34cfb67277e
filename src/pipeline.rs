//! Extraction pipeline
//!
//! Ties the pieces together for one job: parse both locators, pick an
//! engine from the source suffix, stream the source object through it and
//! upload what comes out, collecting member names as uploads succeed.
//!
//! Members are processed strictly one at a time. A failure anywhere aborts
//! the job; members uploaded before the failure stay in the destination.

use crate::config::ExtractConfig;
use crate::error::ExtractError;
use crate::extract::{self, gzip, ArchiveMember, Decoded};
use crate::format::ArchiveFormat;
use crate::location::Location;
use crate::metrics;
use crate::s3::ObjectStore;
use crate::upload::multipart::MultipartSession;
use crate::upload::put_object::PutObjectHandler;
use crate::upload::{UploadPlan, UploadStrategy};
use bytes::{Bytes, BytesMut};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// One extraction request, regions already resolved
#[derive(Debug, Clone)]
pub struct ExtractJob {
    pub source_uri: String,
    pub destination_uri: String,
    pub source_region: String,
    pub destination_region: String,
}

/// Outcome of a successful job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResult {
    pub processed_files: Vec<String>,
    pub file_type: ArchiveFormat,
}

/// Runs extraction jobs against an injected object store
pub struct Extractor {
    store: Arc<dyn ObjectStore>,
    config: ExtractConfig,
}

impl Extractor {
    pub fn new(store: Arc<dyn ObjectStore>, config: ExtractConfig) -> Self {
        Self { store, config }
    }

    /// Run one job to completion
    #[tracing::instrument(
        name = "extract.job",
        skip(self),
        fields(
            source = %job.source_uri,
            destination = %job.destination_uri,
            format = tracing::field::Empty
        ),
        err
    )]
    pub async fn run(&self, job: &ExtractJob) -> Result<ProcessingResult, ExtractError> {
        let source = Location::parse_object(&job.source_uri)?;
        let destination = Location::parse(&job.destination_uri)?;
        let format = ArchiveFormat::detect(&source.key)?;
        tracing::Span::current().record("format", format.label());

        let start = Instant::now();
        let result = self.process(job, &source, &destination, format).await;
        let duration = start.elapsed().as_secs_f64();

        match &result {
            Ok(processed) => {
                metrics::record_extraction(
                    format.label(),
                    true,
                    processed.processed_files.len(),
                    duration,
                );
                tracing::info!(
                    files = processed.processed_files.len(),
                    duration_ms = (duration * 1000.0) as u64,
                    "Extraction completed"
                );
            }
            Err(_) => metrics::record_extraction(format.label(), false, 0, duration),
        }

        result
    }

    async fn process(
        &self,
        job: &ExtractJob,
        source: &Location,
        destination: &Location,
        format: ArchiveFormat,
    ) -> Result<ProcessingResult, ExtractError> {
        let object = self
            .store
            .get_object(source, &job.source_region)
            .await
            .map_err(|e| ExtractError::SourceRead(e.to_string()))?;

        tracing::info!(
            bucket = %source.container,
            key = %source.key,
            declared_size = object.declared_size,
            format = %format,
            "Retrieved source object"
        );

        let capacity = self.config.channel_capacity;
        let uploader = PutObjectHandler::new(Arc::clone(&self.store), &job.destination_region);

        let processed_files = match format {
            ArchiveFormat::Zip => {
                let members = extract::zip::extract(object.reader, capacity);
                self.upload_members(members, destination, &uploader).await?
            }
            ArchiveFormat::TarGzip => {
                let members = extract::tar_gz::extract(object.reader, capacity);
                self.upload_members(members, destination, &uploader).await?
            }
            ArchiveFormat::Gzip => {
                let name = gzip::member_name(source.file_name());
                let plan = UploadPlan::select(object.declared_size, &self.config);
                tracing::info!(
                    strategy = ?plan.strategy,
                    part_size = plan.part_size_bytes,
                    "Selected upload strategy"
                );

                match plan.strategy {
                    UploadStrategy::Direct => {
                        let members = gzip::decode_whole(object.reader, name);
                        self.upload_members(members, destination, &uploader).await?
                    }
                    UploadStrategy::MultiPart => {
                        let chunks = gzip::decode_chunks(
                            object.reader,
                            self.config.read_chunk_size,
                            capacity,
                        );
                        let target = destination.child(&name);
                        self.upload_multipart(chunks, target, &job.destination_region, plan)
                            .await?;
                        vec![name]
                    }
                }
            }
        };

        Ok(ProcessingResult {
            processed_files,
            file_type: format,
        })
    }

    /// Direct-put every file member, in order; directories are skipped
    async fn upload_members(
        &self,
        mut members: Decoded<ArchiveMember>,
        destination: &Location,
        uploader: &PutObjectHandler,
    ) -> Result<Vec<String>, ExtractError> {
        let mut processed = Vec::new();

        while let Some(member) = members.next().await {
            let member = member?;
            if member.is_directory {
                tracing::debug!(entry = %member.name, "Skipped directory");
                continue;
            }

            let target = destination.child(&member.name);
            if target.key.is_empty() {
                tracing::warn!(entry = %member.name, "Skipped member with empty name");
                continue;
            }

            tracing::info!(
                entry = %member.name,
                bucket = %target.container,
                key = %target.key,
                size = member.content.len(),
                "Extracting member"
            );
            uploader.upload(&target, member.content).await?;
            processed.push(member.name);
        }

        Ok(processed)
    }

    /// Slice a decompressed chunk stream into parts and upload them.
    ///
    /// Only one part's worth of bytes is buffered. Any failure after the
    /// session opened, including a failed complete, aborts it before the
    /// original error is returned.
    async fn upload_multipart(
        &self,
        mut chunks: Decoded<Bytes>,
        target: Location,
        region: &str,
        plan: UploadPlan,
    ) -> Result<(), ExtractError> {
        let part_size = plan.part_size_bytes;
        let mut session = MultipartSession::open(Arc::clone(&self.store), target, region).await?;

        let outcome = async {
            let mut buffer = BytesMut::with_capacity(part_size);
            while let Some(chunk) = chunks.next().await {
                buffer.extend_from_slice(&chunk?);
                while buffer.len() >= part_size {
                    let part = buffer.split_to(part_size).freeze();
                    session.upload_part(part).await?;
                }
            }

            // The trailing remainder may be undersized; S3 allows that for
            // the last part only. An empty object still needs one part.
            if !buffer.is_empty() || session.parts().is_empty() {
                session.upload_part(buffer.freeze()).await?;
            }

            session.complete().await
        }
        .await;

        if let Err(err) = outcome {
            session.abort().await;
            return Err(err);
        }

        Ok(())
    }
}

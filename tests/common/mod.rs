//! Common Test Infrastructure
//!
//! Provides shared utilities for the integration tests:
//! - In-memory object store that records every call
//! - Archive builders (zip, gzip, tar.gz)
//! - Job helpers

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use flate2::write::GzEncoder;
use flate2::Compression;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::io::{self, Cursor, Write};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use unpackr::location::Location;
use unpackr::pipeline::ExtractJob;
use unpackr::s3::{
    CompletedPart, ObjectBody, ObjectStore, PutObjectResponse, StoreError, UploadPartResponse,
};

pub const MIB: usize = 1024 * 1024;

/// Default region used by test jobs
pub const REGION: &str = "us-east-1";

/// One recorded store call
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Get { key: String, region: String },
    Put { key: String, region: String, len: usize },
    Create { key: String },
    UploadPart { upload_id: String, part_number: u32, len: usize },
    Complete { upload_id: String, part_numbers: Vec<u32> },
    Abort { upload_id: String },
}

#[derive(Default)]
struct Sessions {
    next_id: u32,
    parts: HashMap<String, Vec<(u32, Bytes)>>,
    keys: HashMap<String, String>,
}

/// In-memory object store
///
/// Objects are keyed `container/key`. Completing a multipart upload stores
/// the concatenated parts like S3 would.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, Bytes>>,
    declared_sizes: Mutex<HashMap<String, u64>>,
    broken_bodies: Mutex<HashSet<String>>,
    calls: Mutex<Vec<Call>>,
    sessions: Mutex<Sessions>,
    fail_abort: bool,
    fail_part: Option<u32>,
    omit_etag_for_part: Option<u32>,
    fail_put_for_key: Option<String>,
}

fn object_key(location: &Location) -> String {
    format!("{}/{}", location.container, location.key)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every abort fails
    pub fn with_failing_abort(mut self) -> Self {
        self.fail_abort = true;
        self
    }

    /// UploadPart for `part_number` fails
    pub fn with_failing_part(mut self, part_number: u32) -> Self {
        self.fail_part = Some(part_number);
        self
    }

    /// `part_number` is acknowledged without an ETag
    pub fn with_missing_etag(mut self, part_number: u32) -> Self {
        self.omit_etag_for_part = Some(part_number);
        self
    }

    /// The PutObject for destination `key` fails
    pub fn with_failing_put(mut self, key: &str) -> Self {
        self.fail_put_for_key = Some(key.to_string());
        self
    }

    /// Seed a source object
    pub fn insert(&self, uri: &str, body: impl Into<Bytes>) {
        let location = Location::parse_object(uri).unwrap();
        self.objects.lock().insert(object_key(&location), body.into());
    }

    /// Seed a source object that reports a different size than its body
    pub fn insert_with_declared_size(&self, uri: &str, body: impl Into<Bytes>, size: u64) {
        self.insert(uri, body);
        let location = Location::parse_object(uri).unwrap();
        self.declared_sizes.lock().insert(object_key(&location), size);
    }

    /// Seed a source object whose body read fails once `body` is exhausted
    pub fn insert_with_broken_body(&self, uri: &str, body: impl Into<Bytes>, size: u64) {
        self.insert_with_declared_size(uri, body, size);
        let location = Location::parse_object(uri).unwrap();
        self.broken_bodies.lock().insert(object_key(&location));
    }

    /// Stored object content, if any
    pub fn object(&self, uri: &str) -> Option<Bytes> {
        let location = Location::parse_object(uri).unwrap();
        self.objects.lock().get(&object_key(&location)).cloned()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Keys written through PutObject, in call order
    pub fn put_keys(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Put { key, .. } => Some(key),
                _ => None,
            })
            .collect()
    }

    /// (part number, length) of every UploadPart, in call order
    pub fn uploaded_parts(&self) -> Vec<(u32, usize)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::UploadPart {
                    part_number, len, ..
                } => Some((part_number, len)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get_object(
        &self,
        location: &Location,
        region: &str,
    ) -> Result<ObjectBody, StoreError> {
        self.record(Call::Get {
            key: location.key.clone(),
            region: region.to_string(),
        });

        let key = object_key(location);
        let body = self
            .objects
            .lock()
            .get(&key)
            .cloned()
            .ok_or_else(|| StoreError::RequestError(format!("NoSuchKey: {}", key)))?;
        let declared_size = self
            .declared_sizes
            .lock()
            .get(&key)
            .copied()
            .unwrap_or(body.len() as u64);

        let reader: unpackr::s3::ByteReader = if self.broken_bodies.lock().contains(&key) {
            Box::pin(Cursor::new(body).chain(ConnectionReset))
        } else {
            Box::pin(Cursor::new(body))
        };

        Ok(ObjectBody {
            reader,
            declared_size,
        })
    }

    async fn put_object(
        &self,
        location: &Location,
        region: &str,
        body: Bytes,
    ) -> Result<PutObjectResponse, StoreError> {
        self.record(Call::Put {
            key: location.key.clone(),
            region: region.to_string(),
            len: body.len(),
        });

        if self.fail_put_for_key.as_deref() == Some(location.key.as_str()) {
            return Err(StoreError::ResponseError("SlowDown".into()));
        }

        self.objects.lock().insert(object_key(location), body);
        Ok(PutObjectResponse {
            etag: Some("\"put-etag\"".into()),
        })
    }

    async fn create_multipart_upload(
        &self,
        location: &Location,
        _region: &str,
    ) -> Result<String, StoreError> {
        self.record(Call::Create {
            key: location.key.clone(),
        });

        let mut sessions = self.sessions.lock();
        sessions.next_id += 1;
        let upload_id = format!("upload-{}", sessions.next_id);
        sessions.parts.insert(upload_id.clone(), Vec::new());
        sessions
            .keys
            .insert(upload_id.clone(), object_key(location));
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        _location: &Location,
        _region: &str,
        upload_id: &str,
        part_number: u32,
        body: Bytes,
    ) -> Result<UploadPartResponse, StoreError> {
        self.record(Call::UploadPart {
            upload_id: upload_id.to_string(),
            part_number,
            len: body.len(),
        });

        if self.fail_part == Some(part_number) {
            return Err(StoreError::ResponseError("InternalError".into()));
        }

        let mut sessions = self.sessions.lock();
        let parts = sessions
            .parts
            .get_mut(upload_id)
            .ok_or_else(|| StoreError::ResponseError("NoSuchUpload".into()))?;
        parts.push((part_number, body));

        let etag = if self.omit_etag_for_part == Some(part_number) {
            None
        } else {
            Some(format!("\"etag-{}\"", part_number))
        };
        Ok(UploadPartResponse { etag })
    }

    async fn complete_multipart_upload(
        &self,
        _location: &Location,
        _region: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> Result<(), StoreError> {
        self.record(Call::Complete {
            upload_id: upload_id.to_string(),
            part_numbers: parts.iter().map(|p| p.part_number).collect(),
        });

        let mut sessions = self.sessions.lock();
        let uploaded = sessions
            .parts
            .remove(upload_id)
            .ok_or_else(|| StoreError::ResponseError("NoSuchUpload".into()))?;
        let key = sessions.keys.remove(upload_id).unwrap_or_default();
        drop(sessions);

        let mut body = BytesMut::new();
        for part in &parts {
            let (_, bytes) = uploaded
                .iter()
                .find(|(n, _)| *n == part.part_number)
                .ok_or_else(|| StoreError::ResponseError("InvalidPart".into()))?;
            body.extend_from_slice(bytes);
        }
        self.objects.lock().insert(key, body.freeze());
        Ok(())
    }

    async fn abort_multipart_upload(
        &self,
        _location: &Location,
        _region: &str,
        upload_id: &str,
    ) -> Result<(), StoreError> {
        self.record(Call::Abort {
            upload_id: upload_id.to_string(),
        });

        if self.fail_abort {
            return Err(StoreError::RequestError("connection reset".into()));
        }
        self.sessions.lock().parts.remove(upload_id);
        Ok(())
    }
}

/// Body reader whose every read fails
struct ConnectionReset;

impl AsyncRead for ConnectionReset {
    fn poll_read(
        self: Pin<&mut Self>,
        _: &mut Context<'_>,
        _: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "connection reset by peer",
        )))
    }
}

// ============================================================================
// Archive builders
// ============================================================================

/// Build a zip archive; `None` content marks a directory entry
pub fn zip_archive(entries: &[(&str, Option<&[u8]>)]) -> Vec<u8> {
    use zip::write::SimpleFileOptions;

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, content) in entries {
        match content {
            Some(content) => {
                writer.start_file(*name, options).unwrap();
                writer.write_all(content).unwrap();
            }
            None => writer.add_directory(*name, options).unwrap(),
        }
    }
    writer.finish().unwrap().into_inner()
}

/// Build a deflated zip the way streaming writers do: general purpose flag
/// bit 3 set, zero sizes and CRC in every local header, the real values in
/// a data descriptor after each entry's data.
pub fn zip_archive_with_data_descriptors(entries: &[(&str, &[u8])]) -> Vec<u8> {
    use flate2::write::DeflateEncoder;

    const FLAGS: u16 = 0x0008;
    const DEFLATE: u16 = 8;
    const DOS_DATE: u16 = (1 << 5) | 1;

    let mut out = Vec::new();
    let mut central = Vec::new();

    for (name, content) in entries {
        let offset = out.len() as u32;
        let mut crc = flate2::Crc::new();
        crc.update(content);
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(content).unwrap();
        let compressed = encoder.finish().unwrap();

        out.extend_from_slice(&0x0403_4b50u32.to_le_bytes());
        out.extend_from_slice(&20u16.to_le_bytes());
        out.extend_from_slice(&FLAGS.to_le_bytes());
        out.extend_from_slice(&DEFLATE.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&DOS_DATE.to_le_bytes());
        out.extend_from_slice(&[0u8; 12]);
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(&compressed);

        out.extend_from_slice(&0x0807_4b50u32.to_le_bytes());
        out.extend_from_slice(&crc.sum().to_le_bytes());
        out.extend_from_slice(&(compressed.len() as u32).to_le_bytes());
        out.extend_from_slice(&(content.len() as u32).to_le_bytes());

        central.extend_from_slice(&0x0201_4b50u32.to_le_bytes());
        central.extend_from_slice(&20u16.to_le_bytes());
        central.extend_from_slice(&20u16.to_le_bytes());
        central.extend_from_slice(&FLAGS.to_le_bytes());
        central.extend_from_slice(&DEFLATE.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&DOS_DATE.to_le_bytes());
        central.extend_from_slice(&crc.sum().to_le_bytes());
        central.extend_from_slice(&(compressed.len() as u32).to_le_bytes());
        central.extend_from_slice(&(content.len() as u32).to_le_bytes());
        central.extend_from_slice(&(name.len() as u16).to_le_bytes());
        // extra, comment, disk, internal and external attributes
        central.extend_from_slice(&[0u8; 12]);
        central.extend_from_slice(&offset.to_le_bytes());
        central.extend_from_slice(name.as_bytes());
    }

    let central_offset = out.len() as u32;
    out.extend_from_slice(&central);

    out.extend_from_slice(&0x0605_4b50u32.to_le_bytes());
    out.extend_from_slice(&[0u8; 4]);
    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    out.extend_from_slice(&(central.len() as u32).to_le_bytes());
    out.extend_from_slice(&central_offset.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out
}

/// Gzip-compress `data` as a single member
pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Build a tar.gz archive; `None` content marks a directory entry
pub fn tar_gz_archive(entries: &[(&str, Option<&[u8]>)]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, content) in entries {
        let mut header = tar::Header::new_gnu();
        match content {
            Some(content) => {
                header.set_entry_type(tar::EntryType::Regular);
                header.set_size(content.len() as u64);
                header.set_mode(0o644);
                header.set_cksum();
                builder.append_data(&mut header, name, *content).unwrap();
            }
            None => {
                header.set_entry_type(tar::EntryType::Directory);
                header.set_size(0);
                header.set_mode(0o755);
                header.set_cksum();
                builder
                    .append_data(&mut header, name, std::io::empty())
                    .unwrap();
            }
        }
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// Deterministic, poorly compressible test data
pub fn pseudo_random(len: usize) -> Vec<u8> {
    let mut state: u32 = 0x9e37_79b9;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state >> 24) as u8
        })
        .collect()
}

pub fn job(source: &str, destination: &str) -> ExtractJob {
    ExtractJob {
        source_uri: source.to_string(),
        destination_uri: destination.to_string(),
        source_region: REGION.to_string(),
        destination_region: REGION.to_string(),
    }
}

//! Gzip engine
//!
//! A `.gz` object decompresses to exactly one member. The small path yields
//! it whole; the large path yields the decompressed bytes as a stream of
//! chunks for the multipart uploader to slice into parts.

use super::{ArchiveMember, Decoded, Emitter, Fault};
use crate::error::ExtractError;
use crate::s3::ByteReader;
use bytes::Bytes;
use flate2::read::MultiGzDecoder;
use std::io::Read;

/// Name of the single member: the source file name without its `.gz` suffix
pub fn member_name(source_file_name: &str) -> String {
    let len = source_file_name.len();
    if len > 3 && source_file_name.is_char_boundary(len - 3) {
        let (stem, suffix) = source_file_name.split_at(len - 3);
        if suffix.eq_ignore_ascii_case(".gz") {
            return stem.to_string();
        }
    }
    source_file_name.to_string()
}

/// Decompress the whole object into one in-memory member.
pub fn decode_whole(reader: ByteReader, name: String) -> Decoded<ArchiveMember> {
    Decoded::spawn(reader, 1, move |source, out, fault| {
        let mut decoder = fault.tap_decoder(MultiGzDecoder::new(source));
        let mut content = Vec::new();
        decoder
            .read_to_end(&mut content)
            .map_err(|err| fault.classify(err, ExtractError::Decompression))?;

        tracing::info!(
            member = %name,
            decompressed_bytes = content.len(),
            "Decompressed gzip object"
        );
        out.emit(ArchiveMember::file(name, content));
        Ok(())
    })
}

/// Decompress the object as a stream of chunks of at most `chunk_size` bytes.
pub fn decode_chunks(reader: ByteReader, chunk_size: usize, capacity: usize) -> Decoded<Bytes> {
    Decoded::spawn(reader, capacity, move |source, out, fault| {
        pump(
            fault.tap_decoder(MultiGzDecoder::new(source)),
            chunk_size,
            out,
            fault,
        )
    })
}

fn pump<R: Read>(
    mut decoder: R,
    chunk_size: usize,
    out: &Emitter<Bytes>,
    fault: &Fault,
) -> Result<(), ExtractError> {
    let mut total: u64 = 0;
    loop {
        let mut chunk = vec![0u8; chunk_size.max(1)];
        let n = decoder
            .read(&mut chunk)
            .map_err(|err| fault.classify(err, ExtractError::Decompression))?;
        if n == 0 {
            tracing::debug!(decompressed_bytes = total, "Gzip stream finished");
            return Ok(());
        }

        chunk.truncate(n);
        total += n as u64;
        if !out.emit(Bytes::from(chunk)) {
            return Ok(());
        }
    }
}

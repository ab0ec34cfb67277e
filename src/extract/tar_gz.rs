//! Tar+gzip engine
//!
//! Gunzips the object and walks the tar stream inside it. Regular files are
//! yielded whole in stream order; directories are yielded flagged; links,
//! devices and other special entries are skipped.

use super::{initial_capacity, ArchiveMember, Decoded, Emitter, Fault};
use crate::error::ExtractError;
use crate::s3::ByteReader;
use flate2::read::MultiGzDecoder;
use std::io::Read;

/// Stream the members of a `.tar.gz` archive.
pub fn extract(reader: ByteReader, capacity: usize) -> Decoded<ArchiveMember> {
    Decoded::spawn(reader, capacity, |source, out, fault| {
        let decoder = fault.tap_decoder(MultiGzDecoder::new(source));
        walk(decoder, out, fault)
    })
}

fn walk<R: Read>(
    decoder: R,
    out: &Emitter<ArchiveMember>,
    fault: &Fault,
) -> Result<(), ExtractError> {
    let mut archive = tar::Archive::new(decoder);
    let entries = archive
        .entries()
        .map_err(|err| fault.classify(err, ExtractError::ArchiveDecode))?;

    for entry in entries {
        let mut entry = entry.map_err(|err| fault.classify(err, ExtractError::ArchiveDecode))?;
        let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
        let entry_type = entry.header().entry_type();

        let member = if entry_type.is_file() {
            let declared = entry.header().size().unwrap_or(0);
            let mut content = Vec::with_capacity(initial_capacity(declared));
            entry.read_to_end(&mut content).map_err(|err| {
                fault.classify(
                    format!("entry '{}': {}", name, err),
                    ExtractError::ArchiveDecode,
                )
            })?;
            tracing::debug!(entry = %name, size = content.len(), "Decoded tar entry");
            ArchiveMember::file(name, content)
        } else if entry_type.is_dir() {
            ArchiveMember::directory(name)
        } else {
            // Unread entry data is skipped when the iterator advances.
            tracing::debug!(entry = %name, entry_type = ?entry_type, "Skipped tar entry");
            continue;
        };

        if !out.emit(member) {
            return Ok(());
        }
    }

    Ok(())
}

//! Zip engine
//!
//! The central directory sits at the end of a zip and is the only place
//! that reliably records entry sizes: streaming writers set the data
//! descriptor flag and leave the local header sizes zero. The body is
//! spooled to an anonymous temp file first, then entries are read one at a
//! time in central directory order.

use super::{initial_capacity, ArchiveMember, Decoded, Emitter, Fault};
use crate::error::ExtractError;
use crate::s3::ByteReader;
use ::zip::ZipArchive;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};

/// Stream the members of a zip archive.
pub fn extract(reader: ByteReader, capacity: usize) -> Decoded<ArchiveMember> {
    Decoded::spawn(reader, capacity, |source, out, fault| {
        let spool = spool(source, fault)?;
        walk(spool, out)
    })
}

/// Copy the whole body into an unlinked temp file, rewound to the start
fn spool<R: Read>(mut reader: R, fault: &Fault) -> Result<File, ExtractError> {
    let mut file = tempfile::tempfile()
        .map_err(|err| ExtractError::ArchiveDecode(format!("cannot create spool file: {}", err)))?;

    let size = io::copy(&mut reader, &mut file).map_err(|err| {
        fault.classify(format!("spooling archive: {}", err), ExtractError::ArchiveDecode)
    })?;
    file.seek(SeekFrom::Start(0))
        .map_err(|err| ExtractError::ArchiveDecode(format!("rewinding spool file: {}", err)))?;

    tracing::debug!(size, "Spooled zip archive");
    Ok(file)
}

fn walk<R: Read + Seek>(reader: R, out: &Emitter<ArchiveMember>) -> Result<(), ExtractError> {
    let mut archive = ZipArchive::new(BufReader::new(reader))
        .map_err(|err| ExtractError::ArchiveDecode(err.to_string()))?;

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|err| ExtractError::ArchiveDecode(err.to_string()))?;

        let name = entry.name().to_string();
        let member = if entry.is_dir() {
            tracing::debug!(entry = %name, "Skipped zip directory entry");
            ArchiveMember::directory(name)
        } else {
            let mut content = Vec::with_capacity(initial_capacity(entry.size()));
            entry.read_to_end(&mut content).map_err(|err| {
                ExtractError::ArchiveDecode(format!("entry '{}': {}", name, err))
            })?;
            tracing::debug!(entry = %name, size = content.len(), "Decoded zip entry");
            ArchiveMember::file(name, content)
        };
        drop(entry);

        if !out.emit(member) {
            return Ok(());
        }
    }

    Ok(())
}

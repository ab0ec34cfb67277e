//! Decompression and demultiplexing engines
//!
//! The `flate2`, `tar` and `zip` decoders are blocking. Each engine runs its
//! decoder on a `spawn_blocking` worker that reads the object body through
//! [`SyncIoBridge`] and hands results to the async side over a bounded
//! channel. [`Decoded`] is the consumer's end: a lazy sequence pulled with
//! [`Decoded::next`].
//!
//! The worker blocks whenever the channel is full, so compressed input is
//! only pulled as fast as the uploader drains decoded output.
//!
//! ```text
//! S3 body ──> SyncIoBridge ──> decoder (blocking worker) ──mpsc──> uploader
//! ```

use crate::error::ExtractError;
use crate::s3::ByteReader;
use bytes::Bytes;
use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::io::SyncIoBridge;

pub mod gzip;
pub mod tar_gz;
pub mod zip;

/// One entry produced by an engine
#[derive(Debug, Clone)]
pub struct ArchiveMember {
    pub name: String,
    pub content: Bytes,
    pub is_directory: bool,
}

impl ArchiveMember {
    /// A regular file entry
    pub fn file(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            is_directory: false,
        }
    }

    /// A directory entry; carries no content
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: Bytes::new(),
            is_directory: true,
        }
    }
}

/// Lazy sequence of items produced by a blocking decoder
pub struct Decoded<T> {
    rx: mpsc::Receiver<Result<T, ExtractError>>,
    worker: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> Decoded<T> {
    /// Run `decode` on a blocking worker over `reader`.
    ///
    /// `decode` gets a blocking [`Read`] over the object body, an [`Emitter`]
    /// for its output, and the [`Fault`] flags used to classify failures.
    /// Must be called from within a Tokio runtime.
    pub fn spawn<F>(reader: ByteReader, capacity: usize, decode: F) -> Self
    where
        F: FnOnce(Tap<SyncIoBridge<ByteReader>>, &Emitter<T>, &Fault) -> Result<(), ExtractError>
            + Send
            + 'static,
    {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let bridge = SyncIoBridge::new(reader);
        let worker = tokio::task::spawn_blocking(move || {
            let fault = Fault::default();
            let source = fault.tap_source(bridge);
            let emitter = Emitter { tx };
            if let Err(err) = decode(source, &emitter, &fault) {
                // The consumer may already be gone; nothing left to report to.
                let _ = emitter.tx.blocking_send(Err(err));
            }
        });

        Self {
            rx,
            worker: Some(worker),
        }
    }

    /// Next decoded item, or `None` once the decoder finished cleanly.
    pub async fn next(&mut self) -> Option<Result<T, ExtractError>> {
        if let Some(item) = self.rx.recv().await {
            return Some(item);
        }

        // Channel closed: make sure the worker ended normally rather than
        // panicking mid-archive, which would otherwise look like a clean end.
        let worker = self.worker.take()?;
        match worker.await {
            Ok(()) => None,
            Err(err) => Some(Err(ExtractError::ArchiveDecode(format!(
                "decoder worker failed: {}",
                err
            )))),
        }
    }
}

/// Sending half handed to a decoder
pub struct Emitter<T> {
    tx: mpsc::Sender<Result<T, ExtractError>>,
}

impl<T> Emitter<T> {
    /// Hand an item to the consumer, blocking while the channel is full.
    ///
    /// Returns `false` once the consumer has gone away; the decoder should
    /// stop reading.
    pub fn emit(&self, item: T) -> bool {
        self.tx.blocking_send(Ok(item)).is_ok()
    }
}

/// Reader wrapper that records whether its inner reader ever failed
pub struct Tap<R> {
    inner: R,
    tripped: Arc<AtomicBool>,
}

impl<R: Read> Read for Tap<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf).inspect_err(|_| {
            self.tripped.store(true, Ordering::Relaxed);
        })
    }
}

/// Tracks which stage of a decoder chain failed first
///
/// Errors bubble up through every layer as `io::Error`; the flags say where
/// they started.
#[derive(Debug, Default)]
pub struct Fault {
    source: Arc<AtomicBool>,
    decoder: Arc<AtomicBool>,
}

impl Fault {
    fn tap_source<R: Read>(&self, inner: R) -> Tap<R> {
        Tap {
            inner,
            tripped: Arc::clone(&self.source),
        }
    }

    /// Wrap a decompressor so its failures classify as decompression errors
    pub fn tap_decoder<R: Read>(&self, inner: R) -> Tap<R> {
        Tap {
            inner,
            tripped: Arc::clone(&self.decoder),
        }
    }

    /// Classify an error raised anywhere in the chain.
    ///
    /// Source read failures win over decoder failures, which win over
    /// `fallback` (the archive-format error of the outermost layer).
    pub fn classify(
        &self,
        err: impl std::fmt::Display,
        fallback: fn(String) -> ExtractError,
    ) -> ExtractError {
        if self.source.load(Ordering::Relaxed) {
            ExtractError::SourceRead(err.to_string())
        } else if self.decoder.load(Ordering::Relaxed) {
            ExtractError::Decompression(err.to_string())
        } else {
            fallback(err.to_string())
        }
    }
}

/// Initial buffer capacity for an entry whose size the archive declares.
///
/// Declared sizes come from untrusted headers; cap the up-front allocation.
pub(crate) fn initial_capacity(declared: u64) -> usize {
    const MAX_PREALLOC: u64 = 64 * 1024 * 1024;
    declared.min(MAX_PREALLOC) as usize
}

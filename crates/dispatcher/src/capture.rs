//! Framed capture format
//!
//! A capture is a bincode-encoded [`CaptureHeader`] followed by a sequence of
//! [`CapturedFrame`] records, back to back. Written by `FileSink` in
//! `frames` mode and read back by the replay producer.

use std::fs::File;
use std::io::{BufReader, Cursor, ErrorKind, Read, Write};
use std::path::Path;

use bincode::Options;
use serde::{Deserialize, Serialize};

use contracts::AudioFrame;

use crate::error::DispatcherError;

/// Magic bytes at the start of every capture
pub const CAPTURE_MAGIC: [u8; 4] = *b"XAFC";

/// Current capture format version
pub const CAPTURE_VERSION: u32 = 1;

/// Upper bound on one encoded record. Covers a second of 32-bit audio on
/// 16 channels at 192 kHz with room to spare.
pub const MAX_RECORD_BYTES: u64 = 16 * 1024 * 1024;

/// Upper bound on the header after the magic
const MAX_HEADER_BYTES: u64 = 4 * 1024;

/// Fixed-width little-endian layout, the same bytes `bincode::serialize`
/// produces, but with a length budget so a corrupt prefix fails instead of
/// allocating.
fn codec(limit: u64) -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_limit(limit)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureHeader {
    pub magic: [u8; 4],
    pub version: u32,
    /// RFC 3339 wall-clock time the capture was opened
    pub captured_at: String,
}

/// One dispatched frame and its effective timestamp
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedFrame {
    pub timestamp_ms: i64,
    pub frame: AudioFrame,
}

/// Streaming capture encoder
pub struct CaptureWriter<W: Write> {
    inner: W,
    frames_written: u64,
}

impl<W: Write> CaptureWriter<W> {
    /// Write the header and return a writer positioned for frames.
    pub fn new(mut inner: W) -> Result<Self, DispatcherError> {
        let header = CaptureHeader {
            magic: CAPTURE_MAGIC,
            version: CAPTURE_VERSION,
            captured_at: chrono::Utc::now().to_rfc3339(),
        };
        codec(MAX_HEADER_BYTES + CAPTURE_MAGIC.len() as u64).serialize_into(&mut inner, &header)?;
        Ok(Self {
            inner,
            frames_written: 0,
        })
    }

    pub fn write_frame(&mut self, timestamp_ms: i64, frame: &AudioFrame) -> Result<(), DispatcherError> {
        let record = CapturedFrame {
            timestamp_ms,
            frame: frame.clone(),
        };
        codec(MAX_RECORD_BYTES).serialize_into(&mut self.inner, &record)?;
        self.frames_written += 1;
        Ok(())
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn flush(&mut self) -> Result<(), DispatcherError> {
        self.inner.flush()?;
        Ok(())
    }
}

/// Streaming capture decoder
pub struct CaptureReader<R: Read> {
    inner: R,
    header: CaptureHeader,
    frames_read: u64,
}

impl<R: Read> CaptureReader<R> {
    /// Read and check the header.
    ///
    /// # Errors
    /// `InvalidCapture` on wrong magic, a short header or an unsupported
    /// version. The magic is checked before anything else is decoded.
    pub fn open(mut inner: R) -> Result<Self, DispatcherError> {
        let mut magic = [0u8; 4];
        inner.read_exact(&mut magic).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => DispatcherError::invalid_capture("truncated header"),
            _ => DispatcherError::Io(e),
        })?;
        if magic != CAPTURE_MAGIC {
            return Err(DispatcherError::invalid_capture("bad magic"));
        }

        // Remaining header fields, in declaration order
        let (version, captured_at): (u32, String) = codec(MAX_HEADER_BYTES)
            .deserialize_from(&mut inner)
            .map_err(|e| match *e {
                bincode::ErrorKind::Io(ref io) if io.kind() == ErrorKind::UnexpectedEof => {
                    DispatcherError::invalid_capture("truncated header")
                }
                _ => DispatcherError::Codec(e),
            })?;
        if version != CAPTURE_VERSION {
            return Err(DispatcherError::invalid_capture(format!(
                "unsupported version {version}"
            )));
        }

        Ok(Self {
            inner,
            header: CaptureHeader {
                magic,
                version,
                captured_at,
            },
            frames_read: 0,
        })
    }

    pub fn header(&self) -> &CaptureHeader {
        &self.header
    }

    /// Next record, or `None` when the stream ends on a record boundary.
    ///
    /// # Errors
    /// `InvalidCapture` when the stream ends inside a record, `Codec` when a
    /// record is malformed or larger than [`MAX_RECORD_BYTES`].
    pub fn next_frame(&mut self) -> Result<Option<CapturedFrame>, DispatcherError> {
        let mut first = [0u8; 1];
        loop {
            match self.inner.read(&mut first) {
                Ok(0) => return Ok(None),
                Ok(_) => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        let stream = Cursor::new(first).chain(&mut self.inner);
        match codec(MAX_RECORD_BYTES).deserialize_from::<_, CapturedFrame>(stream) {
            Ok(record) => {
                self.frames_read += 1;
                Ok(Some(record))
            }
            Err(e) => match *e {
                bincode::ErrorKind::Io(ref io) if io.kind() == ErrorKind::UnexpectedEof => {
                    Err(DispatcherError::invalid_capture(format!(
                        "truncated record after {} frames",
                        self.frames_read
                    )))
                }
                _ => Err(e.into()),
            },
        }
    }
}

/// Load every frame of the capture at `path`.
pub fn read_capture(path: &Path) -> Result<Vec<CapturedFrame>, DispatcherError> {
    let mut reader = CaptureReader::open(BufReader::new(File::open(path)?))?;
    let mut frames = Vec::new();
    while let Some(record) = reader.next_frame()? {
        frames.push(record);
    }
    Ok(frames)
}

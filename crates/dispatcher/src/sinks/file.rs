//! FileSink - writes dispatched frames to disk
//!
//! Two layouts:
//! - `pcm`: the raw interleaved sample bytes, back to back
//! - `frames`: a framed capture (see [`crate::capture`]) that keeps format
//!   metadata and timestamps, suitable for replay

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use contracts::{AudioFrame, AudioSink, ContractError};
use tracing::{debug, instrument};

use crate::capture::CaptureWriter;

/// On-disk layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileFormat {
    #[default]
    Pcm,
    Frames,
}

impl FileFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pcm" | "raw" => Some(Self::Pcm),
            "frames" | "capture" => Some(Self::Frames),
            _ => None,
        }
    }
}

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Output file
    pub path: PathBuf,
    pub format: FileFormat,
}

impl FileSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> std::io::Result<Self> {
        let path = params
            .get("path")
            .map(PathBuf::from)
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "missing 'path'"))?;

        let format = match params.get("format") {
            Some(raw) => FileFormat::parse(raw).ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("unknown format '{raw}'"),
                )
            })?,
            None => FileFormat::default(),
        };

        Ok(Self { path, format })
    }
}

enum Output {
    Pcm(BufWriter<File>),
    Frames(CaptureWriter<BufWriter<File>>),
}

/// Sink that writes frames to a file
pub struct FileSink {
    name: String,
    path: PathBuf,
    output: Mutex<Output>,
}

impl FileSink {
    /// Create a new FileSink, truncating any existing file
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let writer = BufWriter::new(File::create(&config.path)?);

        let output = match config.format {
            FileFormat::Pcm => Output::Pcm(writer),
            FileFormat::Frames => Output::Frames(
                CaptureWriter::new(writer).map_err(|e| std::io::Error::other(e.to_string()))?,
            ),
        };

        Ok(Self {
            name: name.into(),
            path: config.path,
            output: Mutex::new(output),
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        let config = FileSinkConfig::from_params(params)?;
        Self::new(name, config)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn output(&self) -> MutexGuard<'_, Output> {
        self.output.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AudioSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_data(&self, frame: &AudioFrame, timestamp_ms: i64) -> Result<(), ContractError> {
        let mut output = self.output();
        let result = match &mut *output {
            Output::Pcm(writer) => {
                let len = frame.expected_len().min(frame.data.len());
                writer.write_all(&frame.data[..len]).map_err(|e| e.to_string())
            }
            Output::Frames(writer) => writer
                .write_frame(timestamp_ms, frame)
                .map_err(|e| e.to_string()),
        };
        result.map_err(|message| ContractError::sink_write(&self.name, message))
    }

    #[instrument(name = "file_sink_flush", skip(self), fields(sink = %self.name))]
    fn flush(&self) -> Result<(), ContractError> {
        let mut output = self.output();
        let result = match &mut *output {
            Output::Pcm(writer) => writer.flush().map_err(|e| e.to_string()),
            Output::Frames(writer) => writer.flush().map_err(|e| e.to_string()),
        };
        debug!(path = %self.path.display(), "FileSink flushed");
        result.map_err(|message| ContractError::sink_write(&self.name, message))
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        let _ = AudioSink::flush(self);
    }
}

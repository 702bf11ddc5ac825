//! Prefixed trace output.

use crate::policy::ScrubPolicy;
use crate::{Result, ScrubError};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Timestamp layout for `add_timestamp`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Destination for printed traces.
///
/// `Buffer` and `Writer` are in-process handles and are skipped when a
/// policy is serialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Sink {
    #[default]
    Stderr,
    Stdout,
    /// Append to a file, creating it if needed.
    File { path: PathBuf },
    #[serde(skip)]
    Buffer(SharedBuffer),
    #[serde(skip)]
    Writer(SharedWriter),
}

impl Sink {
    /// Write `bytes` in one go and flush.
    pub fn write_all(&self, bytes: &[u8]) -> io::Result<()> {
        match self {
            Sink::Stderr => {
                let mut handle = io::stderr().lock();
                handle.write_all(bytes)?;
                handle.flush()
            }
            Sink::Stdout => {
                let mut handle = io::stdout().lock();
                handle.write_all(bytes)?;
                handle.flush()
            }
            Sink::File { path } => {
                let mut file = OpenOptions::new().create(true).append(true).open(path)?;
                file.write_all(bytes)?;
                file.flush()
            }
            Sink::Buffer(buffer) => {
                buffer.append(bytes);
                Ok(())
            }
            Sink::Writer(writer) => writer.write_all(bytes),
        }
    }
}

/// Shared in-memory sink.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn append(&self, bytes: &[u8]) {
        let mut buf = self.0.lock().unwrap_or_else(|e| e.into_inner());
        buf.extend_from_slice(bytes);
    }

    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        let buf = self.0.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&buf).into_owned()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).is_empty()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl PartialEq for SharedBuffer {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Shared handle to an arbitrary writer.
#[derive(Clone)]
pub struct SharedWriter(Arc<Mutex<dyn Write + Send>>);

impl SharedWriter {
    pub fn new<W: Write + Send + 'static>(writer: W) -> Self {
        Self(Arc::new(Mutex::new(writer)))
    }

    fn write_all(&self, bytes: &[u8]) -> io::Result<()> {
        let mut writer = self.0.lock().unwrap_or_else(|e| e.into_inner());
        writer.write_all(bytes)?;
        writer.flush()
    }
}

impl fmt::Debug for SharedWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedWriter(..)")
    }
}

impl PartialEq for SharedWriter {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.0) as *const (),
            Arc::as_ptr(&other.0) as *const (),
        )
    }
}

/// Format rendered blocks as prefixed physical lines.
pub fn format_lines(blocks: &[String], policy: &ScrubPolicy) -> String {
    let mut out = String::new();
    for block in blocks {
        for line in block.lines() {
            out.push_str(&policy.prefix);
            out.push(' ');
            if policy.add_timestamp {
                out.push_str(&Local::now().format(TIMESTAMP_FORMAT).to_string());
                out.push(' ');
            }
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

/// Write rendered blocks to the policy's sink.
///
/// Sink failures are returned as [`ScrubError::Sink`].
pub fn print(blocks: &[String], policy: &ScrubPolicy) -> Result<()> {
    let out = format_lines(blocks, policy);
    policy.sink.write_all(out.as_bytes()).map_err(ScrubError::Sink)
}

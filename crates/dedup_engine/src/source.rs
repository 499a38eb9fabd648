use std::borrow::Cow;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use encoding_rs::{Encoding, UTF_8};
use thiserror::Error;

use crate::artifact::ArtifactError;

#[derive(Debug, Error)]
pub enum DedupError {
    #[error("failed to read {source_name}: {error}")]
    Read {
        source_name: String,
        #[source]
        error: io::Error,
    },
    #[error("{source_name} line {line}: {message}")]
    Decode {
        source_name: String,
        line: u64,
        message: String,
    },
    #[error("artifact error: {0}")]
    Artifact(#[from] ArtifactError),
}

/// One uploaded input: a finite, non-restartable byte stream.
pub struct InputSource {
    name: String,
    reader: Box<dyn Read + Send>,
    size_hint: Option<u64>,
}

impl InputSource {
    /// Wraps an arbitrary reader. `size_hint` is the expected byte length,
    /// used only for progress estimates.
    pub fn from_reader(
        name: impl Into<String>,
        reader: impl Read + Send + 'static,
        size_hint: Option<u64>,
    ) -> Self {
        Self {
            name: name.into(),
            reader: Box::new(reader),
            size_hint,
        }
    }

    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        let len = bytes.len() as u64;
        Self::from_reader(name, io::Cursor::new(bytes), Some(len))
    }

    pub fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self::from_reader(
            path.display().to_string(),
            file,
            Some(len),
        ))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size_hint(&self) -> Option<u64> {
        self.size_hint
    }

    pub(crate) fn into_lines(self) -> LineReader {
        LineReader {
            name: self.name,
            reader: BufReader::new(self.reader),
            buf: Vec::new(),
            line: 0,
            bytes_read: 0,
        }
    }
}

impl fmt::Debug for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputSource")
            .field("name", &self.name)
            .field("size_hint", &self.size_hint)
            .finish_non_exhaustive()
    }
}

/// Reads `\n`-terminated records and decodes them as UTF-8.
pub(crate) struct LineReader {
    name: String,
    reader: BufReader<Box<dyn Read + Send>>,
    buf: Vec<u8>,
    line: u64,
    bytes_read: u64,
}

impl LineReader {
    pub(crate) fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Returns the next record without its `\n`, or `None` at end of input.
    pub(crate) fn next_record(&mut self) -> Result<Option<Cow<'_, str>>, DedupError> {
        self.buf.clear();
        let read = self
            .reader
            .read_until(b'\n', &mut self.buf)
            .map_err(|error| DedupError::Read {
                source_name: self.name.clone(),
                error,
            })?;
        if read == 0 {
            return Ok(None);
        }
        self.bytes_read += read as u64;
        self.line += 1;

        let mut bytes = self.buf.as_slice();
        if bytes.last() == Some(&b'\n') {
            bytes = &bytes[..bytes.len() - 1];
        }
        if self.line == 1 {
            if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
                if encoding != UTF_8 {
                    return Err(DedupError::Decode {
                        source_name: self.name.clone(),
                        line: self.line,
                        message: format!("unsupported {} byte-order mark", encoding.name()),
                    });
                }
                bytes = &bytes[bom_len..];
            }
        }

        match UTF_8.decode_without_bom_handling_and_without_replacement(bytes) {
            Some(text) => Ok(Some(text)),
            None => Err(DedupError::Decode {
                source_name: self.name.clone(),
                line: self.line,
                message: "invalid UTF-8".to_string(),
            }),
        }
    }
}

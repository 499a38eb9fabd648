use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact io error: {0}")]
    Io(#[from] io::Error),
}

/// Write-once result file: one identifier per line, each line terminated by
/// `\n`. The backing temp file is deleted when the artifact (or the reader it
/// is turned into) is dropped.
pub struct Artifact {
    file: NamedTempFile,
    line_count: usize,
}

impl Artifact {
    /// Writes `identifiers` to a fresh temp file in `dir` (or the system temp
    /// dir) and syncs it to disk before returning.
    pub fn materialize<I, S>(dir: Option<&Path>, identifiers: I) -> Result<Self, ArtifactError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder = tempfile::Builder::new();
        builder.prefix("dedup-").suffix(".txt");
        let mut file = match dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };

        let mut line_count = 0;
        {
            let mut writer = BufWriter::new(file.as_file_mut());
            for identifier in identifiers {
                writer.write_all(identifier.as_ref().as_bytes())?;
                writer.write_all(b"\n")?;
                line_count += 1;
            }
            writer.flush()?;
        }
        file.as_file_mut().sync_all()?;

        Ok(Self { file, line_count })
    }

    pub fn line_count(&self) -> usize {
        self.line_count
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Consumes the artifact into a reader positioned at the start.
    pub fn open(self) -> Result<ArtifactReader, ArtifactError> {
        let handle = self.file.reopen()?;
        Ok(ArtifactReader {
            inner: BufReader::new(handle),
            _backing: self.file,
            line_count: self.line_count,
        })
    }
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("path", &self.file.path())
            .field("line_count", &self.line_count)
            .finish()
    }
}

pub struct ArtifactReader {
    inner: BufReader<File>,
    _backing: NamedTempFile,
    line_count: usize,
}

impl ArtifactReader {
    pub fn line_count(&self) -> usize {
        self.line_count
    }

    pub fn read_all(mut self) -> io::Result<String> {
        let mut content = String::new();
        self.read_to_string(&mut content)?;
        Ok(content)
    }
}

impl Read for ArtifactReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl fmt::Debug for ArtifactReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactReader")
            .field("path", &self._backing.path())
            .field("line_count", &self.line_count)
            .finish()
    }
}

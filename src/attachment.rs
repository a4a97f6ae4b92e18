//! File attachments as seen by the metadata field
//!
//! An attachment is either already written to storage (it has a stable path)
//! or still an in-memory upload that only exposes a byte stream and a name.

use std::fmt;
use std::fs;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Readable, rewindable upload content
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

pub enum Attachment {
    /// Committed to storage, readable from `path`
    Stored { path: PathBuf },

    /// Uploaded but not yet written to storage
    Pending {
        name: String,
        content: Box<dyn ReadSeek>,
    },
}

impl Attachment {
    pub fn stored(path: impl Into<PathBuf>) -> Self {
        Self::Stored { path: path.into() }
    }

    pub fn pending(name: impl Into<String>, content: impl ReadSeek + 'static) -> Self {
        Self::Pending {
            name: name.into(),
            content: Box::new(content),
        }
    }

    /// In-memory upload from raw bytes
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::pending(name, io::Cursor::new(bytes))
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Stored { .. })
    }

    /// Backing path, only known once committed
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Stored { path } => Some(path),
            Self::Pending { .. } => None,
        }
    }

    /// Base filename, e.g. `P1240157.JPG` for `media/2018/P1240157.JPG`
    pub fn file_name(&self) -> String {
        let full = match self {
            Self::Stored { path } => path.as_path(),
            Self::Pending { name, .. } => Path::new(name),
        };
        full.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Rewind and read the whole content.
    ///
    /// Stream position is left at the end for pending uploads.
    pub fn read_all(&mut self) -> io::Result<Vec<u8>> {
        match self {
            Self::Stored { path } => fs::read(path),
            Self::Pending { content, .. } => {
                content.seek(SeekFrom::Start(0))?;
                let mut buf = Vec::new();
                content.read_to_end(&mut buf)?;
                Ok(buf)
            }
        }
    }

    /// Write a pending upload into `dir` and switch to the stored form.
    ///
    /// No-op for attachments that are already committed.
    pub fn commit_to(&mut self, dir: impl AsRef<Path>) -> io::Result<PathBuf> {
        if let Self::Stored { path } = self {
            return Ok(path.clone());
        }
        let target = dir.as_ref().join(self.file_name());
        fs::write(&target, self.read_all()?)?;
        *self = Self::Stored {
            path: target.clone(),
        };
        Ok(target)
    }
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stored { path } => f.debug_struct("Stored").field("path", path).finish(),
            Self::Pending { name, .. } => f
                .debug_struct("Pending")
                .field("name", name)
                .finish_non_exhaustive(),
        }
    }
}

// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/phasmcore

//! Scoped temporary files for the path-based bridge contract.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::{Error, Result};

/// A temporary `.jpeg` file, removed when dropped.
pub struct ScratchFile {
    file: NamedTempFile,
}

impl ScratchFile {
    /// Create an empty scratch file.
    pub fn empty() -> Result<Self> {
        let file = tempfile::Builder::new()
            .prefix("dctjpeg-")
            .suffix(".jpeg")
            .tempfile()
            .map_err(|e| Error::io(std::env::temp_dir(), e))?;
        tracing::trace!(path = %file.path().display(), "scratch file created");
        Ok(Self { file })
    }

    /// Create a scratch file holding `bytes`, flushed to disk.
    pub fn with_contents(bytes: &[u8]) -> Result<Self> {
        let mut scratch = Self::empty()?;
        let path = scratch.path().to_path_buf();
        scratch
            .file
            .write_all(bytes)
            .and_then(|()| scratch.file.flush())
            .map_err(|e| Error::io(path, e))?;
        Ok(scratch)
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Read back the current file contents.
    pub fn read(&self) -> Result<Vec<u8>> {
        std::fs::read(self.path()).map_err(|e| Error::io(self.path(), e))
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        tracing::trace!(path = %self.file.path().display(), "scratch file released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contents_visible_through_path() {
        let scratch = ScratchFile::with_contents(b"\xFF\xD8\xFF\xD9").unwrap();
        assert_eq!(std::fs::read(scratch.path()).unwrap(), b"\xFF\xD8\xFF\xD9");
        assert_eq!(scratch.path().extension().unwrap(), "jpeg");
    }

    #[test]
    fn removed_on_drop() {
        let scratch = ScratchFile::empty().unwrap();
        let path = scratch.path().to_path_buf();
        assert!(path.exists());
        drop(scratch);
        assert!(!path.exists());
    }

    #[test]
    fn read_sees_external_writes() {
        let scratch = ScratchFile::empty().unwrap();
        std::fs::write(scratch.path(), b"abc").unwrap();
        assert_eq!(scratch.read().unwrap(), b"abc");
    }
}

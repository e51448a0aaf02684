//! Uploaded documents and their on-disk persistence.
//!
//! An [`Upload`] is a named, rewindable in-memory byte stream, the shape a
//! UI file picker hands over. A [`DocumentSet`] is the ordered batch of
//! uploads for one turn; its [`fingerprint`](DocumentSet::fingerprint)
//! drives engine invalidation.
//!
//! [`UploadStore`] writes a batch below a directory named after the batch
//! fingerprint, so storing an identical batch twice reuses the same
//! directory and does not duplicate file contents.

use std::fs;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::fingerprint::{DocumentFingerprint, fingerprint};
use crate::{MimirError, Result};

/// One uploaded file.
#[derive(Debug, Clone)]
pub struct Upload {
    name: String,
    content: Cursor<Vec<u8>>,
}

impl Upload {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: Cursor::new(bytes.into()),
        }
    }

    /// Read a file from disk, naming the upload after the file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        Ok(Self::new(file_name(path), bytes))
    }

    /// Display name as supplied by the uploader.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whole content, independent of the read position.
    pub fn bytes(&self) -> &[u8] {
        self.content.get_ref()
    }

    /// Decode the content as UTF-8 text.
    pub fn text(&self) -> Result<&str> {
        std::str::from_utf8(self.bytes()).map_err(|e| MimirError::UnsupportedDocument {
            name: self.name.clone(),
            reason: format!("not valid UTF-8 text ({e})"),
        })
    }
}

impl Read for Upload {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.content.read(buf)
    }
}

impl Seek for Upload {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.content.seek(pos)
    }
}

/// Ordered batch of uploads.
#[derive(Debug, Clone, Default)]
pub struct DocumentSet {
    files: Vec<Upload>,
}

impl DocumentSet {
    pub fn new(files: Vec<Upload>) -> Self {
        Self { files }
    }

    /// Load every path, in order.
    pub fn from_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let files = paths
            .iter()
            .map(Upload::from_path)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { files })
    }

    pub fn files(&self) -> &[Upload] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Fingerprint of the batch, `None` when nothing is uploaded.
    ///
    /// Read positions are left where they were.
    pub fn fingerprint(&mut self) -> Result<Option<DocumentFingerprint>> {
        fingerprint(&mut self.files)
    }
}

/// Content-addressed store for uploaded batches.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist a batch and return its directory.
    ///
    /// Returns `Ok(None)` for an empty batch. A file already present with
    /// the same name and length is left untouched.
    pub fn store(&self, documents: &mut DocumentSet) -> Result<Option<PathBuf>> {
        let Some(fp) = documents.fingerprint()? else {
            return Ok(None);
        };

        let dir = self.root.join(fp.to_hex());
        fs::create_dir_all(&dir)?;

        let mut written = 0usize;
        for upload in documents.files() {
            let target = dir.join(file_name(Path::new(upload.name())));
            if let Ok(meta) = fs::metadata(&target)
                && meta.is_file()
                && meta.len() == upload.bytes().len() as u64
            {
                debug!(path = %target.display(), "upload already stored");
                continue;
            }
            fs::write(&target, upload.bytes())?;
            written += 1;
        }

        info!(dir = %dir.display(), files = documents.len(), written, "stored uploads");
        Ok(Some(dir))
    }
}

/// Final path component, falling back to a placeholder for odd names
/// such as `..` or `/`.
fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string())
}

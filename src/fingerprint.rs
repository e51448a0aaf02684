//! Document-set fingerprinting.
//!
//! A [`DocumentFingerprint`] is a SHA-256 digest over the concatenated bytes
//! of every uploaded document, in upload order. It is a coarse change
//! detector: reordering the same files yields a different fingerprint.
//!
//! An empty upload set has no fingerprint at all. Callers get `None` rather
//! than the digest of zero bytes, so "nothing uploaded" can never be mistaken
//! for an unchanged document set.

use std::fmt;
use std::io::{Read, Seek, SeekFrom};

use sha2::{Digest, Sha256};

use crate::Result;

const READ_BUF: usize = 8 * 1024;

/// Digest identifying one specific ordered set of document contents.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentFingerprint([u8; 32]);

impl DocumentFingerprint {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering, also used as the upload directory name.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for DocumentFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for DocumentFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentFingerprint({})", &self.to_hex()[..12])
    }
}

/// Fingerprint a sequence of rewindable byte streams.
///
/// Each stream is hashed from its current position to the end, then moved
/// back to where it started so the caller can read it again. Returns
/// `Ok(None)` for an empty sequence.
pub fn fingerprint<R: Read + Seek>(files: &mut [R]) -> Result<Option<DocumentFingerprint>> {
    if files.is_empty() {
        return Ok(None);
    }

    let mut hasher = Sha256::new();
    let mut buf = [0u8; READ_BUF];
    for file in files.iter_mut() {
        let start = file.stream_position()?;
        let hashed = hash_stream(file, &mut hasher, &mut buf);
        // Rewind even when reading failed half-way.
        file.seek(SeekFrom::Start(start))?;
        hashed?;
    }

    Ok(Some(DocumentFingerprint(hasher.finalize().into())))
}

/// Fingerprint in-memory document contents.
pub fn fingerprint_bytes<'a, I>(contents: I) -> Option<DocumentFingerprint>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut hasher = Sha256::new();
    let mut any = false;
    for bytes in contents {
        hasher.update(bytes);
        any = true;
    }
    any.then(|| DocumentFingerprint(hasher.finalize().into()))
}

fn hash_stream<R: Read>(reader: &mut R, hasher: &mut Sha256, buf: &mut [u8]) -> Result<()> {
    loop {
        let n = reader.read(buf)?;
        if n == 0 {
            return Ok(());
        }
        hasher.update(&buf[..n]);
    }
}

//! Content digests used for source tarball identity and build-database
//! input hashing (spec §3.6, §4.H).
//!
//! SHA-256 accumulated through a streaming `Write` sink, rendered as
//! unpadded base32 for compact, case-insensitive-safe on-disk names.

use std::fmt;
use std::io::Write;

use data_encoding::BASE32;
use ring::digest;
use serde::{Deserialize, Serialize};

pub const DIGEST_SIZE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest([u8; DIGEST_SIZE]);

#[derive(thiserror::Error, Debug)]
pub enum InvalidDigestError {
    #[error("invalid base32 digest `{0}`")]
    Decode(String),
    #[error("digest `{0}` decodes to {1} bytes, expected {DIGEST_SIZE}")]
    WrongLength(String, usize),
}

impl Digest {
    pub fn from_bytes(bytes: [u8; DIGEST_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_SIZE] {
        &self.0
    }

    pub fn parse(s: &str) -> Result<Self, InvalidDigestError> {
        let decoded = BASE32
            .decode(s.as_bytes())
            .map_err(|_| InvalidDigestError::Decode(s.to_owned()))?;
        if decoded.len() != DIGEST_SIZE {
            return Err(InvalidDigestError::WrongLength(s.to_owned(), decoded.len()));
        }
        let mut bytes = [0u8; DIGEST_SIZE];
        bytes.copy_from_slice(&decoded);
        Ok(Self(bytes))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&BASE32.encode(&self.0))
    }
}

impl TryFrom<String> for Digest {
    type Error = InvalidDigestError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Digest> for String {
    fn from(value: Digest) -> Self {
        value.to_string()
    }
}

/// A streaming SHA-256 accumulator that also forwards bytes to an optional
/// write-through sink.
pub struct Hasher<T> {
    ctx: digest::Context,
    inner: Option<T>,
}

impl<T> Hasher<T> {
    pub fn new(inner: Option<T>) -> Self {
        Self {
            ctx: digest::Context::new(&digest::SHA256),
            inner,
        }
    }

    pub fn digest(self) -> Digest {
        let out = self.ctx.finish();
        let mut bytes = [0u8; DIGEST_SIZE];
        bytes.copy_from_slice(out.as_ref());
        Digest(bytes)
    }

    pub fn into_inner(self) -> Option<T> {
        self.inner
    }
}

impl<T: Write> Write for Hasher<T> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.ctx.update(buf);
        if let Some(inner) = self.inner.as_mut() {
            inner.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        if let Some(inner) = self.inner.as_mut() {
            inner.flush()?;
        }
        Ok(())
    }
}

/// Hashes an entire reader's contents in one pass.
pub fn digest_reader<R: std::io::Read>(mut reader: R) -> std::io::Result<Digest> {
    let mut hasher = Hasher::<std::io::Sink>::new(None);
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.write_all(&buf[..n])?;
    }
    Ok(hasher.digest())
}

/// djb2 over a sequence of already-sorted, weakly-canonicalized byte
/// strings — used for the tweaks-dir cache-buster (spec §4.H). Distinct
/// from the SHA-256 [`Digest`] above, which is used for content-addressed
/// storage rather than this one cache-buster purpose.
pub fn djb2(paths: &[impl AsRef<[u8]>]) -> u64 {
    let mut hash: u64 = 5381;
    for path in paths {
        for &byte in path.as_ref() {
            hash = hash.wrapping_mul(33).wrapping_add(byte as u64);
        }
        // separator so that ["ab"] and ["a", "b"] don't collide
        hash = hash.wrapping_mul(33).wrapping_add(0);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_round_trips_through_display() {
        let d = digest_reader(std::io::Cursor::new(b"hello world")).unwrap();
        let parsed = Digest::parse(&d.to_string()).unwrap();
        assert_eq!(d, parsed);
    }

    #[test]
    fn djb2_is_deterministic_and_order_sensitive() {
        let a = djb2(&["foo.h", "bar.h"]);
        let b = djb2(&["foo.h", "bar.h"]);
        let c = djb2(&["bar.h", "foo.h"]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}

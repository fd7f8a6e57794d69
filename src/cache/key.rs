//! Cache key derivation.
//!
//! Maps an arbitrary locator (typically a fully-qualified image URL) to a
//! string that is safe to use as a filename on any target filesystem. The
//! mapping is deterministic and total: the same locator always yields the
//! same key, and no input can fail to encode.

use std::fmt;

/// Longest encoded key accepted as a filename. Anything longer falls back
/// to a fixed-length hash (most filesystems cap names at 255 bytes).
const MAX_ENCODED_LEN: usize = 200;

/// Identifier addressing a cached image in both tiers.
///
/// Derived from the caller's locator by [`CacheKey::from_locator`]. ASCII
/// alphanumerics pass through unchanged; every other byte is escaped as
/// `%XX`, keeping the on-disk name readable for typical URLs. Locators
/// whose encoded form would exceed the filename length bound are instead
/// keyed by a 16-hex-digit hash of the raw locator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the cache key for a locator.
    pub fn from_locator(locator: &str) -> Self {
        let encoded = percent_encode(locator);
        if encoded.is_empty() || encoded.len() > MAX_ENCODED_LEN {
            Self(hashed(locator))
        } else {
            Self(encoded)
        }
    }

    /// The encoded key, suitable for use as a filename.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Escape every byte outside `[A-Za-z0-9]` as `%XX`.
fn percent_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        if byte.is_ascii_alphanumeric() {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

/// Fixed-length fallback for locators too long to percent-encode.
fn hashed(input: &str) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    input.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

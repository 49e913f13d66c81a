//! Immutable PHP byte strings
//!
//! PHP strings are binary-safe byte sequences, not UTF-8 text. `PhpString`
//! wraps a shared, immutable buffer so that copying a string value is a
//! reference-count bump; every "mutating" operation returns a new string.
//! The 64-bit content hash is computed on first use and cached.
//!
//! ## References
//!
//! - Zend: `$PHP_SRC_PATH/Zend/zend_string.h` - zend_string (len, h, val)
//! - `$PHP_SRC_PATH/ext/standard/string.c` - substr, trim, explode semantics

use crate::core::error::PhpError;
use memchr::memmem;
use std::borrow::Cow;
use std::cell::OnceCell;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use xxhash_rust::xxh3::xxh3_64;

/// Characters stripped by `trim()` when no character list is given
pub const DEFAULT_TRIM_CHARS: &[u8] = b" \t\n\r\0\x0B";

struct Inner {
    bytes: Box<[u8]>,
    hash: OnceCell<u64>,
}

#[derive(Clone)]
pub struct PhpString(Rc<Inner>);

impl PhpString {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        PhpString(Rc::new(Inner {
            bytes: bytes.into().into_boxed_slice(),
            hash: OnceCell::new(),
        }))
    }

    /// Build a string whose hash is already known (used by the interner)
    pub(crate) fn with_hash(bytes: &[u8], hash: u64) -> Self {
        let cell = OnceCell::new();
        let _ = cell.set(hash);
        PhpString(Rc::new(Inner {
            bytes: bytes.into(),
            hash: cell,
        }))
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0.bytes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.bytes.is_empty()
    }

    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0.bytes)
    }

    /// Cached xxh3 hash of the content
    pub fn hash_code(&self) -> u64 {
        *self.0.hash.get_or_init(|| xxh3_64(&self.0.bytes))
    }

    /// True when both handles share one buffer
    #[inline]
    pub fn ptr_eq(&self, other: &PhpString) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn concat(&self, other: &PhpString) -> PhpString {
        if other.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return other.clone();
        }
        let mut out = Vec::with_capacity(self.len() + other.len());
        out.extend_from_slice(self.as_bytes());
        out.extend_from_slice(other.as_bytes());
        PhpString::new(out)
    }

    /// `substr()` with PHP 8 offset/length rules
    /// Reference: $PHP_SRC_PATH/ext/standard/string.c - PHP_FUNCTION(substr)
    pub fn substr(&self, start: i64, length: Option<i64>) -> PhpString {
        let str_len = self.len() as i64;
        let mut from = start;
        if from > str_len {
            return PhpString::empty();
        }
        if from < 0 {
            from = (str_len + from).max(0);
        }

        let count = match length {
            None => str_len - from,
            Some(l) if l < 0 => {
                let end = str_len + l;
                if end < from {
                    return PhpString::empty();
                }
                end - from
            }
            Some(l) => l.min(str_len - from),
        };

        if count <= 0 {
            return PhpString::empty();
        }
        let from = from as usize;
        PhpString::new(&self.as_bytes()[from..from + count as usize])
    }

    /// Byte offset of the first occurrence of `needle` at or after `offset`
    pub fn find(&self, needle: &[u8], offset: usize) -> Option<usize> {
        if offset > self.len() {
            return None;
        }
        if needle.is_empty() {
            return Some(offset);
        }
        memmem::find(&self.as_bytes()[offset..], needle).map(|pos| pos + offset)
    }

    /// Byte offset of the last occurrence of `needle`
    pub fn rfind(&self, needle: &[u8]) -> Option<usize> {
        if needle.is_empty() {
            return Some(self.len());
        }
        memmem::rfind(self.as_bytes(), needle)
    }

    pub fn contains(&self, needle: &[u8]) -> bool {
        self.find(needle, 0).is_some()
    }

    pub fn starts_with(&self, prefix: &[u8]) -> bool {
        self.as_bytes().starts_with(prefix)
    }

    pub fn ends_with(&self, suffix: &[u8]) -> bool {
        self.as_bytes().ends_with(suffix)
    }

    /// `strtolower()`: ASCII-only, locale independent since PHP 8.2
    pub fn to_ascii_lowercase(&self) -> PhpString {
        if !self.as_bytes().iter().any(u8::is_ascii_uppercase) {
            return self.clone();
        }
        PhpString::new(self.as_bytes().to_ascii_lowercase())
    }

    pub fn to_ascii_uppercase(&self) -> PhpString {
        if !self.as_bytes().iter().any(u8::is_ascii_lowercase) {
            return self.clone();
        }
        PhpString::new(self.as_bytes().to_ascii_uppercase())
    }

    pub fn eq_ignore_ascii_case(&self, other: &[u8]) -> bool {
        self.as_bytes().eq_ignore_ascii_case(other)
    }

    pub fn trim(&self) -> PhpString {
        self.trim_matches(DEFAULT_TRIM_CHARS, true, true)
    }

    pub fn ltrim(&self) -> PhpString {
        self.trim_matches(DEFAULT_TRIM_CHARS, true, false)
    }

    pub fn rtrim(&self) -> PhpString {
        self.trim_matches(DEFAULT_TRIM_CHARS, false, true)
    }

    /// Trim any byte contained in `chars` from the selected ends
    pub fn trim_matches(&self, chars: &[u8], left: bool, right: bool) -> PhpString {
        let bytes = self.as_bytes();
        let mut start = 0;
        let mut end = bytes.len();
        if left {
            while start < end && chars.contains(&bytes[start]) {
                start += 1;
            }
        }
        if right {
            while end > start && chars.contains(&bytes[end - 1]) {
                end -= 1;
            }
        }
        if start == 0 && end == bytes.len() {
            return self.clone();
        }
        PhpString::new(&bytes[start..end])
    }

    /// `explode()` without a limit
    /// Reference: $PHP_SRC_PATH/ext/standard/string.c - php_explode
    pub fn split(&self, delimiter: &[u8]) -> Result<Vec<PhpString>, PhpError> {
        if delimiter.is_empty() {
            return Err(PhpError::runtime(
                "explode(): Argument #1 ($separator) cannot be empty",
            ));
        }
        let bytes = self.as_bytes();
        let mut parts = Vec::new();
        let mut last = 0;
        for pos in memmem::find_iter(bytes, delimiter) {
            // find_iter yields non-overlapping matches
            parts.push(PhpString::new(&bytes[last..pos]));
            last = pos + delimiter.len();
        }
        parts.push(PhpString::new(&bytes[last..]));
        Ok(parts)
    }
}

impl PartialEq for PhpString {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        if self.len() != other.len() {
            return false;
        }
        if let (Some(a), Some(b)) = (self.0.hash.get(), other.0.hash.get()) {
            if a != b {
                return false;
            }
        }
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for PhpString {}

impl Hash for PhpString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash_code());
    }
}

impl PartialOrd for PhpString {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PhpString {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_bytes().cmp(other.as_bytes())
    }
}

impl AsRef<[u8]> for PhpString {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Debug for PhpString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_string_lossy())
    }
}

impl fmt::Display for PhpString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

impl Default for PhpString {
    fn default() -> Self {
        PhpString::empty()
    }
}

impl From<&str> for PhpString {
    fn from(s: &str) -> Self {
        PhpString::new(s.as_bytes())
    }
}

impl From<String> for PhpString {
    fn from(s: String) -> Self {
        PhpString::new(s.into_bytes())
    }
}

impl From<&[u8]> for PhpString {
    fn from(b: &[u8]) -> Self {
        PhpString::new(b)
    }
}

impl From<Vec<u8>> for PhpString {
    fn from(b: Vec<u8>) -> Self {
        PhpString::new(b)
    }
}

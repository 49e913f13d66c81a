use crate::core::string::PhpString;
use smallvec::SmallVec;
use std::collections::HashMap;
use xxhash_rust::xxh3::xxh3_64;

/// String interning registry keyed by exact byte content.
///
/// Interned strings share one buffer, so equal names compare by pointer
/// before falling back to bytes. The table belongs to a `RequestContext`
/// and is emptied with [`Interner::clear`] between independent scripts.
#[derive(Debug, Default)]
pub struct Interner {
    buckets: HashMap<u64, SmallVec<[PhpString; 1]>>,
    count: usize,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, s: &[u8]) -> PhpString {
        let hash = xxh3_64(s);
        let bucket = self.buckets.entry(hash).or_default();
        if let Some(existing) = bucket.iter().find(|e| e.as_bytes() == s) {
            return existing.clone();
        }
        let sym = PhpString::with_hash(s, hash);
        bucket.push(sym.clone());
        self.count += 1;
        sym
    }

    /// Intern an existing string, reusing its buffer when not yet known
    pub fn intern_string(&mut self, s: &PhpString) -> PhpString {
        let hash = s.hash_code();
        let bucket = self.buckets.entry(hash).or_default();
        if let Some(existing) = bucket.iter().find(|e| *e == s) {
            return existing.clone();
        }
        bucket.push(s.clone());
        self.count += 1;
        s.clone()
    }

    pub fn find(&self, s: &[u8]) -> Option<PhpString> {
        self.buckets
            .get(&xxh3_64(s))?
            .iter()
            .find(|e| e.as_bytes() == s)
            .cloned()
    }

    pub fn is_interned(&self, s: &PhpString) -> bool {
        self.buckets
            .get(&s.hash_code())
            .map(|bucket| bucket.iter().any(|e| e.ptr_eq(s)))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
        self.count = 0;
    }
}

//! PHP arrays: ordered maps with a packed fast path
//!
//! An array starts *packed*: a dense `Vec<Val>` whose keys are implicitly
//! `0..len`. The first operation that would break that shape (a string key,
//! a non-sequential integer key, an unset or a shift) converts it to *hash*
//! mode, an `IndexMap` whose entry order is the insertion order. There is no
//! way back to packed mode.
//!
//! `next_free` mirrors `HashTable::nNextFreeElement`: the key used by the next
//! append. It only grows, except through `pop` and `unshift`, so removed
//! integer keys are never handed out again.
//!
//! ## References
//!
//! - Zend: `$PHP_SRC_PATH/Zend/zend_hash.c` - zend_hash_packed_to_hash,
//!   _zend_hash_index_add_or_update_i, zend_hash_next_free_element
//! - `$PHP_SRC_PATH/ext/standard/array.c` - array_pop, array_shift,
//!   array_unshift, array_slice, array_merge

use crate::core::convert::{canonical_int_key, float_to_int};
use crate::core::error::PhpError;
use crate::core::string::PhpString;
use crate::core::value::{ObjectRef, Val};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;
use std::ops::ControlFlow;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArrayKey {
    Int(i64),
    Str(PhpString),
}

impl ArrayKey {
    /// Normalize a string key: canonical decimal integers become `Int`
    pub fn from_bytes(s: &[u8]) -> ArrayKey {
        match canonical_int_key(s) {
            Some(i) => ArrayKey::Int(i),
            None => ArrayKey::Str(PhpString::new(s)),
        }
    }

    /// Normalize an arbitrary value used as an array offset
    /// Reference: $PHP_SRC_PATH/Zend/zend_execute.c - zend_fetch_dimension_address_inner
    pub fn from_val(key: &Val) -> Result<ArrayKey, PhpError> {
        match key {
            Val::Int(i) => Ok(ArrayKey::Int(*i)),
            Val::Float(f) => Ok(ArrayKey::Int(float_to_int(*f))),
            Val::Bool(b) => Ok(ArrayKey::Int(*b as i64)),
            Val::Undefined | Val::Null => Ok(ArrayKey::Str(PhpString::empty())),
            Val::String(s) => Ok(match canonical_int_key(s.as_bytes()) {
                Some(i) => ArrayKey::Int(i),
                None => ArrayKey::Str(s.clone()),
            }),
            Val::Resource(res) => Ok(ArrayKey::Int(res.id() as i64)),
            Val::Reference(slot) => ArrayKey::from_val(&slot.borrow()),
            Val::Array(_) => Err(PhpError::IllegalOffset { type_name: "array" }),
            Val::Object(_) => Err(PhpError::IllegalOffset { type_name: "object" }),
        }
    }

    pub fn to_val(&self) -> Val {
        match self {
            ArrayKey::Int(i) => Val::Int(*i),
            ArrayKey::Str(s) => Val::String(s.clone()),
        }
    }

    pub fn is_int(&self) -> bool {
        matches!(self, ArrayKey::Int(_))
    }
}

impl From<i64> for ArrayKey {
    fn from(i: i64) -> Self {
        ArrayKey::Int(i)
    }
}

impl From<&str> for ArrayKey {
    fn from(s: &str) -> Self {
        ArrayKey::from_bytes(s.as_bytes())
    }
}

impl From<PhpString> for ArrayKey {
    fn from(s: PhpString) -> Self {
        match canonical_int_key(s.as_bytes()) {
            Some(i) => ArrayKey::Int(i),
            None => ArrayKey::Str(s),
        }
    }
}

impl fmt::Display for ArrayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArrayKey::Int(i) => write!(f, "{}", i),
            ArrayKey::Str(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone)]
enum Storage {
    Packed(Vec<Val>),
    Hash(IndexMap<ArrayKey, Val>),
}

/// Array payload with cached next auto-increment index
#[derive(Debug, Clone)]
pub struct ArrayData {
    storage: Storage,
    next_free: i64,
}

impl Default for ArrayData {
    fn default() -> Self {
        Self::new()
    }
}

impl ArrayData {
    pub fn new() -> Self {
        Self {
            storage: Storage::Packed(Vec::new()),
            next_free: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: Storage::Packed(Vec::with_capacity(capacity)),
            next_free: 0,
        }
    }

    /// Packed array from a list of values
    pub fn from_list(values: Vec<Val>) -> Self {
        let next_free = values.len() as i64;
        Self {
            storage: Storage::Packed(values),
            next_free,
        }
    }

    /// Build by successive `set` calls, so packing is preserved when possible
    pub fn from_pairs(pairs: impl IntoIterator<Item = (ArrayKey, Val)>) -> Self {
        let mut arr = ArrayData::new();
        for (key, value) in pairs {
            arr.set(key, value);
        }
        arr
    }

    pub fn len(&self) -> usize {
        match &self.storage {
            Storage::Packed(vec) => vec.len(),
            Storage::Hash(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_packed(&self) -> bool {
        matches!(self.storage, Storage::Packed(_))
    }

    /// Get the next auto-increment index (O(1))
    /// Reference: $PHP_SRC_PATH/Zend/zend_hash.c - zend_hash_next_free_element
    pub fn next_index(&self) -> i64 {
        self.next_free
    }

    /// `array_is_list()`: keys are exactly `0..len` in order
    pub fn is_list(&self) -> bool {
        match &self.storage {
            Storage::Packed(_) => true,
            Storage::Hash(map) => map
                .keys()
                .enumerate()
                .all(|(i, k)| *k == ArrayKey::Int(i as i64)),
        }
    }

    /// Materialize every packed slot as an explicit integer key
    /// Reference: $PHP_SRC_PATH/Zend/zend_hash.c - zend_hash_packed_to_hash
    fn convert_to_hash(&mut self) -> &mut IndexMap<ArrayKey, Val> {
        if let Storage::Packed(vec) = &mut self.storage {
            tracing::trace!(len = vec.len(), "array: packed -> hash");
            let mut map = IndexMap::with_capacity(vec.len());
            for (i, v) in vec.drain(..).enumerate() {
                map.insert(ArrayKey::Int(i as i64), v);
            }
            self.storage = Storage::Hash(map);
        }
        match &mut self.storage {
            Storage::Hash(map) => map,
            Storage::Packed(_) => unreachable!("array storage was just converted to hash"),
        }
    }

    pub fn get(&self, key: &ArrayKey) -> Option<&Val> {
        match (&self.storage, key) {
            (Storage::Packed(vec), ArrayKey::Int(i)) => {
                usize::try_from(*i).ok().and_then(|idx| vec.get(idx))
            }
            (Storage::Packed(_), ArrayKey::Str(_)) => None,
            (Storage::Hash(map), key) => map.get(key),
        }
    }

    pub fn get_mut(&mut self, key: &ArrayKey) -> Option<&mut Val> {
        match (&mut self.storage, key) {
            (Storage::Packed(vec), ArrayKey::Int(i)) => {
                usize::try_from(*i).ok().and_then(move |idx| vec.get_mut(idx))
            }
            (Storage::Packed(_), ArrayKey::Str(_)) => None,
            (Storage::Hash(map), key) => map.get_mut(key),
        }
    }

    pub fn has_key(&self, key: &ArrayKey) -> bool {
        self.get(key).is_some()
    }

    /// Insert or overwrite. Only the next sequential integer key keeps a
    /// packed array packed.
    /// Reference: $PHP_SRC_PATH/Zend/zend_hash.c - _zend_hash_index_add_or_update_i
    pub fn set(&mut self, key: ArrayKey, value: Val) {
        if let (Storage::Packed(vec), ArrayKey::Int(i)) = (&mut self.storage, &key) {
            if *i == vec.len() as i64 {
                vec.push(value);
                self.next_free = vec.len() as i64;
                return;
            }
        }

        if let ArrayKey::Int(i) = &key {
            if *i >= self.next_free {
                self.next_free = i.saturating_add(1);
            }
        }
        self.convert_to_hash().insert(key, value);
    }

    /// Append with the auto-increment key. Returns the key used, or `None`
    /// when the next index is already taken (`PHP_INT_MAX` was used).
    pub fn append(&mut self, value: Val) -> Option<i64> {
        let key = self.next_free;
        match &mut self.storage {
            Storage::Packed(vec) => {
                vec.push(value);
                self.next_free = vec.len() as i64;
            }
            Storage::Hash(map) => {
                let slot = ArrayKey::Int(key);
                if map.contains_key(&slot) {
                    return None;
                }
                map.insert(slot, value);
                self.next_free = key.saturating_add(1);
            }
        }
        Some(key)
    }

    /// `array_push()` for one value: returns the new element count
    pub fn push(&mut self, value: Val) -> Option<usize> {
        self.append(value).map(|_| self.len())
    }

    /// Remove a key. Always leaves the array in hash mode.
    pub fn unset(&mut self, key: &ArrayKey) -> Option<Val> {
        self.convert_to_hash().shift_remove(key)
    }

    /// `array_pop()`: remove the last element, handing its index back to
    /// the auto-increment counter when it was the most recent one
    pub fn pop(&mut self) -> Option<Val> {
        match &mut self.storage {
            Storage::Packed(vec) => {
                let value = vec.pop()?;
                self.next_free = vec.len() as i64;
                Some(value)
            }
            Storage::Hash(map) => {
                let (key, value) = map.pop()?;
                if let ArrayKey::Int(k) = key {
                    if k.checked_add(1) == Some(self.next_free) {
                        self.next_free = k;
                    }
                }
                Some(value)
            }
        }
    }

    /// Remove the first element. Remaining keys are left as they are, so a
    /// packed array converts to hash mode first.
    pub fn shift(&mut self) -> Option<Val> {
        if self.is_empty() {
            return None;
        }
        self.convert_to_hash()
            .shift_remove_index(0)
            .map(|(_, value)| value)
    }

    /// `array_unshift()` for one value: prepend and renumber integer keys.
    /// Returns the new element count.
    pub fn unshift(&mut self, value: Val) -> usize {
        match &mut self.storage {
            Storage::Packed(vec) => {
                vec.insert(0, value);
                self.next_free = vec.len() as i64;
            }
            Storage::Hash(map) => {
                let old = std::mem::take(map);
                let mut renumbered = IndexMap::with_capacity(old.len() + 1);
                renumbered.insert(ArrayKey::Int(0), value);
                let mut next = 1i64;
                for (key, v) in old {
                    match key {
                        ArrayKey::Int(_) => {
                            renumbered.insert(ArrayKey::Int(next), v);
                            next += 1;
                        }
                        key @ ArrayKey::Str(_) => {
                            renumbered.insert(key, v);
                        }
                    }
                }
                *map = renumbered;
                self.next_free = next;
            }
        }
        self.len()
    }

    /// `array_slice()` without preserve_keys. A negative `offset` counts from
    /// the end; `None` or a negative `length` runs to the end. Integer keys
    /// are renumbered, string keys kept.
    pub fn slice(&self, offset: i64, length: Option<i64>) -> ArrayData {
        let len = self.len() as i64;
        let start = if offset < 0 {
            (len + offset).max(0)
        } else {
            offset.min(len)
        };
        let end = match length {
            Some(l) if l >= 0 => start.saturating_add(l).min(len),
            _ => len,
        };
        if start >= end {
            return ArrayData::new();
        }
        let (start, end) = (start as usize, end as usize);

        match &self.storage {
            Storage::Packed(vec) => ArrayData::from_list(vec[start..end].to_vec()),
            Storage::Hash(map) => {
                let mut out = ArrayData::with_capacity(end - start);
                for (key, value) in map.iter().skip(start).take(end - start) {
                    match key {
                        ArrayKey::Int(_) => {
                            out.append(value.clone());
                        }
                        ArrayKey::Str(_) => out.set(key.clone(), value.clone()),
                    }
                }
                out
            }
        }
    }

    /// Merge `other` into `self`: string keys overwrite, integer keys are
    /// appended with fresh indexes.
    /// Reference: $PHP_SRC_PATH/ext/standard/array.c - php_array_merge
    pub fn merge(&mut self, other: &ArrayData) {
        for (key, value) in other.iter() {
            match key {
                ArrayKey::Int(_) => {
                    self.append(value.clone());
                }
                key @ ArrayKey::Str(_) => self.set(key, value.clone()),
            }
        }
    }

    /// `array_keys()`
    pub fn keys(&self) -> ArrayData {
        ArrayData::from_list(self.iter().map(|(k, _)| k.to_val()).collect())
    }

    /// `array_values()`
    pub fn values(&self) -> ArrayData {
        ArrayData::from_list(self.iter().map(|(_, v)| v.clone()).collect())
    }

    /// `in_array()` with loose comparison
    pub fn contains(&self, needle: &Val) -> bool {
        self.search(needle).is_some()
    }

    /// `array_search()` with loose comparison: first matching key
    pub fn search(&self, needle: &Val) -> Option<ArrayKey> {
        self.iter()
            .find(|(_, v)| v.loose_equals(needle))
            .map(|(k, _)| k)
    }

    /// Visit entries in order until the visitor breaks
    pub fn each<F>(&self, mut visitor: F) -> ControlFlow<()>
    where
        F: FnMut(&ArrayKey, &Val) -> ControlFlow<()>,
    {
        for (key, value) in self.iter() {
            visitor(&key, value)?;
        }
        ControlFlow::Continue(())
    }

    pub fn iter(&self) -> Iter<'_> {
        match &self.storage {
            Storage::Packed(vec) => Iter::Packed(vec.iter().enumerate()),
            Storage::Hash(map) => Iter::Hash(map.iter()),
        }
    }

    pub fn first(&self) -> Option<(ArrayKey, &Val)> {
        self.iter().next()
    }

    pub fn last(&self) -> Option<(ArrayKey, &Val)> {
        self.iter().next_back()
    }

    /// Copy with every nested array payload duplicated
    pub fn deep_copy(&self) -> ArrayData {
        let mut seen = HashMap::new();
        self.deep_copy_with(&mut seen)
    }

    pub(crate) fn deep_copy_with(&self, seen: &mut HashMap<u64, ObjectRef>) -> ArrayData {
        let storage = match &self.storage {
            Storage::Packed(vec) => {
                Storage::Packed(vec.iter().map(|v| v.deep_copy_with(seen)).collect())
            }
            Storage::Hash(map) => Storage::Hash(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.deep_copy_with(seen)))
                    .collect(),
            ),
        };
        ArrayData {
            storage,
            next_free: self.next_free,
        }
    }
}

/// Entries in array order
pub enum Iter<'a> {
    Packed(std::iter::Enumerate<std::slice::Iter<'a, Val>>),
    Hash(indexmap::map::Iter<'a, ArrayKey, Val>),
}

impl<'a> Iterator for Iter<'a> {
    type Item = (ArrayKey, &'a Val);

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Iter::Packed(it) => it.next().map(|(i, v)| (ArrayKey::Int(i as i64), v)),
            Iter::Hash(it) => it.next().map(|(k, v)| (k.clone(), v)),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            Iter::Packed(it) => it.size_hint(),
            Iter::Hash(it) => it.size_hint(),
        }
    }
}

impl DoubleEndedIterator for Iter<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        match self {
            Iter::Packed(it) => it.next_back().map(|(i, v)| (ArrayKey::Int(i as i64), v)),
            Iter::Hash(it) => it.next_back().map(|(k, v)| (k.clone(), v)),
        }
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl PartialEq for ArrayData {
    fn eq(&self, other: &Self) -> bool {
        // next_free is cached metadata and not compared
        self.len() == other.len()
            && self
                .iter()
                .zip(other.iter())
                .all(|((ka, va), (kb, vb))| ka == kb && va.identical(vb))
    }
}

impl FromIterator<Val> for ArrayData {
    fn from_iter<T: IntoIterator<Item = Val>>(iter: T) -> Self {
        ArrayData::from_list(iter.into_iter().collect())
    }
}

impl FromIterator<(ArrayKey, Val)> for ArrayData {
    fn from_iter<T: IntoIterator<Item = (ArrayKey, Val)>>(iter: T) -> Self {
        ArrayData::from_pairs(iter)
    }
}

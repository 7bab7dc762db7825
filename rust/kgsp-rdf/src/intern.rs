// kgsp-rdf: Interned string table
// Stable 32-bit hash + length identity; the lookup hit path is one map
// probe and one byte comparison

use bitflags::bitflags;
use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};
use rustc_hash::FxHashMap;
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64_with_seed;

bitflags! {
    /// Node kind of an interned string. Exactly one bit is set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TypeFlags: u8 {
        const IRI     = 0b001;
        const BLANK   = 0b010;
        const LITERAL = 0b100;
    }
}

/// Stable reference to an interned string.
///
/// Equality is `(hash, len)` equality; the interner guarantees distinct
/// byte strings of the same kind never share a `(hash, len)` pair, so
/// reference equality is byte equality.
#[derive(Debug, Clone, Copy)]
pub struct StringRef {
    pub hash: u32,
    pub len: u32,
    pub flags: TypeFlags,
    /// Hash of the literal's datatype IRI, 0 when untyped.
    pub datatype_hash: u32,
}

impl StringRef {
    /// The null sentinel. Never returned by `intern`.
    pub const NULL: StringRef = StringRef {
        hash: 0,
        len: 0,
        flags: TypeFlags::empty(),
        datatype_hash: 0,
    };

    #[inline(always)]
    pub fn is_null(&self) -> bool {
        self.hash == 0 && self.len == 0
    }

    #[inline(always)]
    pub fn is_iri(&self) -> bool {
        self.flags.contains(TypeFlags::IRI)
    }

    #[inline(always)]
    pub fn is_blank(&self) -> bool {
        self.flags.contains(TypeFlags::BLANK)
    }

    #[inline(always)]
    pub fn is_literal(&self) -> bool {
        self.flags.contains(TypeFlags::LITERAL)
    }

    /// Packed `(hash, len)` identity key.
    #[inline(always)]
    pub fn key(&self) -> u64 {
        (u64::from(self.hash) << 32) | u64::from(self.len)
    }
}

impl PartialEq for StringRef {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.len == other.len
    }
}

impl Eq for StringRef {}

impl std::hash::Hash for StringRef {
    #[inline(always)]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        state.write_u64(self.key());
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InternError {
    #[error("interner rejected empty input")]
    InvalidArgument,
    #[error("interner exhausted rehash probes for colliding input")]
    Capacity,
}

struct Slot {
    bytes: Box<[u8]>,
    flags: TypeFlags,
    datatype_hash: u32,
}

#[derive(Default)]
struct InternerInner {
    /// `(hash, len)` key to slot index.
    by_key: FxHashMap<u64, u32>,
    slots: Vec<Slot>,
}

/// Thread-safe interned string table.
///
/// Reads (`resolve`, repeat `intern` hits) take the read lock; only the
/// first sighting of a string takes the write lock. One interner is
/// shared across schedulers that need cross-scheduler reference
/// equality.
pub struct Interner {
    inner: RwLock<InternerInner>,
}

/// Bounded number of salted rehash attempts before reporting capacity.
const MAX_PROBES: u64 = 16;

impl Interner {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(InternerInner::default()),
        }
    }

    /// Intern an IRI.
    pub fn intern_iri(&self, bytes: &[u8]) -> Result<StringRef, InternError> {
        self.intern(bytes, TypeFlags::IRI, 0)
    }

    /// Intern a blank node label.
    pub fn intern_blank(&self, bytes: &[u8]) -> Result<StringRef, InternError> {
        self.intern(bytes, TypeFlags::BLANK, 0)
    }

    /// Intern an untyped literal.
    pub fn intern_literal(&self, bytes: &[u8]) -> Result<StringRef, InternError> {
        self.intern(bytes, TypeFlags::LITERAL, 0)
    }

    /// Intern a literal carrying a datatype.
    pub fn intern_typed_literal(
        &self,
        bytes: &[u8],
        datatype: StringRef,
    ) -> Result<StringRef, InternError> {
        self.intern(bytes, TypeFlags::LITERAL, datatype.hash)
    }

    /// Intern arbitrary bytes under a node kind.
    ///
    /// Byte-identical inputs of the same kind always return the same
    /// reference. A `(hash, len)` collision between distinct byte
    /// strings is resolved by salted rehash, keeping reference equality
    /// equivalent to byte equality.
    pub fn intern(
        &self,
        bytes: &[u8],
        flags: TypeFlags,
        datatype_hash: u32,
    ) -> Result<StringRef, InternError> {
        if bytes.is_empty() {
            return Err(InternError::InvalidArgument);
        }
        let len = bytes.len() as u32;

        // Hit path: read lock only.
        {
            let inner = self.inner.read();
            if let Some(found) = Self::find(&inner, bytes, flags, datatype_hash, len) {
                return Ok(found);
            }
        }

        let mut inner = self.inner.write();
        // Re-check under the write lock; another thread may have won.
        if let Some(found) = Self::find(&inner, bytes, flags, datatype_hash, len) {
            return Ok(found);
        }

        for probe in 0..MAX_PROBES {
            let hash = Self::hash_at(bytes, flags, datatype_hash, probe);
            if hash == 0 {
                continue;
            }
            let key = (u64::from(hash) << 32) | u64::from(len);
            if inner.by_key.contains_key(&key) {
                continue;
            }
            let slot = inner.slots.len() as u32;
            inner.slots.push(Slot {
                bytes: bytes.into(),
                flags,
                datatype_hash,
            });
            inner.by_key.insert(key, slot);
            return Ok(StringRef {
                hash,
                len,
                flags,
                datatype_hash,
            });
        }
        Err(InternError::Capacity)
    }

    fn find(
        inner: &InternerInner,
        bytes: &[u8],
        flags: TypeFlags,
        datatype_hash: u32,
        len: u32,
    ) -> Option<StringRef> {
        for probe in 0..MAX_PROBES {
            let hash = Self::hash_at(bytes, flags, datatype_hash, probe);
            if hash == 0 {
                continue;
            }
            let key = (u64::from(hash) << 32) | u64::from(len);
            match inner.by_key.get(&key) {
                Some(&slot_idx) => {
                    let slot = &inner.slots[slot_idx as usize];
                    if slot.bytes.as_ref() == bytes
                        && slot.flags == flags
                        && slot.datatype_hash == datatype_hash
                    {
                        return Some(StringRef {
                            hash,
                            len,
                            flags,
                            datatype_hash,
                        });
                    }
                    // Occupied by a different string; keep probing.
                }
                None => return None,
            }
        }
        None
    }

    /// Salted fast hash. Node kind and datatype fold into the seed so
    /// the same bytes interned under different kinds or datatypes
    /// receive distinct refs.
    #[inline(always)]
    fn hash_at(bytes: &[u8], flags: TypeFlags, datatype_hash: u32, probe: u64) -> u32 {
        let seed = (probe << 40) | (u64::from(datatype_hash) << 8) | u64::from(flags.bits());
        xxh3_64_with_seed(bytes, seed) as u32
    }

    /// Resolve a reference back to its bytes.
    pub fn resolve(&self, r: StringRef) -> Option<MappedRwLockReadGuard<'_, [u8]>> {
        let inner = self.inner.read();
        let slot_idx = *inner.by_key.get(&r.key())?;
        Some(RwLockReadGuard::map(inner, |i| {
            i.slots[slot_idx as usize].bytes.as_ref()
        }))
    }

    /// Resolve to an owned string, lossy on non-UTF8. Diagnostics only.
    pub fn resolve_string(&self, r: StringRef) -> Option<String> {
        self.resolve(r)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn len(&self) -> usize {
        self.inner.read().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

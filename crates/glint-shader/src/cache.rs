//! Caller-owned memoization of assembled blobs.

use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tracing::trace;

use crate::asm::assemble;
use crate::blob::Blob;
use crate::error::AssembleError;
use crate::program::ShaderProgram;
use crate::target::Target;

/// Identity of an assembly request: the target plus a blake3 digest of the program.
///
/// The digest is taken over the program's [`Hash`] stream, so keys are only meaningful within one
/// build of the crate and must not be persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramKey {
    pub target: Target,
    pub digest: [u8; 32],
}

impl ProgramKey {
    pub fn new(target: Target, program: &ShaderProgram) -> Self {
        let mut hasher = Blake3Hasher(blake3::Hasher::new());
        program.hash(&mut hasher);
        Self {
            target,
            digest: *hasher.0.finalize().as_bytes(),
        }
    }
}

struct Blake3Hasher(blake3::Hasher);

impl Hasher for Blake3Hasher {
    fn write(&mut self, bytes: &[u8]) {
        self.0.update(bytes);
    }

    fn finish(&self) -> u64 {
        let digest = self.0.finalize();
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest.as_bytes()[..8]);
        u64::from_le_bytes(head)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLookupSource {
    /// The blob was already present in the cache.
    Memory,
    /// The assembler ran and the blob was inserted into the cache.
    Assembled,
}

#[derive(Debug, Clone)]
pub struct CacheLookup {
    pub source: CacheLookupSource,
    blob: Arc<Blob>,
}

impl CacheLookup {
    pub fn into_blob(self) -> Arc<Blob> {
        self.blob
    }
}

impl std::ops::Deref for CacheLookup {
    type Target = Blob;

    fn deref(&self) -> &Self::Target {
        &self.blob
    }
}

/// Bounded LRU cache of blobs. Not internally synchronized; wrap it in a lock to share it.
pub struct BlobCache {
    entries: LruCache<ProgramKey, Arc<Blob>>,
}

impl BlobCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: LruCache::new(capacity),
        }
    }

    /// Returns the cached blob for `(target, program)`, assembling and inserting it on a miss.
    ///
    /// Failed assemblies leave the cache untouched.
    pub fn get_or_assemble(
        &mut self,
        target: Target,
        program: &ShaderProgram,
    ) -> Result<CacheLookup, AssembleError> {
        let key = ProgramKey::new(target, program);
        if let Some(blob) = self.entries.get(&key) {
            trace!(backend = %target, "blob cache hit");
            return Ok(CacheLookup {
                source: CacheLookupSource::Memory,
                blob: Arc::clone(blob),
            });
        }

        let blob = Arc::new(assemble(program, target)?);
        self.entries.put(key, Arc::clone(&blob));
        trace!(backend = %target, entries = self.entries.len(), "blob cache miss");
        Ok(CacheLookup {
            source: CacheLookupSource::Assembled,
            blob,
        })
    }

    pub fn capacity(&self) -> NonZeroUsize {
        self.entries.cap()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

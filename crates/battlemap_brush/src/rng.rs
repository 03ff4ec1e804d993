//! Deterministic variant selection
//!
//! A map seed, a brush key and a cell are hashed into a base value; the
//! `salt`-th draw for that cell is derived from the base, so one cell yields
//! an unbounded sequence of independent-looking values. The same
//! `(seed, key, cell, salt)` always produces the same draw, which keeps
//! preview renders, committed placements and reloaded maps in agreement.

use battlemap_core::CellPos;
use rand::RngCore;

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;
const GOLDEN_GAMMA: u32 = 0x9e37_79b9;

/// 32-bit FNV-1a
pub fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET;
    for b in bytes {
        hash ^= *b as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Murmur3 finalizer; spreads every input bit across the output
pub fn avalanche(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}

/// Draw number `salt` derived from a cell's base hash
pub fn derive(base: u32, salt: u32) -> u32 {
    avalanche(base ^ salt.wrapping_add(1).wrapping_mul(GOLDEN_GAMMA))
}

/// Seed-reproducible per-cell randomness.
///
/// Implementors only provide the base hash; the draw derivation is shared so
/// the hashing scheme can change without touching placement code.
pub trait DeterministicRng {
    /// Base hash for `cell`
    fn cell_hash(&self, cell: CellPos) -> u32;

    /// The `salt`-th value for `cell`
    fn draw(&self, cell: CellPos, salt: u32) -> u32 {
        derive(self.cell_hash(cell), salt)
    }

    /// Stream of draws for `cell`, starting at salt 0
    fn stream(&self, cell: CellPos) -> VariantStream {
        VariantStream::new(self.cell_hash(cell))
    }
}

/// Hashes `"{seed}:{key}:{x}:{y}"` with FNV-1a and an avalanche step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantSelector {
    seed: String,
    key: String,
}

impl VariantSelector {
    pub fn new(seed: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            seed: seed.into(),
            key: key.into(),
        }
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Selector for a sub-pool of the same brush
    pub fn sub_key(&self, suffix: &str) -> Self {
        Self::new(self.seed.clone(), format!("{}#{}", self.key, suffix))
    }
}

impl DeterministicRng for VariantSelector {
    fn cell_hash(&self, cell: CellPos) -> u32 {
        let text = format!("{}:{}:{}:{}", self.seed, self.key, cell.x, cell.y);
        avalanche(fnv1a(text.as_bytes()))
    }
}

/// Sequence of draws for one cell. Also usable as a `rand::RngCore`.
#[derive(Debug, Clone)]
pub struct VariantStream {
    base: u32,
    salt: u32,
}

impl VariantStream {
    pub fn new(base: u32) -> Self {
        Self { base, salt: 0 }
    }

    /// Salt the next draw will use
    pub fn salt(&self) -> u32 {
        self.salt
    }

    fn next(&mut self) -> u32 {
        let value = derive(self.base, self.salt);
        self.salt = self.salt.wrapping_add(1);
        value
    }

    /// Uniform in `[0, 1)`
    pub fn next_unit(&mut self) -> f64 {
        self.next() as f64 / 4_294_967_296.0
    }

    /// Uniform in `[-1, 1)`
    pub fn next_signed(&mut self) -> f64 {
        self.next_unit() * 2.0 - 1.0
    }

    /// Uniform index into a pool of `len` items; 0 when `len` is 0
    pub fn next_index(&mut self, len: usize) -> usize {
        if len == 0 {
            self.next();
            return 0;
        }
        ((self.next() as u64 * len as u64) >> 32) as usize
    }

    /// Quarter-turn rotation index
    pub fn next_quarter(&mut self) -> u8 {
        (self.next() >> 30) as u8
    }

    /// True with probability `p`
    pub fn next_bool(&mut self, p: f64) -> bool {
        self.next_unit() < p
    }
}

impl RngCore for VariantStream {
    fn next_u32(&mut self) -> u32 {
        self.next()
    }

    fn next_u64(&mut self) -> u64 {
        let hi = self.next() as u64;
        let lo = self.next() as u64;
        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.next().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

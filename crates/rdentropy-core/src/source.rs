//! Abstract random source trait and the values it produces.
//!
//! Every hardware source implements the [`RandomSource`] trait, which provides
//! metadata via [`SourceInfo`] plus bit, byte, and float draws. Each call is
//! independent: sources hold no seed, counter, or stream position.

use serde::Serialize;

use crate::error::Result;
use crate::instruction::{Instruction, RetryPolicy};

/// Bits of precision used by [`RandomSource::random`].
pub const FLOAT_BITS: u32 = 52;

/// Metadata about a hardware random source.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    /// Unique identifier (e.g. `"rdrand"`).
    pub name: &'static str,
    /// One-line human-readable description.
    pub description: &'static str,
    /// How the silicon produces the values.
    pub physics: &'static str,
    /// Backing instruction.
    pub instruction: Instruction,
    /// Width of a single native invocation.
    pub word_bits: u32,
}

/// Serializable view of a source's metadata and retry configuration.
#[derive(Debug, Clone, Serialize)]
pub struct SourceInfoSnapshot {
    pub name: String,
    pub description: String,
    pub physics: String,
    pub instruction: Instruction,
    pub word_bits: u32,
    pub retry: RetryPolicy,
}

/// An unsigned integer of a fixed bit width, drawn uniformly from
/// `[0, 2^width)`.
///
/// Stored little-endian in `ceil(width / 8)` bytes. Bits at and above `width`
/// are always zero.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RandomBits {
    width: u32,
    bytes: Vec<u8>,
}

impl RandomBits {
    /// Wrap little-endian bytes, clearing every bit at or above `width`.
    pub fn from_le_bytes(width: u32, mut bytes: Vec<u8>) -> Self {
        let len = width.div_ceil(8) as usize;
        bytes.resize(len, 0);
        let tail = width % 8;
        if tail != 0 {
            if let Some(last) = bytes.last_mut() {
                *last &= 0xFF >> (8 - tail);
            }
        }
        Self { width, bytes }
    }

    /// Requested bit width.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Little-endian value bytes.
    pub fn as_le_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Value as `u64`, if the width fits.
    pub fn to_u64(&self) -> Option<u64> {
        (self.width <= 64).then(|| self.low_u64())
    }

    /// Value as `u128`, if the width fits.
    pub fn to_u128(&self) -> Option<u128> {
        if self.width > 128 {
            return None;
        }
        let mut buf = [0u8; 16];
        buf[..self.bytes.len()].copy_from_slice(&self.bytes);
        Some(u128::from_le_bytes(buf))
    }

    /// The lowest 64 bits of the value, whatever the width.
    pub fn low_u64(&self) -> u64 {
        let mut buf = [0u8; 8];
        let n = self.bytes.len().min(8);
        buf[..n].copy_from_slice(&self.bytes[..n]);
        u64::from_le_bytes(buf)
    }

    /// Bit `index` (0 = least significant).
    pub fn bit(&self, index: u32) -> bool {
        if index >= self.width {
            return false;
        }
        self.bytes[(index / 8) as usize] >> (index % 8) & 1 == 1
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> u32 {
        self.bytes.iter().map(|b| b.count_ones()).sum()
    }
}

impl std::fmt::LowerHex for RandomBits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut digits = String::with_capacity(self.bytes.len() * 2);
        for b in self.bytes.iter().rev() {
            digits.push_str(&format!("{b:02x}"));
        }
        let trimmed = digits.trim_start_matches('0');
        let body = if trimmed.is_empty() { "0" } else { trimmed };
        f.pad_integral(true, "0x", body)
    }
}

impl std::fmt::Debug for RandomBits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RandomBits({} bits, {:#x})", self.width, self)
    }
}

/// Trait that every random source implements.
pub trait RandomSource: Send + Sync {
    /// Source metadata.
    fn info(&self) -> &SourceInfo;

    /// An unsigned integer uniformly distributed over `[0, 2^n)`.
    fn get_bits(&self, n: u32) -> Result<RandomBits>;

    /// Exactly `n` raw bytes.
    fn get_bytes(&self, n: usize) -> Result<Vec<u8>>;

    /// A float in `[0.0, 1.0)` with [`FLOAT_BITS`] bits of precision.
    fn random(&self) -> Result<f64> {
        let mantissa = self.get_bits(FLOAT_BITS)?.low_u64();
        Ok(mantissa as f64 / (1u64 << FLOAT_BITS) as f64)
    }

    /// Convenience: name from info.
    fn name(&self) -> &'static str {
        self.info().name
    }
}

impl<S: RandomSource + ?Sized> RandomSource for Box<S> {
    fn info(&self) -> &SourceInfo {
        (**self).info()
    }

    fn get_bits(&self, n: u32) -> Result<RandomBits> {
        (**self).get_bits(n)
    }

    fn get_bytes(&self, n: usize) -> Result<Vec<u8>> {
        (**self).get_bytes(n)
    }

    fn random(&self) -> Result<f64> {
        (**self).random()
    }
}

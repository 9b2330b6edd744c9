//! Legacy PRNG-compatible facade over any [`RandomSource`].
//!
//! Mirrors the surface of a classic seeded generator (`random`,
//! `getrandbits`, `getrandbytes`, `seed`, `jumpahead`, `getstate`,
//! `setstate`) by delegation. Seeding and jumping are accepted and ignored;
//! state save/restore always fails because a hardware source has no state.

use crate::error::{EntropyError, Quantity, Result, positive_count};
use crate::hardware::HardwareSource;
use crate::instruction::Instruction;
use crate::source::{RandomBits, RandomSource};

/// Composition wrapper exposing the legacy generator surface.
#[derive(Debug, Clone)]
pub struct LegacyRandom<S> {
    source: S,
}

impl LegacyRandom<HardwareSource> {
    /// Facade over a capability-checked hardware source.
    pub fn open(instruction: Instruction) -> Result<Self> {
        HardwareSource::open(instruction).map(Self::new)
    }
}

impl<S: RandomSource> LegacyRandom<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn into_inner(self) -> S {
        self.source
    }

    /// Next float in `[0.0, 1.0)`.
    pub fn random(&self) -> Result<f64> {
        self.source.random()
    }

    /// `k` random bits as an unsigned integer.
    pub fn getrandbits(&self, k: i64) -> Result<RandomBits> {
        let n = positive_count(k, Quantity::Bits)?;
        let n = u32::try_from(n).map_err(|_| EntropyError::WidthOutOfRange {
            quantity: Quantity::Bits,
            requested: n,
            max: u64::from(u32::MAX),
        })?;
        self.source.get_bits(n)
    }

    /// `k` random bytes.
    pub fn getrandbytes(&self, k: i64) -> Result<Vec<u8>> {
        let n = positive_count(k, Quantity::Bytes)?;
        let n = usize::try_from(n).map_err(|_| EntropyError::WidthOutOfRange {
            quantity: Quantity::Bytes,
            requested: n,
            max: usize::MAX as u64,
        })?;
        self.source.get_bytes(n)
    }

    /// No-op: there is nothing to seed.
    pub fn seed<T>(&self, _seed: T) {}

    /// No-op: there is no stream position to advance.
    pub fn jumpahead(&self, _n: i64) {}

    /// Always [`EntropyError::UnsupportedOperation`].
    pub fn getstate(&self) -> Result<()> {
        Err(EntropyError::UnsupportedOperation {
            operation: "getstate",
        })
    }

    /// Always [`EntropyError::UnsupportedOperation`].
    pub fn setstate<T>(&self, _state: T) -> Result<()> {
        Err(EntropyError::UnsupportedOperation {
            operation: "setstate",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::testing::{Counter, Scripted};

    fn counter() -> LegacyRandom<HardwareSource<Counter>> {
        LegacyRandom::new(HardwareSource::from_word_source(Counter::new()))
    }

    #[test]
    fn non_positive_counts_rejected() {
        let rng = counter();
        for k in [0, -1, -64] {
            assert_eq!(
                rng.getrandbits(k),
                Err(EntropyError::InvalidArgument {
                    quantity: Quantity::Bits,
                    requested: k
                })
            );
            assert_eq!(
                rng.getrandbytes(k),
                Err(EntropyError::InvalidArgument {
                    quantity: Quantity::Bytes,
                    requested: k
                })
            );
        }
    }

    #[test]
    fn huge_bit_count_is_out_of_range() {
        let rng = counter();
        assert!(matches!(
            rng.getrandbits(i64::from(u32::MAX) + 1),
            Err(EntropyError::WidthOutOfRange { .. })
        ));
    }

    #[test]
    fn delegates_to_source() {
        let rng = counter();
        assert_eq!(rng.getrandbits(8).unwrap().to_u64(), Some(1));
        assert_eq!(rng.getrandbytes(2).unwrap(), vec![2, 0]);
        let x = rng.random().unwrap();
        assert!((0.0..1.0).contains(&x));
    }

    #[test]
    fn state_methods_always_fail() {
        let rng = counter();
        for _ in 0..3 {
            assert_eq!(
                rng.getstate(),
                Err(EntropyError::UnsupportedOperation {
                    operation: "getstate"
                })
            );
            assert_eq!(
                rng.setstate(("anything", 1)),
                Err(EntropyError::UnsupportedOperation {
                    operation: "setstate"
                })
            );
        }
    }

    #[test]
    fn seed_and_jumpahead_do_not_touch_the_source() {
        let words = Scripted::words(&[9]);
        let rng = LegacyRandom::new(HardwareSource::from_word_source(words));
        rng.seed(12345u64);
        rng.seed("a string seed");
        rng.jumpahead(1_000_000);
        // The only scripted word is still there.
        assert_eq!(rng.getrandbits(8).unwrap().to_u64(), Some(9));
    }

    #[test]
    fn exhaustion_propagates() {
        let rng = LegacyRandom::new(HardwareSource::from_word_source(Scripted::new(
            Instruction::RdSeed,
            [],
        )));
        assert!(matches!(
            rng.random(),
            Err(EntropyError::HardwareEntropyUnavailable {
                instruction: Instruction::RdSeed,
                ..
            })
        ));
    }

    #[test]
    fn open_respects_capability() {
        for i in Instruction::ALL {
            assert_eq!(LegacyRandom::open(i).is_ok(), i.is_supported());
        }
    }
}

//! RDRAND/RDSEED-backed random source.
//!
//! Architecture:
//! 1. Factory checks the cached CPU capability before anything else
//! 2. Each 64-bit word gets a bounded retry budget
//! 3. Words are laid out little-endian into the output buffer
//! 4. Bit requests mask the top byte so the value is uniform over `[0, 2^n)`
//! 5. All-or-nothing: an exhausted word fails the whole request
//!
//! A [`HardwareSource`] holds no mutable state and takes no locks; share it
//! freely across threads.

use rand::{TryCryptoRng, TryRngCore};

use crate::error::{EntropyError, Quantity, Result};
use crate::instruction::{CpuWords, Instruction, NATIVE_WORD_BITS, RetryPolicy, WORD_BITS, WordSource};
use crate::source::{RandomBits, RandomSource, SourceInfo, SourceInfoSnapshot};

const WORD_BYTES: usize = (WORD_BITS / 8) as usize;

static RDRAND_INFO: SourceInfo = SourceInfo {
    name: "rdrand",
    description: "Intel/AMD digital random number generator output via RDRAND",
    physics: "A metastable latch on the die resolves under thermal noise into raw bits. \
              An on-chip conditioner (AES-CBC-MAC) compresses them into seeds for an \
              SP 800-90A CTR_DRBG, and RDRAND returns DRBG output. The DRBG reseeds \
              continuously, but its output buffer can momentarily run dry when many \
              cores draw at once, which the instruction reports by clearing CF.",
    instruction: Instruction::RdRand,
    word_bits: NATIVE_WORD_BITS,
};

static RDSEED_INFO: SourceInfo = SourceInfo {
    name: "rdseed",
    description: "Conditioned on-die entropy via RDSEED, no DRBG expansion",
    physics: "Same thermal-noise latch and conditioner as RDRAND, but RDSEED hands out \
              the conditioned seed material itself (SP 800-90B/C) instead of DRBG \
              output. Every value is backed by fresh entropy, so the queue drains far \
              faster than RDRAND's and transient failures are routine under load.",
    instruction: Instruction::RdSeed,
    word_bits: NATIVE_WORD_BITS,
};

fn info_for(instruction: Instruction) -> &'static SourceInfo {
    match instruction {
        Instruction::RdRand => &RDRAND_INFO,
        Instruction::RdSeed => &RDSEED_INFO,
    }
}

/// Random source backed by a hardware instruction.
///
/// The type parameter is the word-level seam; production code uses
/// [`CpuWords`], tests substitute scripted sources.
#[derive(Debug, Clone, Copy)]
pub struct HardwareSource<W = CpuWords> {
    words: W,
    policy: RetryPolicy,
}

impl HardwareSource<CpuWords> {
    /// Capability-checked constructor for either instruction.
    pub fn open(instruction: Instruction) -> Result<Self> {
        let words = CpuWords::new(instruction)?;
        Ok(Self::from_word_source(words))
    }

    /// RDRAND-backed source.
    pub fn rdrand() -> Result<Self> {
        Self::open(Instruction::RdRand)
    }

    /// RDSEED-backed source.
    pub fn rdseed() -> Result<Self> {
        Self::open(Instruction::RdSeed)
    }
}

impl<W: WordSource> HardwareSource<W> {
    /// Wrap a word source with its instruction's default retry policy.
    pub fn from_word_source(words: W) -> Self {
        let policy = words.instruction().default_retry_policy();
        Self { words, policy }
    }

    /// Replace the retry policy.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn instruction(&self) -> Instruction {
        self.words.instruction()
    }

    /// Metadata plus the active retry policy, for reporting.
    pub fn snapshot(&self) -> SourceInfoSnapshot {
        let info = info_for(self.instruction());
        SourceInfoSnapshot {
            name: info.name.to_string(),
            description: info.description.to_string(),
            physics: info.physics.to_string(),
            instruction: info.instruction,
            word_bits: info.word_bits,
            retry: self.policy,
        }
    }

    /// One 64-bit word, retried up to the policy's budget.
    pub fn next_word(&self) -> Result<u64> {
        let attempts = self.policy.attempts();
        for attempt in 1..=attempts {
            match self.words.try_word() {
                Some(word) if !(self.policy.reject_all_ones && word == u64::MAX) => {
                    if attempt > 1 {
                        log::trace!(
                            "{} delivered after {attempt} attempts",
                            self.instruction()
                        );
                    }
                    return Ok(word);
                }
                _ => {
                    if self.policy.spin_between_attempts && attempt < attempts {
                        std::hint::spin_loop();
                    }
                }
            }
        }
        log::warn!(
            "{} retry budget exhausted ({attempts} attempts)",
            self.instruction()
        );
        Err(EntropyError::HardwareEntropyUnavailable {
            instruction: self.instruction(),
            attempts,
        })
    }

    /// Pack successive words little-endian into `buf`, truncating the last.
    fn fill_words(&self, buf: &mut [u8]) -> Result<()> {
        for chunk in buf.chunks_mut(WORD_BYTES) {
            let word = self.next_word()?.to_le_bytes();
            chunk.copy_from_slice(&word[..chunk.len()]);
        }
        Ok(())
    }

    /// An unsigned integer uniformly distributed over `[0, 2^n)`.
    pub fn get_bits(&self, n: u32) -> Result<RandomBits> {
        if n == 0 {
            return Err(EntropyError::InvalidArgument {
                quantity: Quantity::Bits,
                requested: 0,
            });
        }
        let mut buf = vec![0u8; n.div_ceil(8) as usize];
        self.fill_words(&mut buf)?;
        Ok(RandomBits::from_le_bytes(n, buf))
    }

    /// Up to 64 bits as a plain integer. One word is consumed.
    pub fn get_u64(&self, n: u32) -> Result<u64> {
        if n == 0 {
            return Err(EntropyError::InvalidArgument {
                quantity: Quantity::Bits,
                requested: 0,
            });
        }
        if n > WORD_BITS {
            return Err(EntropyError::WidthOutOfRange {
                quantity: Quantity::Bits,
                requested: u64::from(n),
                max: u64::from(WORD_BITS),
            });
        }
        let word = self.next_word()?;
        Ok(if n == WORD_BITS {
            word
        } else {
            word & ((1u64 << n) - 1)
        })
    }

    /// Exactly `n` raw bytes.
    pub fn get_bytes(&self, n: usize) -> Result<Vec<u8>> {
        if n == 0 {
            return Err(EntropyError::InvalidArgument {
                quantity: Quantity::Bytes,
                requested: 0,
            });
        }
        let mut buf = vec![0u8; n];
        self.fill_words(&mut buf)?;
        Ok(buf)
    }

    /// Fill `dest` completely, or leave it untouched on error.
    pub fn fill_bytes(&self, dest: &mut [u8]) -> Result<()> {
        if dest.is_empty() {
            return Ok(());
        }
        let buf = self.get_bytes(dest.len())?;
        dest.copy_from_slice(&buf);
        Ok(())
    }
}

impl<W: WordSource> RandomSource for HardwareSource<W> {
    fn info(&self) -> &SourceInfo {
        info_for(self.instruction())
    }

    fn get_bits(&self, n: u32) -> Result<RandomBits> {
        HardwareSource::get_bits(self, n)
    }

    fn get_bytes(&self, n: usize) -> Result<Vec<u8>> {
        HardwareSource::get_bytes(self, n)
    }
}

impl<W: WordSource> TryRngCore for HardwareSource<W> {
    type Error = EntropyError;

    fn try_next_u32(&mut self) -> Result<u32> {
        Ok(self.next_word()? as u32)
    }

    fn try_next_u64(&mut self) -> Result<u64> {
        self.next_word()
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<()> {
        self.fill_bytes(dest)
    }
}

impl<W: WordSource> TryCryptoRng for HardwareSource<W> {}

/// Every hardware source the executing CPU supports, RDRAND first.
pub fn detect_available_sources() -> Vec<Box<dyn RandomSource>> {
    Instruction::ALL
        .into_iter()
        .filter_map(|i| HardwareSource::open(i).ok())
        .map(|s| Box::new(s) as Box<dyn RandomSource>)
        .collect()
}


#[cfg(test)]
mod tests {
    use super::testing::{Counter, Scripted};
    use super::*;

    // -----------------------------------------------------------------------
    // Assembly
    // -----------------------------------------------------------------------

    #[test]
    fn bits_mask_partial_top_byte() {
        let source = HardwareSource::from_word_source(Scripted::words(&[0x0123_4567_89AB_CDEF]));
        let bits = source.get_bits(12).unwrap();
        assert_eq!(bits.to_u64(), Some(0xDEF));
        assert_eq!(bits.as_le_bytes(), &[0xEF, 0x0D]);
    }

    #[test]
    fn bits_span_words_little_endian() {
        let source = HardwareSource::from_word_source(Scripted::words(&[
            0x1111_1111_1111_1111,
            0xFFFF_FFFF_FFFF_FF22,
        ]));
        let bits = source.get_bits(70).unwrap();
        assert_eq!(bits.width(), 70);
        assert_eq!(bits.as_le_bytes().len(), 9);
        // Second word contributes one byte, masked to 6 bits.
        assert_eq!(bits.to_u128(), Some(0x22_1111_1111_1111_1111));
        assert_eq!(source.words.calls(), 2);
    }

    #[test]
    fn whole_byte_widths_are_not_masked() {
        let source = HardwareSource::from_word_source(Scripted::words(&[0xFFFF_FFFF_FFFF_FFFE]));
        assert_eq!(source.get_bits(16).unwrap().to_u64(), Some(0xFFFE));
    }

    #[test]
    fn get_u64_masks_low_bits() {
        let source = HardwareSource::from_word_source(Scripted::words(&[
            0xDEAD_BEEF_0000_00FF,
            0xDEAD_BEEF_0000_00FF,
        ]));
        assert_eq!(source.get_u64(4).unwrap(), 0xF);
        assert_eq!(source.get_u64(64).unwrap(), 0xDEAD_BEEF_0000_00FF);
    }

    #[test]
    fn get_u64_rejects_wide_and_zero() {
        let source = HardwareSource::from_word_source(Counter::new());
        assert!(matches!(
            source.get_u64(65),
            Err(EntropyError::WidthOutOfRange { requested: 65, max: 64, .. })
        ));
        assert!(matches!(
            source.get_u64(0),
            Err(EntropyError::InvalidArgument { quantity: Quantity::Bits, .. })
        ));
    }

    #[test]
    fn bytes_truncate_final_word() {
        let source = HardwareSource::from_word_source(Scripted::words(&[
            0x0807_0605_0403_0201,
            0x100F_0E0D_0C0B_0A09,
        ]));
        let bytes = source.get_bytes(11).unwrap();
        assert_eq!(bytes, (1u8..=11).collect::<Vec<_>>());
    }

    #[test]
    fn exact_multiple_uses_whole_words() {
        let source = HardwareSource::from_word_source(Counter::new());
        let bytes = source.get_bytes(16).unwrap();
        assert_eq!(&bytes[..8], &1u64.to_le_bytes());
        assert_eq!(&bytes[8..], &2u64.to_le_bytes());
    }

    #[test]
    fn zero_counts_are_invalid() {
        let source = HardwareSource::from_word_source(Counter::new());
        assert_eq!(
            source.get_bits(0),
            Err(EntropyError::InvalidArgument {
                quantity: Quantity::Bits,
                requested: 0
            })
        );
        assert_eq!(
            source.get_bytes(0),
            Err(EntropyError::InvalidArgument {
                quantity: Quantity::Bytes,
                requested: 0
            })
        );
    }

    // -----------------------------------------------------------------------
    // Retry discipline
    // -----------------------------------------------------------------------

    #[test]
    fn transient_failures_are_retried() {
        let source = HardwareSource::from_word_source(Scripted::new(
            Instruction::RdRand,
            [None, None, None, Some(42)],
        ));
        assert_eq!(source.next_word().unwrap(), 42);
        assert_eq!(source.words.calls(), 4);
    }

    #[test]
    fn exhaustion_is_reported() {
        let source = HardwareSource::from_word_source(Scripted::new(Instruction::RdRand, []));
        assert_eq!(
            source.next_word(),
            Err(EntropyError::HardwareEntropyUnavailable {
                instruction: Instruction::RdRand,
                attempts: 10,
            })
        );
        assert_eq!(source.words.calls(), 10);
    }

    #[test]
    fn rdseed_gets_larger_budget() {
        let source = HardwareSource::from_word_source(Scripted::new(Instruction::RdSeed, []));
        assert!(matches!(
            source.next_word(),
            Err(EntropyError::HardwareEntropyUnavailable { attempts: 1000, .. })
        ));
        assert_eq!(source.words.calls(), 1000);
    }

    #[test]
    fn custom_budget_is_honoured() {
        let source = HardwareSource::from_word_source(Scripted::new(
            Instruction::RdRand,
            [None, None, Some(7)],
        ))
        .with_retry_policy(RetryPolicy::RDRAND.with_max_attempts(2));
        assert!(source.next_word().is_err());
        assert_eq!(source.words.calls(), 2);
    }

    #[test]
    fn all_ones_word_counts_as_failure() {
        let source = HardwareSource::from_word_source(Scripted::new(
            Instruction::RdRand,
            [Some(u64::MAX), Some(5)],
        ));
        assert_eq!(source.next_word().unwrap(), 5);

        let lenient = HardwareSource::from_word_source(Scripted::new(
            Instruction::RdRand,
            [Some(u64::MAX)],
        ))
        .with_retry_policy(RetryPolicy {
            reject_all_ones: false,
            ..RetryPolicy::RDRAND
        });
        assert_eq!(lenient.next_word().unwrap(), u64::MAX);
    }

    #[test]
    fn no_partial_output_on_exhaustion() {
        // First word succeeds, second never does.
        let source = HardwareSource::from_word_source(Scripted::words(&[0xAAAA_AAAA_AAAA_AAAA]));
        assert!(matches!(
            source.get_bytes(12),
            Err(EntropyError::HardwareEntropyUnavailable { .. })
        ));

        let source = HardwareSource::from_word_source(Scripted::words(&[0xAAAA_AAAA_AAAA_AAAA]));
        let mut dest = [0x55u8; 12];
        assert!(source.fill_bytes(&mut dest).is_err());
        assert_eq!(dest, [0x55u8; 12]);
    }

    // -----------------------------------------------------------------------
    // Trait surfaces
    // -----------------------------------------------------------------------

    #[test]
    fn random_source_info_follows_instruction() {
        let rand = HardwareSource::from_word_source(Counter::new());
        assert_eq!(RandomSource::info(&rand).name, "rdrand");
        let seed = HardwareSource::from_word_source(Scripted::new(Instruction::RdSeed, []));
        assert_eq!(seed.name(), "rdseed");
        assert_eq!(seed.snapshot().retry.max_attempts, 1000);
        assert_eq!(seed.snapshot().instruction, Instruction::RdSeed);
        assert_eq!(seed.snapshot().physics, RDSEED_INFO.physics);
    }

    #[test]
    fn random_float_uses_52_bits() {
        let source = HardwareSource::from_word_source(Scripted::words(&[1 << 51]));
        assert_eq!(source.random().unwrap(), 0.5);
    }

    #[test]
    fn try_rng_core_surface() {
        let mut source = HardwareSource::from_word_source(Counter::new());
        assert_eq!(source.try_next_u64().unwrap(), 1);
        assert_eq!(source.try_next_u32().unwrap(), 2);
        let mut buf = [0u8; 3];
        source.try_fill_bytes(&mut buf).unwrap();
        assert_eq!(buf, [3, 0, 0]);
    }

    #[test]
    fn unwrap_err_gives_infallible_rng() {
        use rand::{Rng, RngCore};
        let mut rng = HardwareSource::from_word_source(Counter::new()).unwrap_err();
        assert_eq!(rng.next_u64(), 1);
        let x: u8 = rng.random_range(0..10);
        assert!(x < 10);
    }

    #[test]
    fn detected_sources_match_capabilities() {
        let sources = detect_available_sources();
        let caps = crate::capability::capabilities();
        assert_eq!(sources.len(), caps.instructions().len());
        for (source, instruction) in sources.iter().zip(caps.instructions()) {
            assert_eq!(source.info().instruction, instruction);
        }
    }

    #[test]
    fn factory_respects_capability() {
        for i in Instruction::ALL {
            let result = HardwareSource::open(i);
            assert_eq!(result.is_ok(), i.is_supported());
            if let Err(e) = result {
                assert_eq!(e, EntropyError::UnsupportedHardware { instruction: Some(i) });
            }
        }
    }
}

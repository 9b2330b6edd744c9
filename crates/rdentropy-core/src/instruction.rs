//! The two hardware instructions, their retry discipline, and the word-level
//! seam between the assembly code and the CPU.
//!
//! Each invocation of RDRAND or RDSEED either yields a full word or reports
//! (via the carry flag) that the on-chip buffer is momentarily empty. The
//! [`WordSource`] trait captures exactly that: one attempt, one optional word.
//! Everything above it (retries, masking, buffer packing) lives in
//! [`crate::hardware`] and is exercised against scripted word sources in tests.

use serde::{Deserialize, Serialize};

use crate::capability;
use crate::error::{EntropyError, Result};

/// Width in bits of one invocation of the native instruction on this target.
///
/// On 32-bit x86 the instructions only produce 32-bit values; two of them are
/// concatenated to form each 64-bit word handed to the assembler.
#[cfg(target_arch = "x86")]
pub const NATIVE_WORD_BITS: u32 = 32;
#[cfg(not(target_arch = "x86"))]
pub const NATIVE_WORD_BITS: u32 = 64;

/// Width in bits of the words a [`WordSource`] yields.
pub const WORD_BITS: u32 = 64;

/// A hardware random-number instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Instruction {
    /// DRBG output, reseeded continuously from the on-die entropy source.
    RdRand,
    /// Conditioned entropy straight from the on-die source.
    RdSeed,
}

impl Instruction {
    pub const ALL: [Instruction; 2] = [Instruction::RdRand, Instruction::RdSeed];

    /// Lowercase identifier (`"rdrand"`, `"rdseed"`).
    pub fn name(self) -> &'static str {
        match self {
            Self::RdRand => "rdrand",
            Self::RdSeed => "rdseed",
        }
    }

    /// Parse an identifier, ignoring ASCII case.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|i| i.name().eq_ignore_ascii_case(name.trim()))
    }

    /// Retry discipline tuned for this instruction's failure rate.
    pub fn default_retry_policy(self) -> RetryPolicy {
        match self {
            Self::RdRand => RetryPolicy::RDRAND,
            Self::RdSeed => RetryPolicy::RDSEED,
        }
    }

    /// Whether the executing CPU supports this instruction.
    pub fn is_supported(self) -> bool {
        capability::capabilities().supports(self)
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RdRand => write!(f, "RDRAND"),
            Self::RdSeed => write!(f, "RDSEED"),
        }
    }
}

/// Per-word retry discipline.
///
/// `max_attempts` bounds the total number of invocations spent on a single
/// word, including the first one. Zero is treated as one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Invocations allowed per word before giving up.
    pub max_attempts: u32,
    /// Issue a spin-loop hint (`pause`) between failed attempts.
    pub spin_between_attempts: bool,
    /// Count an all-ones word as a failed attempt.
    ///
    /// Some AMD parts report success while returning `!0` forever after a
    /// suspend/resume cycle.
    pub reject_all_ones: bool,
}

impl RetryPolicy {
    /// Intel's DRNG guide: ten attempts make RDRAND underflow a hardware fault.
    pub const RDRAND: RetryPolicy = RetryPolicy {
        max_attempts: 10,
        spin_between_attempts: false,
        reject_all_ones: true,
    };

    /// RDSEED drains under load; retry longer and back off with `pause`.
    pub const RDSEED: RetryPolicy = RetryPolicy {
        max_attempts: 1000,
        spin_between_attempts: true,
        reject_all_ones: true,
    };

    /// Same policy with a different attempt budget (at least one).
    pub fn with_max_attempts(self, max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..self
        }
    }

    /// Effective attempt budget.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// One invocation of a hardware instruction.
///
/// `try_word` must not block and must not retry: a `None` means the
/// instruction signalled transient failure on this attempt.
pub trait WordSource: Send + Sync {
    /// Which instruction backs this source.
    fn instruction(&self) -> Instruction;

    /// Invoke the instruction once.
    fn try_word(&self) -> Option<u64>;
}

/// The real instruction on the executing CPU.
///
/// Only constructible after the capability detector confirmed support, so
/// `try_word` never executes an instruction the CPU lacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuWords {
    instruction: Instruction,
}

impl CpuWords {
    /// Capability-checked constructor.
    pub fn new(instruction: Instruction) -> Result<Self> {
        if instruction.is_supported() {
            Ok(Self { instruction })
        } else {
            Err(EntropyError::UnsupportedHardware {
                instruction: Some(instruction),
            })
        }
    }
}

impl WordSource for CpuWords {
    fn instruction(&self) -> Instruction {
        self.instruction
    }

    #[inline]
    fn try_word(&self) -> Option<u64> {
        match self.instruction {
            Instruction::RdRand => arch::rdrand_step(),
            Instruction::RdSeed => arch::rdseed_step(),
        }
    }
}

#[cfg(target_arch = "x86_64")]
mod arch {
    use std::arch::x86_64::{_rdrand64_step, _rdseed64_step};

    #[inline]
    pub(super) fn rdrand_step() -> Option<u64> {
        let mut word = 0u64;
        // SAFETY: CpuWords is only built once CPUID reported RDRAND.
        let ok = unsafe { _rdrand64_step(&mut word) };
        (ok == 1).then_some(word)
    }

    #[inline]
    pub(super) fn rdseed_step() -> Option<u64> {
        let mut word = 0u64;
        // SAFETY: CpuWords is only built once CPUID reported RDSEED.
        let ok = unsafe { _rdseed64_step(&mut word) };
        (ok == 1).then_some(word)
    }
}

#[cfg(target_arch = "x86")]
mod arch {
    use std::arch::x86::{_rdrand32_step, _rdseed32_step};

    #[inline]
    pub(super) fn rdrand_step() -> Option<u64> {
        let (mut lo, mut hi) = (0u32, 0u32);
        // SAFETY: CpuWords is only built once CPUID reported RDRAND.
        let ok = unsafe { _rdrand32_step(&mut lo) == 1 && _rdrand32_step(&mut hi) == 1 };
        ok.then(|| (u64::from(hi) << 32) | u64::from(lo))
    }

    #[inline]
    pub(super) fn rdseed_step() -> Option<u64> {
        let (mut lo, mut hi) = (0u32, 0u32);
        // SAFETY: CpuWords is only built once CPUID reported RDSEED.
        let ok = unsafe { _rdseed32_step(&mut lo) == 1 && _rdseed32_step(&mut hi) == 1 };
        ok.then(|| (u64::from(hi) << 32) | u64::from(lo))
    }
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
mod arch {
    // Capabilities are always false off x86, so these are unreachable.

    pub(super) fn rdrand_step() -> Option<u64> {
        None
    }

    pub(super) fn rdseed_step() -> Option<u64> {
        None
    }
}

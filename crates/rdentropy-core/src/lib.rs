//! # rdentropy-core
//!
//! **Raw hardware random numbers from RDRAND and RDSEED, capability-checked.**
//!
//! `rdentropy-core` wraps the x86 hardware random-number instructions in a
//! small, panic-free API: a one-time CPUID capability check, a bounded retry
//! loop per word, and exact bit/byte assembly.
//!
//! ## Quick Start
//!
//! ```no_run
//! use rdentropy_core::{HardwareSource, RandomSource};
//!
//! // Fails with UnsupportedHardware on CPUs without RDRAND.
//! let source = HardwareSource::rdrand()?;
//!
//! let value = source.get_bits(16)?;
//! assert!(value.to_u64().unwrap() < 1 << 16);
//!
//! let bytes = source.get_bytes(32)?;
//! assert_eq!(bytes.len(), 32);
//! # Ok::<(), rdentropy_core::EntropyError>(())
//! ```
//!
//! ## Architecture
//!
//! Capability detector → factory → word source (one instruction attempt)
//! → bounded retry → little-endian assembly → caller
//!
//! No whitening, hashing, or DRBG is layered on top: every byte returned came
//! straight out of the instruction. No source ever falls back to a weaker
//! generator; when the hardware is missing or exhausted the caller gets an
//! [`EntropyError`].
//!
//! Every source implements the [`RandomSource`] trait. [`LegacyRandom`] adapts
//! any of them to the classic seeded-generator surface.

pub mod capability;
pub mod error;
pub mod hardware;
pub mod instruction;
pub mod legacy;
pub mod source;

pub use capability::{
    Capabilities, CpuVendor, capabilities, has_hardware_rand, has_hardware_seed, init,
    require_hardware,
};
pub use error::{EntropyError, Quantity, integral_count, positive_count};
pub use hardware::{HardwareSource, detect_available_sources};
pub use instruction::{CpuWords, Instruction, RetryPolicy, WordSource};
pub use legacy::LegacyRandom;
pub use source::{FLOAT_BITS, RandomBits, RandomSource, SourceInfo, SourceInfoSnapshot};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

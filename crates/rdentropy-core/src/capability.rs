//! One-time CPU capability detection.
//!
//! The CPUID query runs at most once per process, on first use or on an
//! explicit [`init`] call. The result is cached in a write-once cell and read
//! without locking afterwards.

use std::sync::OnceLock;

use serde::Serialize;

use crate::error::{EntropyError, Result};
use crate::instruction::Instruction;

/// CPUID.01H:ECX bit 30.
pub const RDRAND_ECX_MASK: u32 = 1 << 30;
/// CPUID.(EAX=07H, ECX=0):EBX bit 18.
pub const RDSEED_EBX_MASK: u32 = 1 << 18;

/// CPU manufacturer as reported by CPUID leaf 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CpuVendor {
    Intel,
    Amd,
    Other,
}

impl CpuVendor {
    /// Classify a 12-byte vendor identification string.
    pub fn from_id(vendor_id: &str) -> Self {
        match vendor_id {
            "GenuineIntel" => Self::Intel,
            "AuthenticAMD" => Self::Amd,
            _ => Self::Other,
        }
    }
}

impl std::fmt::Display for CpuVendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Intel => write!(f, "intel"),
            Self::Amd => write!(f, "amd"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Process-wide hardware RNG capabilities. Immutable once detected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    /// Classified vendor.
    pub vendor: CpuVendor,
    /// Raw vendor identification string (empty off x86).
    pub vendor_id: String,
    /// RDRAND is usable.
    pub has_rand: bool,
    /// RDSEED is usable.
    pub has_seed: bool,
}

impl Capabilities {
    /// Capabilities of a machine with no hardware RNG at all.
    pub fn none() -> Self {
        Self {
            vendor: CpuVendor::Other,
            vendor_id: String::new(),
            has_rand: false,
            has_seed: false,
        }
    }

    /// Decode raw CPUID registers.
    ///
    /// `leaf7_ebx` is `None` when the CPU's highest basic leaf is below 7.
    /// Only Intel and AMD parts are trusted; any other vendor reports no
    /// capability regardless of the feature bits.
    pub fn from_cpuid(vendor_id: &str, leaf1_ecx: u32, leaf7_ebx: Option<u32>) -> Self {
        let vendor = CpuVendor::from_id(vendor_id);
        let trusted = vendor != CpuVendor::Other;
        Self {
            vendor,
            vendor_id: vendor_id.to_string(),
            has_rand: trusted && leaf1_ecx & RDRAND_ECX_MASK == RDRAND_ECX_MASK,
            has_seed: trusted
                && leaf7_ebx.is_some_and(|ebx| ebx & RDSEED_EBX_MASK == RDSEED_EBX_MASK),
        }
    }

    /// Whether `instruction` is usable.
    pub fn supports(&self, instruction: Instruction) -> bool {
        match instruction {
            Instruction::RdRand => self.has_rand,
            Instruction::RdSeed => self.has_seed,
        }
    }

    /// Whether at least one instruction is usable.
    pub fn any(&self) -> bool {
        self.has_rand || self.has_seed
    }

    /// Usable instructions, RDRAND first.
    pub fn instructions(&self) -> Vec<Instruction> {
        Instruction::ALL
            .into_iter()
            .filter(|&i| self.supports(i))
            .collect()
    }
}

static CAPABILITIES: OnceLock<Capabilities> = OnceLock::new();

/// Cached capabilities, detecting them on first call.
pub fn capabilities() -> &'static Capabilities {
    CAPABILITIES.get_or_init(|| {
        let caps = detect();
        log::debug!(
            "hardware rng: vendor={} ({:?}) rdrand={} rdseed={}",
            caps.vendor,
            caps.vendor_id,
            caps.has_rand,
            caps.has_seed
        );
        caps
    })
}

/// Explicit startup hook. Equivalent to [`capabilities`].
pub fn init() -> &'static Capabilities {
    capabilities()
}

/// Cached RDRAND capability.
pub fn has_hardware_rand() -> bool {
    capabilities().has_rand
}

/// Cached RDSEED capability.
pub fn has_hardware_seed() -> bool {
    capabilities().has_seed
}

/// Fail fast unless at least one hardware instruction is present.
pub fn require_hardware() -> Result<&'static Capabilities> {
    let caps = capabilities();
    if caps.any() {
        Ok(caps)
    } else {
        Err(EntropyError::UnsupportedHardware { instruction: None })
    }
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[allow(unused_unsafe)]
fn detect() -> Capabilities {
    #[cfg(target_arch = "x86")]
    use std::arch::x86::{__cpuid, __cpuid_count};
    #[cfg(target_arch = "x86_64")]
    use std::arch::x86_64::{__cpuid, __cpuid_count};

    // SAFETY: CPUID is available on every CPU the standard library supports.
    let leaf0 = unsafe { __cpuid(0) };
    let vendor_id = vendor_string(&vendor_bytes(leaf0.ebx, leaf0.edx, leaf0.ecx));

    // SAFETY: leaves 1 and 7 are only queried when leaf 0 reports them.
    let leaf1_ecx = if leaf0.eax >= 1 {
        unsafe { __cpuid(1) }.ecx
    } else {
        0
    };
    let leaf7_ebx = (leaf0.eax >= 7).then(|| unsafe { __cpuid_count(7, 0) }.ebx);

    Capabilities::from_cpuid(&vendor_id, leaf1_ecx, leaf7_ebx)
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
fn detect() -> Capabilities {
    Capabilities::none()
}

/// Vendor string bytes in EBX, EDX, ECX order.
#[cfg_attr(not(any(target_arch = "x86", target_arch = "x86_64")), allow(dead_code))]
fn vendor_bytes(ebx: u32, edx: u32, ecx: u32) -> [u8; 12] {
    let mut id = [0u8; 12];
    id[..4].copy_from_slice(&ebx.to_le_bytes());
    id[4..8].copy_from_slice(&edx.to_le_bytes());
    id[8..].copy_from_slice(&ecx.to_le_bytes());
    id
}

#[cfg_attr(not(any(target_arch = "x86", target_arch = "x86_64")), allow(dead_code))]
fn vendor_string(id: &[u8; 12]) -> String {
    String::from_utf8_lossy(id)
        .trim_end_matches('\0')
        .to_string()
}

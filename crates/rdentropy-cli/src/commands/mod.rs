pub mod bits;
pub mod probe;
pub mod random;
pub mod report;
pub mod stream;

use rdentropy_core::{EntropyError, HardwareSource, Instruction};

/// Parse an instruction name. Clap's value parser has already restricted the
/// input, so anything else falls back to RDRAND with a warning.
pub fn parse_instruction(s: &str) -> Instruction {
    Instruction::from_name(s).unwrap_or_else(|| {
        eprintln!("Unknown instruction '{s}', using rdrand");
        Instruction::RdRand
    })
}

/// Capability-checked source with an optional retry budget override.
pub fn open_source(
    instruction: Instruction,
    retries: Option<u32>,
) -> Result<HardwareSource, EntropyError> {
    let source = HardwareSource::open(instruction)?;
    Ok(match retries {
        Some(n) => {
            let policy = source.retry_policy().with_max_attempts(n);
            log::debug!("{instruction}: retry budget overridden to {}", policy.attempts());
            source.with_retry_policy(policy)
        }
        None => source,
    })
}

/// Like [`open_source`], but exits the process on failure.
pub fn open_or_exit(instruction: &str, retries: Option<u32>) -> HardwareSource {
    open_source(parse_instruction(instruction), retries).unwrap_or_else(|e| exit_with(&e))
}

/// Print a one-line diagnostic and exit non-zero.
pub fn exit_with(err: &EntropyError) -> ! {
    eprintln!("Error: {err}");
    std::process::exit(1);
}

pub fn hex_encode(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02x}")).collect()
}

pub fn base64_encode(data: &[u8]) -> String {
    const CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut out = String::with_capacity(data.len().div_ceil(3) * 4);
    for chunk in data.chunks(3) {
        let b = [
            chunk[0],
            chunk.get(1).copied().unwrap_or(0),
            chunk.get(2).copied().unwrap_or(0),
        ];
        let triple = (u32::from(b[0]) << 16) | (u32::from(b[1]) << 8) | u32::from(b[2]);
        for (i, shift) in [18u32, 12, 6, 0].into_iter().enumerate() {
            if i <= chunk.len() {
                out.push(CHARS[((triple >> shift) & 0x3F) as usize] as char);
            } else {
                out.push('=');
            }
        }
    }
    out
}

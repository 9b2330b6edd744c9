//! Integration tests for rdentropy-core.
//!
//! These run against the real instructions. On a CPU that lacks one, the
//! tests for it print a note and return early; the factory tests check the
//! refusal path instead.

use rdentropy_core::{
    EntropyError, HardwareSource, Instruction, LegacyRandom, Quantity, RandomSource,
    capabilities, detect_available_sources, has_hardware_rand, has_hardware_seed,
};
use rdentropy_tests::{bit_position_frequency, byte_frequency, monobit_frequency};

fn open_or_skip(instruction: Instruction) -> Option<HardwareSource> {
    match HardwareSource::open(instruction) {
        Ok(source) => Some(source),
        Err(e) => {
            eprintln!("skipping: {e}");
            None
        }
    }
}

#[test]
fn capability_flags_agree() {
    let caps = capabilities();
    assert_eq!(caps.has_rand, has_hardware_rand());
    assert_eq!(caps.has_seed, has_hardware_seed());
    assert_eq!(caps.has_rand, Instruction::RdRand.is_supported());
    assert_eq!(caps.has_seed, Instruction::RdSeed.is_supported());
}

#[test]
fn factory_refuses_missing_instruction() {
    for instruction in Instruction::ALL {
        match HardwareSource::open(instruction) {
            Ok(source) => {
                assert!(instruction.is_supported());
                assert_eq!(source.instruction(), instruction);
            }
            Err(e) => {
                assert!(!instruction.is_supported());
                assert_eq!(
                    e,
                    EntropyError::UnsupportedHardware {
                        instruction: Some(instruction)
                    }
                );
            }
        }
    }
}

#[test]
fn detect_sources_matches_capabilities() {
    let sources = detect_available_sources();
    assert_eq!(sources.len(), capabilities().instructions().len());
    for source in &sources {
        assert!(source.info().instruction.is_supported());
    }
}

#[test]
fn get_bits_stays_in_range() {
    for instruction in Instruction::ALL {
        let Some(source) = open_or_skip(instruction) else {
            continue;
        };
        for width in [1u32, 2, 7, 8, 9, 15, 16, 31, 32, 33, 63, 64] {
            for _ in 0..200 {
                let value = source.get_bits(width).unwrap();
                assert_eq!(value.width(), width);
                let v = value.to_u64().unwrap();
                if width < 64 {
                    assert!(v < 1u64 << width, "{instruction} width {width}: {v:#x}");
                }
            }
        }
        for width in [65u32, 100, 128] {
            let v = source.get_bits(width).unwrap().to_u128().unwrap();
            if width < 128 {
                assert!(v < 1u128 << width);
            }
        }
    }
}

#[test]
fn wide_request_has_exact_byte_length() {
    let Some(source) = open_or_skip(Instruction::RdRand) else {
        return;
    };
    let value = source.get_bits(1000).unwrap();
    assert_eq!(value.as_le_bytes().len(), 125);
    let value = source.get_bits(1001).unwrap();
    assert_eq!(value.as_le_bytes().len(), 126);
    assert!(value.as_le_bytes()[125] <= 1);
}

#[test]
fn get_bytes_returns_exact_lengths() {
    for instruction in Instruction::ALL {
        let Some(source) = open_or_skip(instruction) else {
            continue;
        };
        for n in [1usize, 2, 7, 8, 9, 16, 31, 64, 100, 1000] {
            assert_eq!(source.get_bytes(n).unwrap().len(), n);
        }
    }
}

#[test]
fn zero_counts_are_invalid() {
    let Some(source) = open_or_skip(Instruction::RdRand) else {
        return;
    };
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

#[test]
fn single_byte_draws_vary() {
    let Some(source) = open_or_skip(Instruction::RdRand) else {
        return;
    };
    let draws: Vec<u8> = (0..64).map(|_| source.get_bytes(1).unwrap()[0]).collect();
    assert!(
        draws.iter().any(|&b| b != draws[0]),
        "64 single-byte draws were all {:#04x}",
        draws[0]
    );
}

#[test]
fn random_floats_in_unit_interval() {
    let Some(source) = open_or_skip(Instruction::RdRand) else {
        return;
    };
    for _ in 0..1000 {
        let x = source.random().unwrap();
        assert!((0.0..1.0).contains(&x), "{x}");
    }
}

#[test]
fn sixteen_bit_draws_chi_square_100k() {
    let Some(source) = open_or_skip(Instruction::RdRand) else {
        return;
    };
    let values: Vec<u64> = (0..100_000)
        .map(|_| source.get_bits(16).unwrap().to_u64().unwrap())
        .collect();
    let result = bit_position_frequency(&values, 16);
    assert!(result.passed, "{}", result.details);
}

#[test]
#[ignore] // Run with: cargo test -- --ignored
fn rdseed_bytes_look_random() {
    let Some(source) = open_or_skip(Instruction::RdSeed) else {
        return;
    };
    let bytes = source.get_bytes(65_536).unwrap();
    let mono = monobit_frequency(&bytes);
    let freq = byte_frequency(&bytes);
    assert!(mono.p_value.is_some_and(|p| p > 1e-6), "{}", mono.details);
    assert!(freq.p_value.is_some_and(|p| p > 1e-6), "{}", freq.details);
}

#[test]
fn concurrent_callers_all_get_full_results() {
    let Some(source) = open_or_skip(Instruction::RdRand) else {
        return;
    };
    let source = &source;
    std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                s.spawn(move || {
                    for n in 1..=64usize {
                        assert_eq!(source.get_bytes(n).unwrap().len(), n);
                        let v = source.get_bits(12).unwrap().to_u64().unwrap();
                        assert!(v < 1 << 12);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    });
}

#[test]
fn legacy_facade_over_hardware() {
    let Ok(rng) = LegacyRandom::open(Instruction::RdRand) else {
        assert!(!has_hardware_rand());
        return;
    };
    assert!(rng.getrandbits(0).is_err());
    assert!(rng.getrandbytes(-3).is_err());
    assert!(rng.getrandbits(24).unwrap().to_u64().unwrap() < 1 << 24);
    assert_eq!(rng.getrandbytes(10).unwrap().len(), 10);
    rng.seed(42u64);
    rng.jumpahead(7);
    assert!(matches!(
        rng.getstate(),
        Err(EntropyError::UnsupportedOperation { .. })
    ));
    assert!(matches!(
        rng.setstate(()),
        Err(EntropyError::UnsupportedOperation { .. })
    ));
}

//! NIST SP 800-22 inspired randomness checks for raw hardware output.
//!
//! Each test returns a [`TestResult`] with a p-value (where applicable), a
//! pass/fail determination, and a letter grade (A through F). The battery is
//! deliberately small: enough to catch a broken assembler (stuck bits, bad
//! masking, repeated words) without pretending to certify a generator.

use std::f64::consts::PI;
use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use rustfft::{FftPlanner, num_complex::Complex};
use statrs::distribution::{ChiSquared, ContinuousCDF, Normal};
use statrs::function::erf::erfc;

// ═══════════════════════════════════════════════════════════════════════════════
// Core types
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of a single randomness test.
#[derive(Debug, Clone)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    pub p_value: Option<f64>,
    pub statistic: f64,
    pub details: String,
    pub grade: char,
}

impl TestResult {
    /// Letter grade from a p-value.
    ///
    /// - A: p >= 0.1
    /// - B: p >= 0.01
    /// - C: p >= 0.001
    /// - D: p >= 0.0001
    /// - F: otherwise or None
    pub fn grade_from_p(p: Option<f64>) -> char {
        match p {
            Some(p) if p >= 0.1 => 'A',
            Some(p) if p >= 0.01 => 'B',
            Some(p) if p >= 0.001 => 'C',
            Some(p) if p >= 0.0001 => 'D',
            _ => 'F',
        }
    }

    /// Pass if the p-value clears `threshold`.
    pub fn pass_from_p(p: Option<f64>, threshold: f64) -> bool {
        p.is_some_and(|p| p >= threshold)
    }

    fn from_p(name: &str, p: f64, statistic: f64, details: String) -> Self {
        Self {
            name: name.to_string(),
            passed: Self::pass_from_p(Some(p), 0.01),
            p_value: Some(p),
            statistic,
            details,
            grade: Self::grade_from_p(Some(p)),
        }
    }

    fn failed(name: &str, statistic: f64, details: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            p_value: Some(0.0),
            statistic,
            details: details.into(),
            grade: 'F',
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════════════

/// Unpack bytes into individual bits (MSB first per byte).
fn to_bits(data: &[u8]) -> Vec<u8> {
    data.iter()
        .flat_map(|&byte| (0..8).rev().map(move |shift| (byte >> shift) & 1))
        .collect()
}

/// Failing result for inputs too short to test.
fn insufficient(name: &str, needed: usize, got: usize) -> TestResult {
    TestResult {
        name: name.to_string(),
        passed: false,
        p_value: None,
        statistic: 0.0,
        details: format!("Insufficient data: need {needed}, got {got}"),
        grade: 'F',
    }
}

/// Upper-tail chi-squared probability. Zero for a degenerate distribution.
fn chi2_sf(statistic: f64, dof: f64) -> f64 {
    ChiSquared::new(dof).map(|d| d.sf(statistic)).unwrap_or(0.0)
}

/// Letter grade from a ratio in [0, 1] (entropy and compression style tests).
fn grade_from_ratio(ratio: f64) -> char {
    if ratio > 0.95 {
        'A'
    } else if ratio > 0.85 {
        'B'
    } else if ratio > 0.7 {
        'C'
    } else if ratio > 0.5 {
        'D'
    } else {
        'F'
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// 1. FREQUENCY TESTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Monobit frequency: proportion of 1s vs 0s should be ~50%.
pub fn monobit_frequency(data: &[u8]) -> TestResult {
    let name = "Monobit Frequency";
    let n = data.len() * 8;
    if n < 100 {
        return insufficient(name, 100, n);
    }
    let ones: i64 = data.iter().map(|b| i64::from(b.count_ones())).sum();
    let s = 2 * ones - n as i64;
    let s_obs = (s as f64).abs() / (n as f64).sqrt();
    let p = erfc(s_obs / 2.0_f64.sqrt());
    TestResult::from_p(name, p, s_obs, format!("S={s}, n={n}"))
}

/// Block frequency: proportion of ones within 128-bit blocks, chi-squared.
pub fn block_frequency(data: &[u8]) -> TestResult {
    let name = "Block Frequency";
    const BLOCK_BYTES: usize = 16;
    let num_blocks = data.len() / BLOCK_BYTES;
    if num_blocks < 10 {
        return insufficient(name, BLOCK_BYTES * 8 * 10, data.len() * 8);
    }
    let block_bits = (BLOCK_BYTES * 8) as f64;
    let chi2 = 4.0
        * block_bits
        * data
            .chunks_exact(BLOCK_BYTES)
            .map(|block| {
                let ones: u32 = block.iter().map(|b| b.count_ones()).sum();
                let proportion = f64::from(ones) / block_bits;
                (proportion - 0.5) * (proportion - 0.5)
            })
            .sum::<f64>();
    let p = chi2_sf(chi2, num_blocks as f64);
    TestResult::from_p(name, p, chi2, format!("blocks={num_blocks}, M=128"))
}

/// Byte frequency: chi-squared on the 256-bin byte histogram.
pub fn byte_frequency(data: &[u8]) -> TestResult {
    let name = "Byte Frequency";
    let n = data.len();
    if n < 256 {
        return insufficient(name, 256, n);
    }
    let mut hist = [0u64; 256];
    for &b in data {
        hist[b as usize] += 1;
    }
    let expected = n as f64 / 256.0;
    let chi2: f64 = hist
        .iter()
        .map(|&c| {
            let diff = c as f64 - expected;
            diff * diff / expected
        })
        .sum();
    let p = chi2_sf(chi2, 255.0);
    TestResult::from_p(
        name,
        p,
        chi2,
        format!("n={n}, expected_per_bin={expected:.1}"),
    )
}

/// Bit-position frequency for fixed-width values.
///
/// Counts how often each of the `width` low bit positions is set across
/// `values` and sums a two-cell chi-squared per position (`width` degrees of
/// freedom). A masking or shifting bug in word assembly shows up as one or
/// more positions stuck near 0% or 100%.
pub fn bit_position_frequency(values: &[u64], width: u32) -> TestResult {
    let name = "Bit Position Frequency";
    let n = values.len();
    if n < 100 {
        return insufficient(name, 100, n);
    }
    if width == 0 || width > 64 {
        return TestResult::failed(name, 0.0, format!("Unsupported width {width}"));
    }
    if let Some(&v) = values.iter().find(|&&v| width < 64 && v >> width != 0) {
        return TestResult::failed(
            name,
            0.0,
            format!("Value {v:#x} exceeds {width}-bit range"),
        );
    }

    let mut ones = vec![0u64; width as usize];
    for &v in values {
        for (bit, count) in ones.iter_mut().enumerate() {
            *count += (v >> bit) & 1;
        }
    }

    let half = n as f64 / 2.0;
    let chi2: f64 = ones
        .iter()
        .map(|&c| {
            let d = c as f64 - half;
            2.0 * d * d / half
        })
        .sum();
    let p = chi2_sf(chi2, f64::from(width));

    let (worst_bit, worst) = ones
        .iter()
        .enumerate()
        .max_by(|a, b| {
            let da = (*a.1 as f64 - half).abs();
            let db = (*b.1 as f64 - half).abs();
            da.total_cmp(&db)
        })
        .map(|(i, &c)| (i, c as f64 / n as f64))
        .unwrap_or((0, 0.5));

    TestResult::from_p(
        name,
        p,
        chi2,
        format!("n={n}, width={width}, worst bit {worst_bit} at {:.4}", worst),
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// 2. RUNS TESTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Runs test: number of uninterrupted runs of 0s or 1s.
pub fn runs_test(data: &[u8]) -> TestResult {
    let name = "Runs Test";
    let bits = to_bits(data);
    let n = bits.len();
    if n < 100 {
        return insufficient(name, 100, n);
    }
    let ones: usize = bits.iter().map(|&b| b as usize).sum();
    let prop = ones as f64 / n as f64;
    if (prop - 0.5).abs() >= 2.0 / (n as f64).sqrt() {
        return TestResult::failed(name, 0.0, format!("Pre-test failed: proportion={prop:.4}"));
    }
    let runs = 1 + bits.windows(2).filter(|w| w[0] != w[1]).count();
    let expected = 2.0 * n as f64 * prop * (1.0 - prop) + 1.0;
    let std = 2.0 * (2.0 * n as f64).sqrt() * prop * (1.0 - prop);
    if std < 1e-10 {
        return TestResult::failed(name, 0.0, "Zero variance");
    }
    let z = (runs as f64 - expected).abs() / std;
    let p = erfc(z / 2.0_f64.sqrt());
    TestResult::from_p(name, p, z, format!("runs={runs}, expected={expected:.0}"))
}

// ═══════════════════════════════════════════════════════════════════════════════
// 3. SPECTRAL TESTS
// ═══════════════════════════════════════════════════════════════════════════════

/// DFT spectral: periodic features show up as too many FFT peaks.
pub fn dft_spectral(data: &[u8]) -> TestResult {
    let name = "DFT Spectral";
    let bits = to_bits(data);
    let n = bits.len();
    if n < 64 {
        return insufficient(name, 64, n);
    }

    let mut buffer: Vec<Complex<f64>> = bits
        .iter()
        .map(|&b| Complex {
            re: if b == 1 { 1.0 } else { -1.0 },
            im: 0.0,
        })
        .collect();
    FftPlanner::<f64>::new().plan_fft_forward(n).process(&mut buffer);

    let half = n / 2;
    let threshold = (2.995732274 * n as f64).sqrt();
    let below = buffer[..half].iter().filter(|c| c.norm() < threshold).count() as f64;
    let expected = 0.95 * half as f64;
    let d = (below - expected) / (n as f64 * 0.95 * 0.05 / 4.0).sqrt();
    let p = erfc(d.abs() / 2.0_f64.sqrt());
    TestResult::from_p(
        name,
        p,
        d,
        format!("peaks_below_threshold={}/{half}", below as u64),
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// 4. ENTROPY TESTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Shannon entropy in bits per byte (max 8.0).
pub fn shannon_entropy(data: &[u8]) -> TestResult {
    let name = "Shannon Entropy";
    let n = data.len();
    if n < 16 {
        return insufficient(name, 16, n);
    }
    let mut hist = [0u64; 256];
    for &b in data {
        hist[b as usize] += 1;
    }
    let h: f64 = hist
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / n as f64;
            -p * p.log2()
        })
        .sum();
    let ratio = h / 8.0;
    TestResult {
        name: name.to_string(),
        passed: ratio > 0.85,
        p_value: None,
        statistic: h,
        details: format!("{h:.4} / 8.0 bits ({:.1}%)", ratio * 100.0),
        grade: grade_from_ratio(ratio),
    }
}

/// Compression ratio under zlib level 9 (random data ~1.0 or slightly above).
pub fn compression_ratio(data: &[u8]) -> TestResult {
    let name = "Compression Ratio";
    let n = data.len();
    if n < 32 {
        return insufficient(name, 32, n);
    }
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    let compressed = match encoder.write_all(data).and_then(|()| encoder.finish()) {
        Ok(c) => c,
        Err(e) => return TestResult::failed(name, 0.0, format!("zlib error: {e}")),
    };
    let ratio = compressed.len() as f64 / n as f64;
    TestResult {
        name: name.to_string(),
        passed: ratio > 0.85,
        p_value: None,
        statistic: ratio,
        details: format!("{}/{n} = {ratio:.4}", compressed.len()),
        grade: grade_from_ratio(ratio),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// 5. CORRELATION TESTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Serial correlation: lag-1 correlation between consecutive bytes.
pub fn serial_correlation(data: &[u8]) -> TestResult {
    let name = "Serial Correlation";
    let n = data.len();
    if n < 20 {
        return insufficient(name, 20, n);
    }
    let arr: Vec<f64> = data.iter().map(|&b| f64::from(b)).collect();
    let mean = arr.iter().sum::<f64>() / n as f64;
    let var = arr.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / n as f64;
    if var < 1e-10 {
        return TestResult {
            p_value: None,
            ..TestResult::failed(name, 1.0, "Zero variance")
        };
    }
    let sum: f64 = arr.windows(2).map(|w| (w[0] - mean) * (w[1] - mean)).sum();
    let r = sum / ((n - 1) as f64 * var);
    let z = r * (n as f64).sqrt();
    let p = 2.0 * (1.0 - Normal::standard().cdf(z.abs()));
    TestResult::from_p(name, p, r.abs(), format!("r={r:.6}, z={z:.4}"))
}

/// Monte Carlo pi: consecutive byte pairs as points in the unit square.
pub fn monte_carlo_pi(data: &[u8]) -> TestResult {
    let name = "Monte Carlo Pi";
    let n_points = data.len() / 2;
    if n_points < 100 {
        return insufficient(name, 200, data.len());
    }
    let inside = data
        .chunks_exact(2)
        .filter(|pair| {
            let x = (f64::from(pair[0]) + 0.5) / 256.0;
            let y = (f64::from(pair[1]) + 0.5) / 256.0;
            x * x + y * y <= 1.0
        })
        .count();
    let estimate = 4.0 * inside as f64 / n_points as f64;
    let error = (estimate - PI).abs() / PI;
    let grade = if error < 0.01 {
        'A'
    } else if error < 0.03 {
        'B'
    } else if error < 0.05 {
        'C'
    } else if error < 0.1 {
        'D'
    } else {
        'F'
    };
    TestResult {
        name: name.to_string(),
        passed: error < 0.05,
        p_value: None,
        statistic: estimate,
        details: format!("pi~{estimate:.6}, error={:.4}%", error * 100.0),
        grade,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Test battery
// ═══════════════════════════════════════════════════════════════════════════════

/// Byte-oriented tests run by [`run_all_tests`].
const BATTERY: &[fn(&[u8]) -> TestResult] = &[
    // Frequency (3)
    monobit_frequency,
    block_frequency,
    byte_frequency,
    // Runs (1)
    runs_test,
    // Spectral (1)
    dft_spectral,
    // Entropy (2)
    shannon_entropy,
    compression_ratio,
    // Correlation (1)
    serial_correlation,
    // Practical (1)
    monte_carlo_pi,
];

/// Run the byte-oriented battery on a byte slice.
pub fn run_all_tests(data: &[u8]) -> Vec<TestResult> {
    BATTERY.iter().map(|test| test(data)).collect()
}

/// Overall quality score (0-100).
///
/// Each grade maps to a score: A=100, B=75, C=50, D=25, F=0. Returns the
/// average across all tests.
pub fn calculate_quality_score(results: &[TestResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    let total: f64 = results
        .iter()
        .map(|r| match r.grade {
            'A' => 100.0,
            'B' => 75.0,
            'C' => 50.0,
            'D' => 25.0,
            _ => 0.0,
        })
        .sum();
    total / results.len() as f64
}

/// Letter grade for an overall quality score.
pub fn grade_from_score(score: f64) -> char {
    if score >= 80.0 {
        'A'
    } else if score >= 60.0 {
        'B'
    } else if score >= 40.0 {
        'C'
    } else if score >= 20.0 {
        'D'
    } else {
        'F'
    }
}

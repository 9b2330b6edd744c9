use std::time::Instant;

use rdentropy_core::{HardwareSource, Instruction, SourceInfoSnapshot, capabilities};
use rdentropy_tests::TestResult;
use serde::Serialize;

/// One test outcome, as written to the JSON report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    pub test: String,
    pub passed: bool,
    pub p_value: Option<f64>,
    pub statistic: f64,
    pub grade: char,
    pub details: String,
}

impl From<&TestResult> for ReportRow {
    fn from(r: &TestResult) -> Self {
        Self {
            test: r.name.clone(),
            passed: r.passed,
            p_value: r.p_value,
            statistic: r.statistic,
            grade: r.grade,
            details: r.details.clone(),
        }
    }
}

/// Battery outcome for one instruction.
#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub source: SourceInfoSnapshot,
    pub samples: usize,
    pub elapsed_sec: f64,
    pub score: f64,
    pub grade: char,
    pub passed: usize,
    pub results: Vec<ReportRow>,
}

pub fn run(samples: usize, instruction: Option<&str>, output_path: Option<&str>, retries: Option<u32>) {
    let instructions: Vec<Instruction> = match instruction {
        Some(name) => vec![super::parse_instruction(name)],
        None => capabilities().instructions(),
    };

    if instructions.is_empty() {
        eprintln!("Error: this cpu supports neither RDRAND nor RDSEED");
        std::process::exit(1);
    }

    println!(
        "Running test battery on {} instruction(s), {} bytes each...\n",
        instructions.len(),
        samples
    );

    let mut reports = Vec::new();
    for instruction in instructions {
        let source = super::open_source(instruction, retries).unwrap_or_else(|e| super::exit_with(&e));
        print!("  Collecting from {}...", source.snapshot().name);

        let t0 = Instant::now();
        let report = match collect_and_test(&source, samples) {
            Ok(r) => r,
            Err(e) => {
                println!(" failed");
                super::exit_with(&e);
            }
        };
        println!(
            " → {:.0}/100 ({}/{} passed) [{:.1}s]",
            report.score,
            report.passed,
            report.results.len(),
            t0.elapsed().as_secs_f64()
        );
        reports.push(report);
    }

    if let Some(path) = output_path {
        match write_report(path, &reports) {
            Ok(()) => println!("\nReport saved to: {path}"),
            Err(e) => eprintln!("Failed to write report to {path}: {e}"),
        }
    }

    print_table(&reports);
}

/// Draw `samples` bytes plus a run of 16-bit values and grade them.
pub fn collect_and_test(
    source: &HardwareSource,
    samples: usize,
) -> Result<SourceReport, rdentropy_core::EntropyError> {
    let t0 = Instant::now();
    let data = source.get_bytes(samples)?;
    let mut results = rdentropy_tests::run_all_tests(&data);

    let n_values = (samples / 2).max(100);
    let values = (0..n_values)
        .map(|_| source.get_u64(16))
        .collect::<Result<Vec<u64>, _>>()?;
    results.push(rdentropy_tests::bit_position_frequency(&values, 16));

    let score = rdentropy_tests::calculate_quality_score(&results);
    Ok(SourceReport {
        source: source.snapshot(),
        samples,
        elapsed_sec: t0.elapsed().as_secs_f64(),
        score,
        grade: rdentropy_tests::grade_from_score(score),
        passed: results.iter().filter(|r| r.passed).count(),
        results: results.iter().map(ReportRow::from).collect(),
    })
}

pub fn write_report(path: &str, reports: &[SourceReport]) -> std::io::Result<()> {
    let doc = serde_json::json!({
        "version": rdentropy_core::VERSION,
        "capabilities": capabilities(),
        "reports": reports,
    });
    let json = serde_json::to_string_pretty(&doc).map_err(std::io::Error::other)?;
    std::fs::write(path, json)
}

fn print_table(reports: &[SourceReport]) {
    for report in reports {
        println!("\n{}", "=".repeat(72));
        println!("  {}", report.source.name);
        println!("{}", "-".repeat(72));
        println!(
            "  {:<24} {:>5} {:>10} {:>12}  Details",
            "Test", "Grade", "p-value", "Statistic"
        );
        for row in &report.results {
            let p = row
                .p_value
                .map(|p| format!("{p:.6}"))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  {:<24} {:>5} {:>10} {:>12.4}  {}",
                row.test, row.grade, p, row.statistic, row.details
            );
        }
    }

    println!("\n{}", "=".repeat(72));
    println!("{:<25} {:>6} {:>6} {:>8}", "Source", "Score", "Grade", "Pass");
    println!("{}", "-".repeat(72));
    for report in reports {
        println!(
            "  {:<23} {:>5.1} {:>6} {:>4}/{}",
            report.source.name,
            report.score,
            report.grade,
            report.passed,
            report.results.len()
        );
    }
}

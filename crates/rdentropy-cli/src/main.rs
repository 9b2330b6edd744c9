//! CLI for rdentropy — raw RDRAND/RDSEED output from the command line.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rdentropy")]
#[command(about = "rdentropy — raw hardware random numbers from RDRAND and RDSEED")]
#[command(version = rdentropy_core::VERSION)]
struct Cli {
    /// Override the per-word retry budget for the selected instruction
    #[arg(long, global = true)]
    retries: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the CPU vendor and which hardware RNG instructions are usable
    Probe {
        /// Print capabilities as JSON
        #[arg(long)]
        json: bool,
    },

    /// Draw unsigned integers of a fixed bit width, printed as hex
    Bits {
        /// Width of each value in bits
        #[arg(long)]
        width: u32,

        /// Number of values to draw
        #[arg(long, default_value = "1")]
        count: usize,

        /// Instruction to draw from
        #[arg(long, default_value = "rdrand", value_parser = ["rdrand", "rdseed"])]
        instruction: String,
    },

    /// Draw floats uniformly distributed in [0, 1)
    Random {
        /// Number of values to draw
        #[arg(long, default_value = "1")]
        count: usize,

        /// Instruction to draw from
        #[arg(long, default_value = "rdrand", value_parser = ["rdrand", "rdseed"])]
        instruction: String,
    },

    /// Stream raw hardware bytes to stdout (pipe-friendly)
    Stream {
        /// Output format
        #[arg(long, default_value = "raw", value_parser = ["raw", "hex", "base64"])]
        format: String,

        /// Bytes/sec rate limit (0 = unlimited)
        #[arg(long, default_value = "0")]
        rate: usize,

        /// Total bytes (0 = infinite, stop with Ctrl+C)
        #[arg(long, default_value = "0")]
        bytes: usize,

        /// Instruction to draw from
        #[arg(long, default_value = "rdrand", value_parser = ["rdrand", "rdseed"])]
        instruction: String,
    },

    /// Run the randomness test battery on raw hardware output
    Report {
        /// Number of bytes to collect
        #[arg(long, default_value = "10000")]
        samples: usize,

        /// Test a single instruction (default: every supported one)
        #[arg(long, value_parser = ["rdrand", "rdseed"])]
        instruction: Option<String>,

        /// Write the report as JSON to this path
        #[arg(long)]
        output: Option<String>,
    },
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let retries = cli.retries;

    match cli.command {
        Commands::Probe { json } => commands::probe::run(json),
        Commands::Bits {
            width,
            count,
            instruction,
        } => commands::bits::run(width, count, &instruction, retries),
        Commands::Random { count, instruction } => {
            commands::random::run(count, &instruction, retries)
        }
        Commands::Stream {
            format,
            rate,
            bytes,
            instruction,
        } => commands::stream::run(&format, rate, bytes, &instruction, retries),
        Commands::Report {
            samples,
            instruction,
            output,
        } => commands::report::run(samples, instruction.as_deref(), output.as_deref(), retries),
    }
}

//! Basic hardware random example.
//!
//! Probes the CPU, then draws a few values from every supported instruction.
//!
//! Run: `cargo run --example basic`

use rdentropy_core::{RandomSource, capabilities, detect_available_sources};

fn main() {
    let caps = capabilities();
    println!("CPU vendor: {} ({})", caps.vendor, caps.vendor_id);
    println!("RDRAND: {}  RDSEED: {}", caps.has_rand, caps.has_seed);

    let sources = detect_available_sources();
    if sources.is_empty() {
        eprintln!("No hardware random instruction available on this CPU.");
        std::process::exit(1);
    }

    for source in &sources {
        println!("\n{}: {}", source.name(), source.info().description);

        match source.get_bits(16) {
            Ok(v) => println!("  16 bits: {v:#x}"),
            Err(e) => println!("  16 bits: {e}"),
        }
        match source.random() {
            Ok(x) => println!("  float:   {x:.12}"),
            Err(e) => println!("  float:   {e}"),
        }
        match source.get_bytes(32) {
            Ok(bytes) => {
                print!("  32 bytes: ");
                for b in &bytes {
                    print!("{b:02x}");
                }
                println!();
            }
            Err(e) => println!("  32 bytes: {e}"),
        }
    }
}

use rdentropy_core::{HardwareSource, Instruction, SourceInfoSnapshot, capabilities};

pub fn run(json: bool) {
    let caps = capabilities();
    let sources: Vec<SourceInfoSnapshot> = caps
        .instructions()
        .into_iter()
        .filter_map(|i| HardwareSource::open(i).ok())
        .map(|s| s.snapshot())
        .collect();

    if json {
        let doc = serde_json::json!({
            "version": rdentropy_core::VERSION,
            "capabilities": caps,
            "sources": sources,
        });
        match serde_json::to_string_pretty(&doc) {
            Ok(s) => println!("{s}"),
            Err(e) => {
                eprintln!("Failed to serialize capabilities: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    println!("CPU vendor: {} ({})", caps.vendor, display_vendor_id(&caps.vendor_id));
    println!();
    for instruction in Instruction::ALL {
        let mark = if caps.supports(instruction) { "yes" } else { "no" };
        println!("  {:<8} {mark}", instruction.to_string());
    }

    for snap in &sources {
        println!();
        println!("{}: {}", snap.name, snap.description);
        println!("  {}", snap.physics);
        println!(
            "  retries: {} per word{}{}",
            snap.retry.attempts(),
            if snap.retry.spin_between_attempts { ", pause between attempts" } else { "" },
            if snap.retry.reject_all_ones { ", all-ones rejected" } else { "" },
        );
    }

    if !caps.any() {
        println!();
        println!("No hardware random instruction is usable on this CPU.");
    }
}

fn display_vendor_id(id: &str) -> &str {
    if id.is_empty() { "not x86" } else { id }
}

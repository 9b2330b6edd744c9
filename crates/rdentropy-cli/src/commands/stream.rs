use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

const CHUNK_SIZE: usize = 4096;

pub fn run(format: &str, rate: usize, n_bytes: usize, instruction: &str, retries: Option<u32>) {
    let source = super::open_or_exit(instruction, retries);
    let mut chunk_size = if rate > 0 { rate.min(CHUNK_SIZE) } else { CHUNK_SIZE };
    if format == "base64" {
        // Padding only at the very end.
        chunk_size = (chunk_size / 3 * 3).max(3);
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    }) {
        log::warn!("could not install Ctrl+C handler: {e}");
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut total = 0usize;

    while running.load(Ordering::SeqCst) {
        if n_bytes > 0 && total >= n_bytes {
            break;
        }
        let want = if n_bytes == 0 {
            chunk_size
        } else {
            chunk_size.min(n_bytes - total)
        };

        let data = match source.get_bytes(want) {
            Ok(d) => d,
            Err(e) => {
                let _ = out.flush();
                eprintln!("{total} bytes written");
                super::exit_with(&e);
            }
        };

        let write_result = match format {
            "hex" => out.write_all(super::hex_encode(&data).as_bytes()),
            "base64" => out.write_all(super::base64_encode(&data).as_bytes()),
            _ => out.write_all(&data),
        };

        if write_result.is_err() {
            break; // Broken pipe
        }
        let _ = out.flush();

        total += data.len();

        if rate > 0 {
            let sleep_dur = std::time::Duration::from_secs_f64(data.len() as f64 / rate as f64);
            std::thread::sleep(sleep_dur);
        }
    }

    if matches!(format, "hex" | "base64") {
        let _ = writeln!(out);
    }
    eprintln!("{total} bytes written");
}

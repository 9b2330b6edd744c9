use rdentropy_core::RandomSource;

pub fn run(count: usize, instruction: &str, retries: Option<u32>) {
    let source = super::open_or_exit(instruction, retries);

    for _ in 0..count {
        match source.random() {
            Ok(x) => println!("{x:.17}"),
            Err(e) => super::exit_with(&e),
        }
    }
}

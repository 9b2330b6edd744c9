pub fn run(width: u32, count: usize, instruction: &str, retries: Option<u32>) {
    let source = super::open_or_exit(instruction, retries);

    for _ in 0..count {
        match source.get_bits(width) {
            Ok(value) => println!("{value:#x}"),
            Err(e) => super::exit_with(&e),
        }
    }
}

fn main() {
    if let Err(err) = table_merger::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn main() {
    if let Err(err) = table_fixtures::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

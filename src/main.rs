fn main() {
    if let Err(err) = csv_predict::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

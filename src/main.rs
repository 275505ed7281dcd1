fn main() {
    if let Err(err) = csv_sqlgen::run() {
        eprintln!("error: {err:#}");
        std::process::exit(csv_sqlgen::error::exit_code_for(&err));
    }
}

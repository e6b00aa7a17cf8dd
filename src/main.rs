fn main() {
    if let Err(err) = magnet_watch::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

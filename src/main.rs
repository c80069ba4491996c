fn main() {
    env_logger::init();
    if let Err(err) = blockview::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

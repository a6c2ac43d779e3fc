fn main() {
    if let Err(err) = planar_shadows::run() {
        eprintln!("Application error: {err}");
        std::process::exit(1);
    }
}

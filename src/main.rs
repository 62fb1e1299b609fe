fn main() {
    if let Err(err) = pedigree_layout::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

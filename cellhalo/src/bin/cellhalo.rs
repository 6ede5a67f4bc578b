fn main() {
    std::process::exit(
        match cellhalo::cli::run_cellhalo(std::env::args_os().collect::<Vec<_>>().as_slice()) {
            Ok(_) => 0,
            Err(_) => 1,
        },
    );
}

fn main() {
    if let Err(error) = pdf_viewer_cli::run(std::env::args_os()) {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

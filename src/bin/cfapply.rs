fn main() {
    if let Err(err) = cfapply::cli::run(std::env::args_os()) {
        eprintln!("应用条件格式时出错: {err:#}");
        std::process::exit(1);
    }
}

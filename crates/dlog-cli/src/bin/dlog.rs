fn main() {
    dlog_cli::set_version(option_env!("DLOG_VERSION").unwrap_or(env!("CARGO_PKG_VERSION")));
    let code = dlog_cli::run_from_env();
    std::process::exit(code);
}

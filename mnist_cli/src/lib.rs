//! Shared plumbing for the command-line tools.
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Log to stderr, filtered by `RUST_LOG` (default: `info`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Parse arguments, exiting with status 1 on usage errors (0 for `--help`/`--version`).
pub fn parse_args<P: Parser>() -> P {
    match P::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            // Nothing useful to do if the terminal is gone.
            let _ = e.print();
            std::process::exit(code);
        }
    }
}

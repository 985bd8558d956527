//! Logging init: stderr only, so stdout stays machine-readable.

use tracing_subscriber::EnvFilter;

fn default_directive(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "warn,cpv=info,cpv_core=info",
        1 => "info,cpv=debug,cpv_core=debug",
        _ => "trace",
    }
}

/// `RUST_LOG` wins when set; otherwise `-v`/`-q` pick the level.
pub fn init(verbose: u8, quiet: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose, quiet)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .try_init();
}

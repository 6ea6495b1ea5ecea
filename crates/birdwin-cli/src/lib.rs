//! Shared helpers for the birdwin command line tools

pub mod output;

/// Default: no logs (clean JSON output for parsing).
/// Verbose: Info level logs on stderr.
pub fn init_logger(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Off
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}

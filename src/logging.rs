//! Logging setup.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Sets up logging of events to stderr.
///
/// `verbosity` shifts the default level: 0 logs warnings and errors,
/// negative values log errors only, 1 adds informational messages, 2 debug
/// and 3 or more trace messages.
///
/// Use the RUST_LOG environment variable to override the defaults.
///
/// E.g. To enable debug level logging:
///   RUST_LOG=DEBUG
///
/// Or to log only the signature loader in detail:
///   RUST_LOG=rrsig_filter::load=TRACE
pub fn init_logging(verbosity: i8) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level(verbosity).into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init()
        .ok();
}

fn level(verbosity: i8) -> LevelFilter {
    match verbosity {
        i8::MIN..=-1 => LevelFilter::ERROR,
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

//============ Testing =======================================================

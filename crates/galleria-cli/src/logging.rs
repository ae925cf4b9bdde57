// Tracing subscriber setup

use tracing::Level;

/// Install the fmt subscriber on stderr. Warnings only unless `verbose`.
pub fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };

    // A subscriber may already be installed when running under a test harness
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .try_init();
}

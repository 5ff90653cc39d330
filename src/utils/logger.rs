use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt;

/// Maps `-v`/`-q` counts onto a level, `Info` being the default.
pub fn level_from_flags(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::ERROR;
    }
    match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Diagnostics go to stderr so stdout only carries the report.
pub fn init(verbose: u8, quiet: bool) {
    let installed = fmt()
        .with_max_level(level_from_flags(verbose, quiet))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
    if let Err(e) = installed {
        eprintln!("failed to set up logging: {}", e);
    }
}

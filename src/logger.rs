use std::ffi::OsString;
use std::io;

use tracing::level_filters::LevelFilter;
use tracing::info;

/// `verbosity` is `-v` count minus `-q` count; 0 means info.
pub fn level_for(verbosity: i8) -> LevelFilter {
    match verbosity {
        i8::MIN..=-2 => LevelFilter::ERROR,
        -1 => LevelFilter::WARN,
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Install the stderr subscriber. Stdout stays free for progress lines.
pub fn init(verbosity: i8) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(level_for(verbosity))
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

pub fn log_command(program: &str, args: &[OsString]) {
    let joined = args
        .iter()
        .map(|a| a.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ");
    info!(%program, args = %joined, "running external tool");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(level_for(-5), LevelFilter::ERROR);
        assert_eq!(level_for(-1), LevelFilter::WARN);
        assert_eq!(level_for(0), LevelFilter::INFO);
        assert_eq!(level_for(1), LevelFilter::DEBUG);
        assert_eq!(level_for(3), LevelFilter::TRACE);
    }
}

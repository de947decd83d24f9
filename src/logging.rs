//! Logger setup for hosts embedding the engine

use log::LevelFilter;

/// Map a `-v` count to a level filter
///
/// `quiet` wins over any verbosity.
pub fn level_for(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn builder(verbosity: u8, quiet: bool) -> env_logger::Builder {
    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(level_for(verbosity, quiet))
        .format_timestamp(None)
        .parse_default_env();
    builder
}

/// Install the global logger
///
/// `RUST_LOG` directives are applied on top of the verbosity level.
///
/// # Panics
/// If a global logger is already installed.
pub fn init(verbosity: u8, quiet: bool) {
    builder(verbosity, quiet).init();
}

/// Install the global logger unless one is already set
pub fn try_init(verbosity: u8, quiet: bool) -> Result<(), log::SetLoggerError> {
    builder(verbosity, quiet).try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for() {
        assert_eq!(level_for(0, false), LevelFilter::Warn);
        assert_eq!(level_for(1, false), LevelFilter::Info);
        assert_eq!(level_for(2, false), LevelFilter::Debug);
        assert_eq!(level_for(7, false), LevelFilter::Trace);
        assert_eq!(level_for(3, true), LevelFilter::Error);
    }

    #[test]
    fn test_try_init_twice() {
        let _ = try_init(0, false);
        assert!(try_init(0, false).is_err());
    }
}

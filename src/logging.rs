//! Logging setup on the `log` facade with an `env_logger` backend.
//!
//! Level priority:
//!
//! 1. `RUST_LOG`, when set
//! 2. `--quiet` → error only
//! 3. `-v` → debug, `-vv` → trace
//! 4. otherwise info

use std::env;
use std::io::Write;

use env_logger::Builder;
use log::LevelFilter;

/// Initialise logging once at process start.
///
/// Uses `try_init`, so a second call (e.g. from tests) is a no-op.
pub fn init_logging(verbose: u8, quiet: bool) {
    let mut builder = Builder::new();

    if env::var_os("RUST_LOG").is_some() {
        builder.parse_default_env();
    } else {
        builder.filter_level(determine_level(verbose, quiet));
    }

    builder.format(move |buf, record| {
        let level = record.level();
        let style = buf.default_level_style(level);
        if verbose >= 1 {
            writeln!(
                buf,
                "{} {style}{:<5}{style:#} [{}] {}",
                buf.timestamp_seconds(),
                level,
                record.module_path().unwrap_or("unknown"),
                record.args()
            )
        } else {
            writeln!(buf, "{style}{:<5}{style:#} {}", level, record.args())
        }
    });

    if builder.try_init().is_ok() {
        log::debug!("logging initialised at {:?}", log::max_level());
    }
}

fn determine_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_follow_flags() {
        assert_eq!(determine_level(0, false), LevelFilter::Info);
        assert_eq!(determine_level(1, false), LevelFilter::Debug);
        assert_eq!(determine_level(3, false), LevelFilter::Trace);
    }

    #[test]
    fn quiet_wins_over_verbose() {
        assert_eq!(determine_level(2, true), LevelFilter::Error);
    }

    #[test]
    fn repeated_init_does_not_panic() {
        init_logging(0, true);
        init_logging(1, false);
    }
}

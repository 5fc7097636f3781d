use env_logger::{Builder, Target};
use log::{info, warn, LevelFilter};
use std::fs::OpenOptions;
use std::io::Write;
use std::str::FromStr;

use crate::config::AppConfig;

pub fn level_filter(level: &str) -> LevelFilter {
    LevelFilter::from_str(level.trim()).unwrap_or(LevelFilter::Info)
}

// Custom logger setup. `RUST_LOG` directives still apply on top of the
// configured level.
pub fn setup_logger(config: &AppConfig) {
    let mut builder = Builder::new();
    let to_file = config.log_file.is_some();

    builder
        .format(move |buf, record| {
            // Colour codes only make sense on a terminal
            let (level_color, reset) = if to_file {
                ("", "")
            } else {
                let color = match record.level() {
                    log::Level::Error => "\x1B[1;31m", // Bold Red
                    log::Level::Warn => "\x1B[1;33m",  // Bold Yellow
                    log::Level::Info => "\x1B[1;32m",  // Bold Green
                    log::Level::Debug => "\x1B[1;36m", // Bold Cyan
                    log::Level::Trace => "\x1B[1;35m", // Bold Magenta
                };
                (color, "\x1B[0m")
            };

            writeln!(
                buf,
                "[{}] {}{}{} [{}:{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                level_color,
                record.level(),
                reset,
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .filter(None, level_filter(&config.log_level));

    if let Ok(directives) = std::env::var("RUST_LOG") {
        builder.parse_filters(&directives);
    }

    let mut file_error = None;
    if let Some(path) = &config.log_file {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => {
                builder.target(Target::Pipe(Box::new(file)));
            }
            Err(e) => file_error = Some(format!("{}: {}", path.display(), e)),
        }
    }

    builder.init();

    if let Some(e) = file_error {
        warn!("Could not open log file {}, logging to stderr", e);
    }
    info!("Logger initialized at {} level", level_filter(&config.log_level));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_filter() {
        assert_eq!(level_filter("debug"), LevelFilter::Debug);
        assert_eq!(level_filter(" WARN "), LevelFilter::Warn);
        assert_eq!(level_filter("loud"), LevelFilter::Info);
    }
}

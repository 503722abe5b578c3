//! Logging bootstrap.
//!
//! One-shot commands log to stderr. `tagflow watch` also keeps rolling log
//! files under `.tagflow/logs/`, since it usually runs unattended.
//! Events are `key=value` lines, e.g. `event=sync_write note=Proj.md tag=#alpha`.

use std::path::Path;

use flexi_logger::{
    Cleanup, Criterion, Duplicate, FileSpec, FlexiLoggerError, Logger, LoggerHandle, Naming,
    WriteMode,
};

/// Environment variable overriding every other level source.
pub const LOG_ENV: &str = "TAGFLOW_LOG";

const LOG_FILE_BASENAME: &str = "tagflow";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 5 * 1024 * 1024;
const MAX_LOG_FILES: usize = 3;

/// Pick the log level: `TAGFLOW_LOG`, then `-v` count, then the vault config.
/// Unknown values fall through to the next source, ending at `warn`.
pub fn resolve_level(env: Option<&str>, verbose: u8, configured: Option<&str>) -> &'static str {
    if let Some(level) = env.and_then(normalize_level) {
        return level;
    }
    match verbose {
        0 => configured.and_then(normalize_level).unwrap_or("warn"),
        1 => "info",
        _ => "debug",
    }
}

pub fn normalize_level(level: &str) -> Option<&'static str> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Some("trace"),
        "debug" => Some("debug"),
        "info" => Some("info"),
        "warn" | "warning" => Some("warn"),
        "error" => Some("error"),
        "off" => Some("off"),
        _ => None,
    }
}

/// Log to stderr only. Keep the handle alive for the life of the process.
pub fn init_stderr(level: &str) -> Result<LoggerHandle, FlexiLoggerError> {
    Logger::try_with_str(level)?
        .log_to_stderr()
        .format(flexi_logger::default_format)
        .start()
}

/// Log to rotating files in `log_dir`, with warnings and errors also on stderr.
pub fn init_with_files(
    level: &str,
    log_dir: &Path,
) -> Result<LoggerHandle, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(log_dir)?;
    let handle = Logger::try_with_str(level)?
        .log_to_file(
            FileSpec::default()
                .directory(log_dir)
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(MAX_LOG_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .duplicate_to_stderr(Duplicate::Warn)
        .format_for_files(flexi_logger::detailed_format)
        .start()?;

    log::info!(
        "event=logging_init status=ok level={} log_dir={} version={}",
        level,
        log_dir.display(),
        env!("CARGO_PKG_VERSION")
    );
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_wins() {
        assert_eq!(resolve_level(Some("trace"), 2, Some("error")), "trace");
    }

    #[test]
    fn verbose_beats_config() {
        assert_eq!(resolve_level(None, 1, Some("error")), "info");
        assert_eq!(resolve_level(None, 3, None), "debug");
    }

    #[test]
    fn config_then_default() {
        assert_eq!(resolve_level(None, 0, Some("Info")), "info");
        assert_eq!(resolve_level(None, 0, None), "warn");
    }

    #[test]
    fn unknown_values_fall_through() {
        assert_eq!(resolve_level(Some("loud"), 0, Some("bogus")), "warn");
        assert_eq!(normalize_level("warning"), Some("warn"));
        assert_eq!(normalize_level("verbose"), None);
    }
}

use std::path::Path;

use flexi_logger::{Age, Cleanup, Criterion, Duplicate, FileSpec, Logger, LoggerHandle, Naming};
use once_cell::sync::OnceCell;

pub const LOG_SPEC_ENV: &str = "READER_LOG";

static LOGGER: OnceCell<LoggerHandle> = OnceCell::new();

/// Start file logging under `log_dir`. Later calls are no-ops.
///
/// Infos are duplicated to stderr so they do not interleave with the
/// screen, which owns stdout.
pub fn init(log_dir: &Path) -> anyhow::Result<()> {
    LOGGER.get_or_try_init(|| -> anyhow::Result<LoggerHandle> {
        std::fs::create_dir_all(log_dir)?;
        let spec = std::env::var(LOG_SPEC_ENV).unwrap_or_else(|_| "info".to_string());
        let handle = Logger::try_with_str(spec)?
            .duplicate_to_stderr(Duplicate::Info)
            .log_to_file(
                FileSpec::default()
                    .directory(log_dir)
                    .basename("reader-aloud"),
            )
            .rotate(
                Criterion::AgeOrSize(Age::Day, 10_000_000),
                Naming::Numbers,
                Cleanup::KeepLogFiles(7),
            )
            .start()?;
        Ok(handle)
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logger_creates_directory_once() {
        let temp_dir = tempfile::tempdir().unwrap();
        let logs = temp_dir.path().join("logs");
        init(&logs).unwrap();
        assert!(logs.exists());
        init(&temp_dir.path().join("other")).unwrap();
        assert!(!temp_dir.path().join("other").exists());
    }
}

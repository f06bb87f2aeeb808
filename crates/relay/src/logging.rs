use relay_platform::AppPaths;
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, LevelFilter, SharedLogger, TermLogger,
    TerminalMode, WriteLogger,
};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

/// `relay.log` under the data directory, reopened (directories included)
/// whenever the file disappears between writes.
struct LogFile {
    paths: AppPaths,
    file: Mutex<Option<File>>,
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

impl LogFile {
    fn open(paths: AppPaths) -> io::Result<Self> {
        paths.ensure_dirs()?;
        let file = open_append(&paths.log_file())?;
        Ok(Self {
            paths,
            file: Mutex::new(Some(file)),
        })
    }

    fn with_file<R>(&self, op: impl FnOnce(&mut File) -> io::Result<R>) -> io::Result<R> {
        let mut guard = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        let log_path = self.paths.log_file();
        if guard.is_none() || !log_path.exists() {
            self.paths.ensure_dirs()?;
            *guard = Some(open_append(&log_path)?);
        }
        let file = guard
            .as_mut()
            .ok_or_else(|| io::Error::other("log file not available"))?;
        op(file)
    }
}

impl Write for LogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.with_file(|file| file.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut guard = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        guard.as_mut().map_or(Ok(()), File::flush)
    }
}

/// Drop the older half of the log, cutting at a line boundary, once it
/// grows past `max_log_size`. Returns whether anything was removed.
fn trim_to_newest_half(log_path: &Path, max_log_size: u64) -> io::Result<bool> {
    if std::fs::metadata(log_path)?.len() <= max_log_size {
        return Ok(false);
    }
    let contents = std::fs::read(log_path)?;
    let midpoint = contents.len() / 2;
    let start = contents[midpoint..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(midpoint, |offset| midpoint + offset + 1);
    std::fs::write(log_path, &contents[start..])?;
    Ok(true)
}

/// Install the global logger: `relay.log` under the data directory (when it
/// can be opened), plus stderr when `verbose` is set.
///
/// Records are only emitted when `verbose` or `debug_enabled` is true.
pub fn init_logging(
    paths: Option<&AppPaths>,
    verbose: bool,
    debug_enabled: bool,
    max_log_size: u64,
) {
    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .add_filter_allow_str("relay")
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    if verbose {
        loggers.push(TermLogger::new(
            LevelFilter::Debug,
            config.clone(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ));
    }

    let trimmed = paths.is_some_and(|paths| {
        trim_to_newest_half(&paths.log_file(), max_log_size).unwrap_or(false)
    });
    let log_file = paths.and_then(|paths| LogFile::open(paths.clone()).ok());
    let log_path = log_file.as_ref().map(|log_file| log_file.paths.log_file());
    if let Some(log_file) = log_file {
        loggers.push(WriteLogger::new(LevelFilter::Debug, config, log_file));
    }

    if !loggers.is_empty() {
        let _ = CombinedLogger::init(loggers);
    }
    set_logging_enabled(verbose || debug_enabled);

    if let Some(log_path) = log_path {
        log::debug!("Logging to {}", log_path.display());
        if trimmed {
            log::debug!("Trimmed {} to its newest half", log_path.display());
        }
    }
}

pub fn set_logging_enabled(enabled: bool) {
    if enabled {
        log::set_max_level(log::LevelFilter::Debug);
    } else {
        log::set_max_level(log::LevelFilter::Off);
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use relay_platform::AppPaths;

    use super::{LogFile, set_logging_enabled, trim_to_newest_half};

    #[test]
    fn log_file_is_recreated_with_its_directory_after_removal() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let paths = AppPaths::rooted_at(temp_dir.path());
        let mut log_file = LogFile::open(paths.clone()).expect("log file should open");

        log_file
            .write_all(b"race started\n")
            .expect("initial write should succeed");
        std::fs::remove_dir_all(&paths.data_dir).expect("data directory should be removable");
        log_file
            .write_all(b"race won\n")
            .expect("writer should recreate the data directory and file");
        log_file.flush().expect("flush should succeed");

        let contents =
            std::fs::read_to_string(paths.log_file()).expect("recreated file should be readable");
        assert_eq!(contents, "race won\n");
    }

    #[test]
    fn oversized_log_keeps_newest_half_from_a_line_boundary() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let log_path = temp_dir.path().join("relay.log");
        std::fs::write(&log_path, "race-1\nrace-2\nrace-3\nrace-4\nrace-5\n")
            .expect("test log file should be written");

        let trimmed = trim_to_newest_half(&log_path, 10).expect("trim should succeed");

        let contents =
            std::fs::read_to_string(&log_path).expect("trimmed log file should be readable");
        assert!(trimmed);
        assert_eq!(contents, "race-4\nrace-5\n");
    }

    #[test]
    fn small_log_file_is_left_alone() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let log_path = temp_dir.path().join("relay.log");
        std::fs::write(&log_path, "one\n").expect("test log file should be written");

        let trimmed = trim_to_newest_half(&log_path, 1024).expect("trim should succeed");

        let contents = std::fs::read_to_string(&log_path).expect("log file should be readable");
        assert!(!trimmed);
        assert_eq!(contents, "one\n");
    }

    #[test]
    fn missing_log_file_is_reported_not_created() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let log_path = temp_dir.path().join("relay.log");

        assert!(trim_to_newest_half(&log_path, 10).is_err());
        assert!(!log_path.exists());
    }

    #[test]
    fn set_logging_enabled_updates_global_level() {
        set_logging_enabled(true);
        assert_eq!(log::max_level(), log::LevelFilter::Debug);

        set_logging_enabled(false);
        assert_eq!(log::max_level(), log::LevelFilter::Off);
    }
}

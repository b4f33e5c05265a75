//! The per-scan log: lines go to the console, and everything that isn't
//! console-only is also appended to a file that's truncated when a new scan
//! starts. Closed ports are the exception and only go to the file.

use std::{
    fs::{File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use parking_lot::Mutex;
use tracing::warn;

use crate::terminal_colors::*;

pub struct ScanLog {
    path: Option<PathBuf>,
    file: Mutex<Option<File>>,
}

impl ScanLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            file: Mutex::new(None),
        }
    }

    /// A log that only writes to the console.
    pub fn console_only() -> Self {
        Self {
            path: None,
            file: Mutex::new(None),
        }
    }

    /// Truncate the file and write `header` as its first line.
    pub fn reset(&self, header: &str) {
        let Some(path) = &self.path else {
            return;
        };

        let mut file = self.file.lock();
        *file = None;
        let result = File::create(path).and_then(|mut f| {
            writeln!(f, "{header}")?;
            Ok(f)
        });
        match result {
            Ok(f) => *file = Some(f),
            Err(err) => report_write_error(path, &err),
        }
    }

    pub fn log(&self, message: &str, console_only: bool) {
        self.log_colored("", message, console_only);
    }

    /// Like [`Self::log`] but with `color` applied to the console output.
    /// The file never gets escape codes.
    pub fn log_colored(&self, color: &str, message: &str, console_only: bool) {
        let timestamp = timestamp();

        println!("{GRAY}[{timestamp}]{RESET} {color}{message}{RESET}");

        if !console_only {
            self.append_or_report(&format!("[{timestamp}] {message}\n"));
        }
    }

    /// Append to the file without echoing to the console. Used for entries
    /// that would flood the terminal, like closed ports.
    pub fn log_file_only(&self, message: &str) {
        self.append_or_report(&format!("[{}] {message}\n", timestamp()));
    }

    fn append_or_report(&self, line: &str) {
        if let Err(err) = self.append(line) {
            if let Some(path) = &self.path {
                report_write_error(path, &err);
            }
        }
    }

    fn append(&self, line: &str) -> io::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        // the lock is held for the whole write so lines from concurrent tasks
        // never interleave
        let mut file = self.file.lock();
        if file.is_none() {
            *file = Some(OpenOptions::new().create(true).append(true).open(path)?);
        }
        let Some(f) = file.as_mut() else {
            return Ok(());
        };
        f.write_all(line.as_bytes())
    }
}

fn report_write_error(path: &Path, err: &io::Error) {
    eprintln!(
        "{RED}error writing to scan log {}: {err}{RESET}",
        path.display()
    );
    warn!(path = %path.display(), "failed to write to scan log: {err}");
}

fn timestamp() -> String {
    chrono::Local::now()
        .format("%m/%d/%Y, %I:%M:%S %p")
        .to_string()
}

#[cfg(test)]
mod test {
    use std::{fs, sync::Arc, thread};

    use super::*;

    #[test]
    fn test_reset_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.log");
        fs::write(&path, "old scan\nmore old lines\n").unwrap();

        let log = ScanLog::new(&path);
        log.reset("--- NEW SCAN ---");
        log.log("first", false);
        log.log("only on the console", true);
        log.log("second", false);

        let contents = fs::read_to_string(&path).unwrap();
        let lines = contents.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "--- NEW SCAN ---");
        assert!(lines[1].starts_with('[') && lines[1].ends_with("] first"));
        assert!(lines[2].ends_with("] second"));
        assert!(!contents.contains("old scan"));
    }

    #[test]
    fn test_file_only_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.log");

        let log = ScanLog::new(&path);
        log.reset("header");
        log.log_file_only("1.2.3.4:25565 - Port closed or timeout.");

        let contents = fs::read_to_string(&path).unwrap();
        let lines = contents.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].ends_with("] 1.2.3.4:25565 - Port closed or timeout."));

        // no file, nothing happens
        ScanLog::console_only().log_file_only("dropped");
    }

    #[test]
    fn test_log_without_reset_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.log");
        fs::write(&path, "kept\n").unwrap();

        let log = ScanLog::new(&path);
        log.log("appended", false);

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("kept\n"));
        assert!(contents.trim_end().ends_with("appended"));
    }

    #[test]
    fn test_concurrent_lines_stay_whole() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.log");
        let log = Arc::new(ScanLog::new(&path));
        log.reset("header");

        let threads = (0..8)
            .map(|t| {
                let log = log.clone();
                thread::spawn(move || {
                    for i in 0..50 {
                        log.log(&format!("thread {t} line {i} {}", "x".repeat(200)), false);
                    }
                })
            })
            .collect::<Vec<_>>();
        for thread in threads {
            thread.join().unwrap();
        }

        let contents = fs::read_to_string(&path).unwrap();
        let lines = contents.lines().skip(1).collect::<Vec<_>>();
        assert_eq!(lines.len(), 8 * 50);
        for line in lines {
            assert!(line.starts_with('['), "{line}");
            assert!(line.ends_with(&"x".repeat(200)), "{line}");
        }
    }

    #[test]
    fn test_unwritable_log_does_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        // a directory can't be opened as a file
        let log = ScanLog::new(dir.path());
        log.reset("header");
        log.log("still fine", false);
    }
}

//! Size-rotated log file
//!
//! A `Write` sink that appends to `<dir>/<name>` and, once the file has
//! grown past a size threshold, moves it to `<dir>/<name>.old` (replacing
//! any earlier backup) before continuing in a fresh file. File-system
//! failures are swallowed: a server must keep running even when its log
//! directory is unwritable.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Default rotation threshold: 10 MiB
pub const DEFAULT_MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;

/// Appending log writer with single-backup size rotation
#[derive(Debug)]
pub struct RotatingFileWriter {
    path: PathBuf,
    backup: PathBuf,
    max_bytes: u64,
    file: Option<File>,
    size: u64,
}

impl RotatingFileWriter {
    /// Open (or create) `dir/file_name`, rotating it first if it is already too large
    pub fn new(dir: impl AsRef<Path>, file_name: &str, max_bytes: u64) -> Self {
        let dir = dir.as_ref();
        let _ = fs::create_dir_all(dir);

        let mut writer = Self {
            path: dir.join(file_name),
            backup: dir.join(format!("{}.old", file_name)),
            max_bytes,
            file: None,
            size: 0,
        };
        writer.open();
        if writer.size > writer.max_bytes {
            writer.rotate();
        }
        writer
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> &Path {
        &self.backup
    }

    fn open(&mut self) {
        match OpenOptions::new().create(true).append(true).open(&self.path) {
            Ok(file) => {
                self.size = file.metadata().map(|m| m.len()).unwrap_or(0);
                self.file = Some(file);
            }
            Err(_) => {
                self.file = None;
                self.size = 0;
            }
        }
    }

    fn rotate(&mut self) {
        // Close before renaming; some platforms refuse to move an open file.
        self.file = None;
        let _ = fs::remove_file(&self.backup);
        let _ = fs::rename(&self.path, &self.backup);
        self.open();
    }
}

impl Write for RotatingFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.size > self.max_bytes {
            self.rotate();
        }

        if let Some(file) = self.file.as_mut() {
            if let Ok(written) = file.write(buf) {
                self.size += written as u64;
                return Ok(written);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(file) = self.file.as_mut() {
            let _ = file.flush();
        }
        Ok(())
    }
}

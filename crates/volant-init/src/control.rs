//! `.volant_init` control files.
//!
//! A control file holds one line: the absolute path of the program that
//! should become PID 1. Trailing whitespace is dropped and an empty line
//! means "no request".

use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::os::unix::ffi::OsStringExt;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Only the first line is read, and at most this many bytes of it.
const MAX_LINE_LEN: u64 = 4095;

/// Read the init path requested by the control file at `path`, if any.
pub fn read_control_file(path: &Path) -> Option<PathBuf> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "control file unreadable");
            return None;
        }
    };

    let mut line = Vec::new();
    if let Err(e) = BufReader::new(file.take(MAX_LINE_LEN)).read_until(b'\n', &mut line) {
        warn!(path = %path.display(), error = %e, "failed to read control file");
        return None;
    }

    parse_control_line(&line)
}

/// Trim a control file line; empty content is the same as no file.
///
/// Paths are bytes, so nothing here assumes UTF-8.
pub fn parse_control_line(line: &[u8]) -> Option<PathBuf> {
    let trimmed = line.trim_ascii_end();
    if trimmed.is_empty() {
        None
    } else {
        Some(PathBuf::from(OsString::from_vec(trimmed.to_vec())))
    }
}

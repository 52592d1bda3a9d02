//! Kernel command line parsing.

use std::path::Path;

use tracing::debug;

pub const DEFAULT_ROOT_DEVICE: &str = "/dev/vda";
pub const DEFAULT_ROOT_FSTYPE: &str = "ext4";

/// Longest values the boot image has ever accepted for each key.
const ROOT_DEVICE_MAX_LEN: usize = 255;
const ROOT_FSTYPE_MAX_LEN: usize = 63;

/// A `key=value` word from the command line.
///
/// Kept as bytes: the kernel passes the command line through unchanged, so
/// unrelated tokens may hold anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandLineToken<'a> {
    pub key: &'a [u8],
    pub value: &'a [u8],
}

/// Split a command line into `key=value` tokens. Bare words are skipped.
pub fn tokens(cmdline: &[u8]) -> impl Iterator<Item = CommandLineToken<'_>> {
    cmdline
        .split(|b| b.is_ascii_whitespace())
        .filter_map(|word| {
            let mut parts = word.splitn(2, |b| *b == b'=');
            let key = parts.next()?;
            let value = parts.next()?;
            Some(CommandLineToken { key, value })
        })
}

/// Root device selection, resolved once per boot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootParameters {
    pub root_device: String,
    pub root_fstype: String,
}

impl Default for BootParameters {
    fn default() -> Self {
        Self {
            root_device: DEFAULT_ROOT_DEVICE.to_string(),
            root_fstype: DEFAULT_ROOT_FSTYPE.to_string(),
        }
    }
}

impl BootParameters {
    /// Apply `root=` and `rootfstype=` from `cmdline` over the defaults.
    /// The last occurrence of a key wins.
    pub fn parse(cmdline: &str) -> Self {
        Self::parse_bytes(cmdline.as_bytes())
    }

    /// Same as [`parse`](Self::parse) for a raw command line. Only the two
    /// recognised values are decoded; invalid UTF-8 in them is replaced.
    pub fn parse_bytes(cmdline: &[u8]) -> Self {
        let mut params = Self::default();
        for token in tokens(cmdline) {
            match token.key {
                b"root" => params.root_device = decode(token.value, ROOT_DEVICE_MAX_LEN),
                b"rootfstype" => params.root_fstype = decode(token.value, ROOT_FSTYPE_MAX_LEN),
                _ => {}
            }
        }
        params
    }

    /// Read and parse the command line at `path`.
    ///
    /// An unreadable file is normal for images booted without one and
    /// yields the defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read(path) {
            Ok(cmdline) => Self::parse_bytes(&cmdline),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "no kernel command line; using defaults");
                Self::default()
            }
        }
    }
}

fn decode(value: &[u8], max: usize) -> String {
    truncate(&String::from_utf8_lossy(value), max)
}

/// Cut `value` to at most `max` bytes without splitting a character.
fn truncate(value: &str, max: usize) -> String {
    if value.len() <= max {
        return value.to_string();
    }
    let end = value
        .char_indices()
        .map(|(i, c)| i + c.len_utf8())
        .take_while(|end| *end <= max)
        .last()
        .unwrap_or(0);
    value.get(..end).unwrap_or_default().to_string()
}

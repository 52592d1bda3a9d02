use std::path::PathBuf;

use nix::errno::Errno;

/// Unrecoverable boot failures.
///
/// Every variant ends in a power-off: these happen either before the console
/// is usable or in the middle of a root switch, where nothing can be retried.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("mount({target}): {source}")]
    Mount { target: String, source: Errno },

    #[error("mknod({path}): {source}")]
    Mknod { path: String, source: Errno },

    #[error("open({path}): {source}")]
    OpenConsole {
        path: String,
        source: std::io::Error,
    },

    #[error("dup2(console, {fd}): {source}")]
    Redirect { fd: i32, source: std::io::Error },

    #[error("switching root to {root} failed at {step}: {source}")]
    ChangeRoot {
        root: String,
        step: &'static str,
        source: Errno,
    },

    #[error("execv({path}): {source}")]
    Exec { path: String, source: Errno },

    #[error("path contains an interior NUL byte: {0}")]
    InvalidPath(String),
}

pub type InitResult<T> = Result<T, InitError>;

/// Reasons the root-device branch gave up without a fatal error.
///
/// The decision engine logs these and moves on to the next tier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Fallback {
    #[error("{} exists but is not a block device", path.display())]
    DeviceWrongType { path: PathBuf },

    #[error("root device {} did not appear after {attempts} attempts", path.display())]
    DeviceTimeout { path: PathBuf, attempts: u32 },

    #[error("failed to mount root device {device} ({fstype}): {errno}")]
    RootMountFailed {
        device: String,
        fstype: String,
        errno: Errno,
    },

    #[error("disk provided no init candidate")]
    NoDiskCandidate,
}

/// Outcome of a step that may hand the boot back to a lower-priority tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<T> {
    Done(T),
    Fallback(Fallback),
}

//! Waiting for the root block device to show up.

use std::os::unix::fs::{FileTypeExt, PermissionsExt};
use std::path::Path;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{Fallback, Step};

const DEFAULT_ATTEMPTS: u32 = 50;
const DEFAULT_DELAY: Duration = Duration::from_millis(100);

/// Result of looking at a device path once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeResult {
    Ready,
    NotYetPresent,
    PresentButWrongType,
}

pub trait DeviceProbe {
    fn probe(&mut self, path: &Path) -> ProbeResult;
}

/// Probes with `stat(2)`.
#[derive(Debug, Default)]
pub struct StatProbe;

impl DeviceProbe for StatProbe {
    fn probe(&mut self, path: &Path) -> ProbeResult {
        match std::fs::metadata(path) {
            Ok(meta) if meta.file_type().is_block_device() => ProbeResult::Ready,
            Ok(meta) => {
                warn!(
                    path = %path.display(),
                    mode = %format!("0{:o}", meta.permissions().mode()),
                    "exists but is not a block device"
                );
                ProbeResult::PresentButWrongType
            }
            Err(e) => {
                match e.raw_os_error() {
                    Some(libc::ENOENT | libc::ENODEV | libc::ENXIO) => {}
                    _ => warn!(path = %path.display(), error = %e, "unexpected error probing device"),
                }
                ProbeResult::NotYetPresent
            }
        }
    }
}

/// How long to wait for the root device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for WaitPolicy {
    /// 50 probes, 100ms apart.
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            delay: DEFAULT_DELAY,
        }
    }
}

/// Poll `path` until it is a block device, at most `policy.attempts` times.
///
/// A path that exists with the wrong type ends the wait on the spot.
pub fn wait_for_block_device(
    probe: &mut impl DeviceProbe,
    path: &Path,
    policy: &WaitPolicy,
) -> Step<()> {
    for attempt in 1..=policy.attempts {
        match probe.probe(path) {
            ProbeResult::Ready => {
                debug!(path = %path.display(), attempt, "block device ready");
                return Step::Done(());
            }
            ProbeResult::PresentButWrongType => {
                return Step::Fallback(Fallback::DeviceWrongType {
                    path: path.to_path_buf(),
                });
            }
            ProbeResult::NotYetPresent if attempt < policy.attempts => {
                std::thread::sleep(policy.delay);
            }
            ProbeResult::NotYetPresent => {}
        }
    }

    Step::Fallback(Fallback::DeviceTimeout {
        path: path.to_path_buf(),
        attempts: policy.attempts,
    })
}

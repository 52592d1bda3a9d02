//! Pseudo-filesystem mounts.

use std::path::Path;

use nix::errno::Errno;
use tracing::{debug, warn};

use crate::error::{InitError, InitResult};
use crate::paths::BootPaths;
use crate::system::System;

/// A kernel-provided filesystem and where it goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PseudoFs {
    pub source: &'static str,
    pub target: &'static str,
    pub fstype: &'static str,
    pub mode: libc::mode_t,
}

pub const DEVTMPFS: PseudoFs = PseudoFs {
    source: "devtmpfs",
    target: "/dev",
    fstype: "devtmpfs",
    mode: 0o755,
};

/// Mounted before handoff, in this order.
pub const RUNTIME_FILESYSTEMS: [PseudoFs; 4] = [
    PseudoFs {
        source: "proc",
        target: "/proc",
        fstype: "proc",
        mode: 0o755,
    },
    PseudoFs {
        source: "sysfs",
        target: "/sys",
        fstype: "sysfs",
        mode: 0o755,
    },
    PseudoFs {
        source: "tmpfs",
        target: "/tmp",
        fstype: "tmpfs",
        mode: 0o777,
    },
    PseudoFs {
        source: "tmpfs",
        target: "/run",
        fstype: "tmpfs",
        mode: 0o755,
    },
];

/// Where in the boot we are, which decides how hard a mount failure is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountStage {
    /// Still on the initramfs root: a failed mount powers the machine off.
    PreRoot,
    /// Inside the disk root after the chroot: a failed mount is only logged.
    Chrooted,
}

/// `mkdir` that treats an existing directory as success.
///
/// Other failures are logged and swallowed; the mount that follows reports
/// the real problem.
pub(crate) fn ensure_dir(system: &mut impl System, path: &Path, mode: libc::mode_t) {
    match system.create_dir(path, mode) {
        Ok(()) | Err(Errno::EEXIST) => {}
        Err(e) => warn!(path = %path.display(), error = %e, "mkdir failed"),
    }
}

/// Mount one pseudo-filesystem. `EBUSY` (already mounted) counts as success.
pub fn mount_pseudo(
    system: &mut impl System,
    paths: &BootPaths,
    fs: &PseudoFs,
    stage: MountStage,
) -> InitResult<()> {
    let target = paths.resolve(fs.target);
    ensure_dir(system, &target, fs.mode);

    match system.mount(fs.source, &target, fs.fstype) {
        Ok(()) => {
            debug!(target = %target.display(), fstype = fs.fstype, "mounted");
            Ok(())
        }
        Err(Errno::EBUSY) => {
            debug!(target = %target.display(), "already mounted");
            Ok(())
        }
        Err(source) => match stage {
            MountStage::PreRoot => Err(InitError::Mount {
                target: target.display().to_string(),
                source,
            }),
            MountStage::Chrooted => {
                warn!(target = %target.display(), error = %source, "mount failed inside new root");
                Ok(())
            }
        },
    }
}

/// Mount `/proc`, `/sys`, `/tmp` and `/run`.
pub fn mount_runtime_filesystems(
    system: &mut impl System,
    paths: &BootPaths,
    stage: MountStage,
) -> InitResult<()> {
    for fs in &RUNTIME_FILESYSTEMS {
        mount_pseudo(system, paths, fs, stage)?;
    }
    Ok(())
}

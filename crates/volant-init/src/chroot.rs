//! Staging the root disk and switching into it.
//!
//! The disk is mounted on `/newroot` and searched for something to run. Only
//! when a candidate is found does the process chroot into it; otherwise the
//! staging mount is torn down and the initramfs keeps control.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::cmdline::BootParameters;
use crate::control;
use crate::engine::{CandidateInit, InitSource};
use crate::error::{Fallback, InitResult, Step};
use crate::mounts::{self, DEVTMPFS, MountStage};
use crate::paths::{BUILD_INIT, BootPaths};
use crate::system::System;

/// Mount the root device and, if it carries an init, chroot into it.
///
/// `Err` only comes from the root switch itself; a device that does not
/// mount or carries nothing to run is a [`Fallback`].
pub fn launch(
    system: &mut impl System,
    paths: &BootPaths,
    params: &BootParameters,
) -> InitResult<Step<CandidateInit>> {
    let staging = paths.staging();
    mounts::ensure_dir(system, &staging, 0o755);

    if let Err(errno) = system.mount(&params.root_device, &staging, &params.root_fstype) {
        remove_staging(system, &staging);
        return Ok(Step::Fallback(Fallback::RootMountFailed {
            device: params.root_device.clone(),
            fstype: params.root_fstype.clone(),
            errno,
        }));
    }
    info!(
        device = %params.root_device,
        fstype = %params.root_fstype,
        "mounted root filesystem"
    );

    let Some(candidate) = find_candidate(paths) else {
        if let Err(e) = system.unmount(&staging) {
            warn!(path = %staging.display(), error = %e, "failed to unmount staged root");
        }
        remove_staging(system, &staging);
        return Ok(Step::Fallback(Fallback::NoDiskCandidate));
    };

    system.change_root(&staging)?;

    // The initramfs mounts are out of reach now; bring them back under the new root.
    // /dev holds the console and device nodes the next init needs, so it is
    // held to the same standard as on the initramfs.
    let new_root = BootPaths::system();
    mounts::mount_pseudo(system, &new_root, &DEVTMPFS, MountStage::PreRoot)?;
    mounts::mount_runtime_filesystems(system, &new_root, MountStage::Chrooted)?;

    Ok(Step::Done(candidate))
}

/// Disk `.volant_init` first, then the build-pipeline init.
fn find_candidate(paths: &BootPaths) -> Option<CandidateInit> {
    if let Some(path) = control::read_control_file(&paths.disk_control_file()) {
        info!(path = %path.display(), "disk /.volant_init requests init");
        return Some(CandidateInit::new(path, InitSource::ControlFile));
    }

    if is_executable_file(&paths.disk_build_init()) {
        info!(path = BUILD_INIT, "using build init from disk");
        return Some(CandidateInit::new(
            PathBuf::from(BUILD_INIT),
            InitSource::DiskBuildInit,
        ));
    }

    None
}

/// Regular file with at least one execute bit.
fn is_executable_file(path: &Path) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) => {
            let mode = meta.permissions().mode();
            if meta.is_file() && mode & 0o111 != 0 {
                true
            } else {
                warn!(
                    path = %path.display(),
                    mode = %format!("0{mode:o}"),
                    "exists but is not executable"
                );
                false
            }
        }
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "failed to stat build init");
            }
            false
        }
    }
}

fn remove_staging(system: &mut impl System, staging: &Path) {
    if let Err(e) = system.remove_dir(staging) {
        warn!(path = %staging.display(), error = %e, "failed to remove staging directory");
    }
}

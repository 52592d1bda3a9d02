//! Early environment: directory skeleton, devtmpfs and the console.
//!
//! Runs before anything else so later failures reach an operator.

use nix::errno::Errno;
use tracing::info;

use crate::error::{InitError, InitResult};
use crate::mounts::{self, DEVTMPFS, MountStage};
use crate::paths::BootPaths;
use crate::system::System;

/// Directories the initramfs must have before the first mount.
const SKELETON: [&str; 8] = [
    "/proc",
    "/sys",
    "/dev",
    "/bin",
    "/usr",
    "/usr/bin",
    "/usr/local",
    "/usr/local/bin",
];

/// Create the skeleton, mount `/dev` and bind stdio to `/dev/console`.
pub fn prepare_environment(system: &mut impl System, paths: &BootPaths) -> InitResult<()> {
    for dir in SKELETON {
        mounts::ensure_dir(system, &paths.resolve(dir), 0o755);
    }

    mounts::mount_pseudo(system, paths, &DEVTMPFS, MountStage::PreRoot)?;
    ensure_console(system, paths)?;

    info!("console ready");
    Ok(())
}

fn ensure_console(system: &mut impl System, paths: &BootPaths) -> InitResult<()> {
    let console = paths.console();

    // devtmpfs normally provides it already
    match system.make_console(&console) {
        Ok(()) | Err(Errno::EEXIST) => {}
        Err(source) => {
            return Err(InitError::Mknod {
                path: console.display().to_string(),
                source,
            });
        }
    }

    system.redirect_stdio(&console)
}

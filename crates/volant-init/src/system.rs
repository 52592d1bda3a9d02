//! Privileged operations PID 1 performs on the guest.
//!
//! Everything that mutates the mount table, the filesystem root or the
//! standard descriptors goes through [`System`], so boot policy can be
//! exercised without root privileges.

use std::fs::OpenOptions;
use std::io;
use std::os::fd::IntoRawFd;
use std::path::Path;

use nix::errno::Errno;
use nix::mount::{MsFlags, mount, umount};
use nix::sys::stat::{Mode, SFlag, makedev, mknod};
use nix::unistd::{chdir, chroot, mkdir};

use crate::error::{InitError, InitResult};

const CONSOLE_MAJOR: u64 = 5;
const CONSOLE_MINOR: u64 = 1;

pub trait System {
    fn create_dir(&mut self, path: &Path, mode: libc::mode_t) -> nix::Result<()>;

    fn mount(&mut self, source: &str, target: &Path, fstype: &str) -> nix::Result<()>;

    fn unmount(&mut self, target: &Path) -> nix::Result<()>;

    fn remove_dir(&mut self, path: &Path) -> io::Result<()>;

    /// Create the console character device node (5:1, mode 0600).
    fn make_console(&mut self, path: &Path) -> nix::Result<()>;

    /// Bind descriptors 0, 1 and 2 to the console.
    fn redirect_stdio(&mut self, console: &Path) -> InitResult<()>;

    /// `chdir(new_root)`, `chroot(".")`, `chdir("/")`.
    ///
    /// Callers only see whether the whole switch happened; a failure part way
    /// through is reported with the step that broke.
    fn change_root(&mut self, new_root: &Path) -> InitResult<()>;
}

/// The real thing, backed by `nix` and `libc`.
#[derive(Debug, Default)]
pub struct LinuxSystem;

impl System for LinuxSystem {
    fn create_dir(&mut self, path: &Path, mode: libc::mode_t) -> nix::Result<()> {
        mkdir(path, Mode::from_bits_truncate(mode))
    }

    fn mount(&mut self, source: &str, target: &Path, fstype: &str) -> nix::Result<()> {
        mount(
            Some(source),
            target,
            Some(fstype),
            MsFlags::empty(),
            None::<&str>,
        )
    }

    fn unmount(&mut self, target: &Path) -> nix::Result<()> {
        umount(target)
    }

    fn remove_dir(&mut self, path: &Path) -> io::Result<()> {
        std::fs::remove_dir(path)
    }

    fn make_console(&mut self, path: &Path) -> nix::Result<()> {
        mknod(
            path,
            SFlag::S_IFCHR,
            Mode::S_IRUSR | Mode::S_IWUSR,
            makedev(CONSOLE_MAJOR, CONSOLE_MINOR),
        )
    }

    fn redirect_stdio(&mut self, console: &Path) -> InitResult<()> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(console)
            .map_err(|source| InitError::OpenConsole {
                path: console.display().to_string(),
                source,
            })?;
        let fd = file.into_raw_fd();

        for target in 0..=2 {
            // SAFETY: fd is an open descriptor we own; dup2 onto the standard slots
            // atomically replaces whatever was there.
            if unsafe { libc::dup2(fd, target) } < 0 {
                return Err(InitError::Redirect {
                    fd: target,
                    source: io::Error::last_os_error(),
                });
            }
        }

        if fd > 2 {
            // SAFETY: fd is not one of the standard slots and nothing else refers to it.
            unsafe {
                libc::close(fd);
            }
        }
        Ok(())
    }

    fn change_root(&mut self, new_root: &Path) -> InitResult<()> {
        let fail = |step: &'static str| {
            move |source: Errno| InitError::ChangeRoot {
                root: new_root.display().to_string(),
                step,
                source,
            }
        };

        chdir(new_root).map_err(fail("chdir"))?;
        chroot(".").map_err(fail("chroot"))?;
        chdir("/").map_err(fail("chdir(/)"))?;
        Ok(())
    }
}

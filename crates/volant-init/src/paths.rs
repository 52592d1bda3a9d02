//! Well-known paths inside the initramfs and on the staged root disk.

use std::path::{Path, PathBuf};

/// Kernel command line.
pub const CMDLINE: &str = "/proc/cmdline";
/// Optional control file naming a custom init (initramfs root and disk root).
pub const CONTROL_FILE: &str = "/.volant_init";
/// Mountpoint the root device is staged on before the chroot.
pub const STAGING_ROOT: &str = "/newroot";
/// Build-pipeline init, relative to the disk root.
pub const BUILD_INIT: &str = "/.fledge/init";
/// Default agent started when nothing else is requested.
pub const DEFAULT_AGENT: &str = "/bin/kestrel";
pub const CONSOLE: &str = "/dev/console";

/// Resolves the absolute guest paths above against a filesystem root.
///
/// Production always uses `/`; tests point it at a scratch directory so the
/// control files and staged disk contents can be laid out on a real fs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootPaths {
    root: PathBuf,
}

impl BootPaths {
    pub fn system() -> Self {
        Self::with_root("/")
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map an absolute guest path (e.g. `/proc`) under this root.
    pub fn resolve(&self, guest_path: &str) -> PathBuf {
        self.root.join(guest_path.trim_start_matches('/'))
    }

    pub fn cmdline(&self) -> PathBuf {
        self.resolve(CMDLINE)
    }

    pub fn control_file(&self) -> PathBuf {
        self.resolve(CONTROL_FILE)
    }

    pub fn console(&self) -> PathBuf {
        self.resolve(CONSOLE)
    }

    pub fn staging(&self) -> PathBuf {
        self.resolve(STAGING_ROOT)
    }

    pub fn disk_control_file(&self) -> PathBuf {
        self.staging().join(CONTROL_FILE.trim_start_matches('/'))
    }

    pub fn disk_build_init(&self) -> PathBuf {
        self.staging().join(BUILD_INIT.trim_start_matches('/'))
    }
}

impl Default for BootPaths {
    fn default() -> Self {
        Self::system()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_paths_are_absolute_guest_paths() {
        let paths = BootPaths::system();
        assert_eq!(paths.cmdline(), Path::new("/proc/cmdline"));
        assert_eq!(paths.control_file(), Path::new("/.volant_init"));
        assert_eq!(paths.staging(), Path::new("/newroot"));
        assert_eq!(paths.disk_control_file(), Path::new("/newroot/.volant_init"));
        assert_eq!(paths.disk_build_init(), Path::new("/newroot/.fledge/init"));
    }

    #[test]
    fn relocated_root_prefixes_every_path() {
        let paths = BootPaths::with_root("/tmp/scratch");
        assert_eq!(paths.resolve("/run"), Path::new("/tmp/scratch/run"));
        assert_eq!(
            paths.disk_build_init(),
            Path::new("/tmp/scratch/newroot/.fledge/init")
        );
    }
}

//! End-to-end boot decisions against a scratch root.
//!
//! Privileged calls go to a recording `System`; control files, the kernel
//! command line and the staged disk contents are real files under a tempdir.

use std::collections::VecDeque;
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use volant_init::device::{DeviceProbe, ProbeResult, WaitPolicy};
use volant_init::engine;
use volant_init::paths::BootPaths;
use volant_init::system::System;
use volant_init::{CandidateInit, InitResult, InitSource};

const CMDLINE: &str = "console=ttyS0 root=/dev/vdb rootfstype=btrfs";

#[derive(Debug, Default)]
struct RecordingSystem {
    mounts: Vec<(String, PathBuf, String)>,
    unmounts: Vec<PathBuf>,
    removed: Vec<PathBuf>,
    change_root: Option<PathBuf>,
}

impl System for RecordingSystem {
    fn create_dir(&mut self, _path: &Path, _mode: libc::mode_t) -> nix::Result<()> {
        Ok(())
    }

    fn mount(&mut self, source: &str, target: &Path, fstype: &str) -> nix::Result<()> {
        self.mounts
            .push((source.to_string(), target.to_path_buf(), fstype.to_string()));
        Ok(())
    }

    fn unmount(&mut self, target: &Path) -> nix::Result<()> {
        self.unmounts.push(target.to_path_buf());
        Ok(())
    }

    fn remove_dir(&mut self, path: &Path) -> io::Result<()> {
        self.removed.push(path.to_path_buf());
        Ok(())
    }

    fn make_console(&mut self, _path: &Path) -> nix::Result<()> {
        Ok(())
    }

    fn redirect_stdio(&mut self, _console: &Path) -> InitResult<()> {
        Ok(())
    }

    fn change_root(&mut self, new_root: &Path) -> InitResult<()> {
        self.change_root = Some(new_root.to_path_buf());
        Ok(())
    }
}

/// Block device that shows up on a given probe, or never.
struct AppearsOnProbe {
    ready_at: Option<u32>,
    probes: u32,
    seen: VecDeque<PathBuf>,
}

impl AppearsOnProbe {
    fn on(probe: u32) -> Self {
        Self {
            ready_at: Some(probe),
            probes: 0,
            seen: VecDeque::new(),
        }
    }

    fn never() -> Self {
        Self {
            ready_at: None,
            probes: 0,
            seen: VecDeque::new(),
        }
    }
}

impl DeviceProbe for AppearsOnProbe {
    fn probe(&mut self, path: &Path) -> ProbeResult {
        self.probes += 1;
        self.seen.push_back(path.to_path_buf());
        match self.ready_at {
            Some(k) if self.probes >= k => ProbeResult::Ready,
            _ => ProbeResult::NotYetPresent,
        }
    }
}

fn policy() -> WaitPolicy {
    WaitPolicy {
        attempts: 50,
        delay: Duration::ZERO,
    }
}

fn scratch_root() -> (tempfile::TempDir, BootPaths) {
    let dir = tempfile::tempdir().unwrap();
    let paths = BootPaths::with_root(dir.path());
    (dir, paths)
}

fn write_cmdline(paths: &BootPaths, cmdline: &str) {
    let path = paths.cmdline();
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, cmdline).unwrap();
}

fn install_build_init(paths: &BootPaths) {
    let init = paths.disk_build_init();
    fs::create_dir_all(init.parent().unwrap()).unwrap();
    fs::write(&init, b"#!/bin/sh\nexec buildkitd\n").unwrap();
    fs::set_permissions(&init, fs::Permissions::from_mode(0o755)).unwrap();
}

#[test]
fn scenario_a_disk_build_init() {
    let (_dir, paths) = scratch_root();
    write_cmdline(&paths, CMDLINE);
    install_build_init(&paths);
    let mut system = RecordingSystem::default();
    let mut probe = AppearsOnProbe::on(3);

    let candidate = engine::decide(&mut system, &mut probe, &paths, &policy()).unwrap();

    assert_eq!(
        candidate,
        CandidateInit::new("/.fledge/init", InitSource::DiskBuildInit)
    );
    assert_eq!(probe.probes, 3);
    assert!(probe.seen.iter().all(|p| p == Path::new("/dev/vdb")));
    assert_eq!(
        system.mounts.first(),
        Some(&(
            "/dev/vdb".to_string(),
            paths.staging(),
            "btrfs".to_string()
        ))
    );
    assert_eq!(system.change_root, Some(paths.staging()));

    // devtmpfs and the runtime filesystems come back inside the new root
    let remounted: Vec<_> = system.mounts.iter().skip(1).map(|m| m.1.clone()).collect();
    assert_eq!(
        remounted,
        ["/dev", "/proc", "/sys", "/tmp", "/run"]
            .iter()
            .map(PathBuf::from)
            .collect::<Vec<_>>()
    );
}

#[test]
fn scenario_b_device_never_appears() {
    let (_dir, paths) = scratch_root();
    write_cmdline(&paths, CMDLINE);
    fs::write(paths.control_file(), "/sbin/custom-init\n").unwrap();
    let mut system = RecordingSystem::default();
    let mut probe = AppearsOnProbe::never();

    let candidate = engine::decide(&mut system, &mut probe, &paths, &policy()).unwrap();

    assert_eq!(
        candidate,
        CandidateInit::new("/sbin/custom-init", InitSource::ControlFile)
    );
    assert_eq!(probe.probes, 50);
    assert!(system.mounts.is_empty());
    assert!(system.change_root.is_none());
}

#[test]
fn scenario_c_nothing_anywhere() {
    let (_dir, paths) = scratch_root();
    let mut system = RecordingSystem::default();
    let mut probe = AppearsOnProbe::never();

    let candidate = engine::decide(&mut system, &mut probe, &paths, &policy()).unwrap();

    assert_eq!(
        candidate,
        CandidateInit::new("/bin/kestrel", InitSource::DefaultAgent)
    );
    assert_eq!(probe.seen.front(), Some(&PathBuf::from("/dev/vda")));
    assert!(system.change_root.is_none());
}

#[test]
fn empty_disk_is_unmounted_before_falling_back() {
    let (_dir, paths) = scratch_root();
    write_cmdline(&paths, CMDLINE);
    fs::create_dir_all(paths.staging()).unwrap();
    fs::write(paths.control_file(), "/sbin/custom-init").unwrap();
    let mut system = RecordingSystem::default();

    let candidate =
        engine::decide(&mut system, &mut AppearsOnProbe::on(1), &paths, &policy()).unwrap();

    assert_eq!(candidate.source, InitSource::ControlFile);
    assert_eq!(system.unmounts, vec![paths.staging()]);
    assert_eq!(system.removed, vec![paths.staging()]);
    assert!(system.change_root.is_none());
}

#[test]
fn disk_control_file_is_used_after_pivot() {
    let (_dir, paths) = scratch_root();
    write_cmdline(&paths, CMDLINE);
    fs::create_dir_all(paths.staging()).unwrap();
    fs::write(paths.disk_control_file(), "/usr/local/bin/custom \n").unwrap();
    fs::write(paths.control_file(), "/sbin/initramfs-init\n").unwrap();
    let mut system = RecordingSystem::default();

    let candidate =
        engine::decide(&mut system, &mut AppearsOnProbe::on(1), &paths, &policy()).unwrap();

    assert_eq!(
        candidate,
        CandidateInit::new("/usr/local/bin/custom", InitSource::ControlFile)
    );
    assert_eq!(system.change_root, Some(paths.staging()));
}

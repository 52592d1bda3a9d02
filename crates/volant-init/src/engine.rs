//! Choosing what becomes PID 1.
//!
//! Priority, highest first:
//! 1. an init on the root disk (`/.volant_init` there, or `/.fledge/init`)
//! 2. `/.volant_init` in the initramfs
//! 3. the default agent, `/bin/kestrel`
//!
//! Anything that goes wrong with the root disk short of a broken root switch
//! drops to the next tier.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::chroot;
use crate::cmdline::BootParameters;
use crate::control;
use crate::device::{self, DeviceProbe, WaitPolicy};
use crate::error::{Fallback, InitResult, Step};
use crate::paths::{BootPaths, DEFAULT_AGENT};
use crate::system::System;

/// Where the chosen init came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitSource {
    ControlFile,
    DiskBuildInit,
    DefaultAgent,
}

impl fmt::Display for InitSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InitSource::ControlFile => "control-file",
            InitSource::DiskBuildInit => "disk-build-init",
            InitSource::DefaultAgent => "default-agent",
        })
    }
}

/// The program that will replace this process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateInit {
    pub path: PathBuf,
    pub source: InitSource,
}

impl CandidateInit {
    pub fn new(path: impl Into<PathBuf>, source: InitSource) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }

    fn default_agent() -> Self {
        Self::new(DEFAULT_AGENT, InitSource::DefaultAgent)
    }
}

/// Walk the tiers and return the init to hand off to.
///
/// On a disk hit the process is already chrooted into the disk when this
/// returns; the candidate path is relative to that new root.
pub fn decide(
    system: &mut impl System,
    probe: &mut impl DeviceProbe,
    paths: &BootPaths,
    policy: &WaitPolicy,
) -> InitResult<CandidateInit> {
    match try_root_device(system, probe, paths, policy)? {
        Step::Done(candidate) => return Ok(candidate),
        Step::Fallback(reason @ Fallback::NoDiskCandidate) => {
            info!(%reason, "falling back to initramfs init");
        }
        Step::Fallback(reason) => {
            warn!(%reason, "root device unavailable; falling back to initramfs init");
        }
    }

    if let Some(path) = control::read_control_file(&paths.control_file()) {
        return Ok(CandidateInit::new(path, InitSource::ControlFile));
    }

    Ok(CandidateInit::default_agent())
}

fn try_root_device(
    system: &mut impl System,
    probe: &mut impl DeviceProbe,
    paths: &BootPaths,
    policy: &WaitPolicy,
) -> InitResult<Step<CandidateInit>> {
    let params = BootParameters::load(&paths.cmdline());
    info!(
        root = %params.root_device,
        rootfstype = %params.root_fstype,
        "resolved root device"
    );

    match device::wait_for_block_device(probe, Path::new(&params.root_device), policy) {
        Step::Done(()) => chroot::launch(system, paths, &params),
        Step::Fallback(reason) => Ok(Step::Fallback(reason)),
    }
}

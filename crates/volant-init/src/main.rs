//! Initramfs init for Volant microVMs.
//!
//! Runs as PID 1 and:
//! 1. Creates the directory skeleton, mounts devtmpfs and binds stdio to the console
//! 2. Mounts /proc, /sys, /tmp and /run
//! 3. Picks the next init: disk build init, `/.volant_init`, or the kestrel agent
//! 4. Execs it (powering off if that fails)

use tracing::info;
use volant_init::device::{StatProbe, WaitPolicy};
use volant_init::mounts::{self, MountStage};
use volant_init::paths::BootPaths;
use volant_init::system::{LinuxSystem, System};
use volant_init::{CandidateInit, InitResult, bootstrap, engine, handoff, logging};

fn main() {
    logging::init();
    info!("starting");

    let paths = BootPaths::system();
    let mut system = LinuxSystem;

    match boot(&mut system, &paths) {
        Ok(candidate) => handoff::hand_off(&candidate),
        Err(e) => handoff::fatal(&e),
    }
}

fn boot(system: &mut impl System, paths: &BootPaths) -> InitResult<CandidateInit> {
    bootstrap::prepare_environment(system, paths)?;
    mounts::mount_runtime_filesystems(system, paths, MountStage::PreRoot)?;

    engine::decide(system, &mut StatProbe, paths, &WaitPolicy::default())
}

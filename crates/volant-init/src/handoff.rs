//! Handing PID 1 over, and the one way out when that is impossible.
//!
//! PID 1 must never exit: the kernel panics when it does. Every path here
//! either replaces the process image or powers the machine off.

use std::convert::Infallible;
use std::ffi::CString;
use std::io::Write;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::time::Duration;

use nix::sys::reboot::{RebootMode, reboot};
use nix::unistd::execv;
use tracing::{error, info};

use crate::engine::CandidateInit;
use crate::error::{InitError, InitResult};

const PARK_INTERVAL: Duration = Duration::from_secs(3600);

/// `execv(path, [path])`. Only ever returns with the reason it failed.
pub fn replace_process(path: &Path) -> InitResult<Infallible> {
    let program = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| InitError::InvalidPath(path.display().to_string()))?;

    execv(&program, &[program.as_c_str()]).map_err(|source| InitError::Exec {
        path: path.display().to_string(),
        source,
    })
}

/// Exec the chosen init, or power off trying.
pub fn hand_off(candidate: &CandidateInit) -> ! {
    info!(
        path = %candidate.path.display(),
        source = %candidate.source,
        "handing off to init"
    );

    let err = match replace_process(&candidate.path) {
        Ok(never) => match never {},
        Err(err) => err,
    };
    error!(
        path = %candidate.path.display(),
        source = %candidate.source,
        error = %err,
        "failed to exec init"
    );
    halt(&err)
}

/// Report an unrecoverable error on the console and power off.
pub fn fatal(err: &InitError) -> ! {
    error!(error = %err, "fatal boot error");
    halt(err)
}

fn halt(err: &InitError) -> ! {
    eprint!("{}", panic_banner(err));
    power_off()
}

fn panic_banner(err: &InitError) -> String {
    format!("\n\nINIT PANIC: {err}\n\n")
}

/// Flush the console and ask the kernel to power off.
///
/// If even that fails, park forever rather than let PID 1 exit.
pub fn power_off() -> ! {
    let _ = std::io::stdout().flush();
    let _ = std::io::stderr().flush();

    let Err(e) = reboot(RebootMode::RB_POWER_OFF);
    eprintln!("INIT PANIC: reboot(RB_POWER_OFF): {e}");

    loop {
        std::thread::sleep(PARK_INTERVAL);
    }
}

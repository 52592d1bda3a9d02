//! PID 1 for the Volant initramfs.
//!
//! Brings up `/dev`, the console and the runtime filesystems, picks the
//! program that should run as the guest's init and execs it. It never exits:
//! anything it cannot recover from powers the VM off.

pub mod bootstrap;
pub mod chroot;
pub mod cmdline;
pub mod control;
pub mod device;
pub mod engine;
pub mod error;
pub mod handoff;
pub mod logging;
pub mod mounts;
pub mod paths;
pub mod system;

pub use engine::{CandidateInit, InitSource};
pub use error::{Fallback, InitError, InitResult, Step};

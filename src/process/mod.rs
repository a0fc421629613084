//! Subprocess lifecycle: tracking, termination, spawning and parent watch.

pub mod registry;
pub mod runner;
pub mod terminate;
pub mod watchdog;

pub use registry::{DEFAULT_CLEANUP_GRACE, SubprocessRegistry, TrackedProcess};
pub use runner::{CapturedOutput, run_tracked};
pub use terminate::{ProcessTerminator, TerminateKind, platform_terminator};

//! Filesystem utilities for gui-agent.
//!
//! Session records and screenshots are always written atomically so a crash
//! or a watchdog force-exit never leaves a half-written file behind.

pub mod atomic;

pub use atomic::atomic_write;
pub use atomic::atomic_write_file;

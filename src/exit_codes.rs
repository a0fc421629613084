//! Exit code constants for the gui-agent CLI.
//!
//! - 0: the printed result record has `success: true`
//! - 1: the printed result record has `success: false`
//! - 130: the parent watchdog force-exited the process

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// Any structured failure, including timeouts and operator interrupts.
pub const FAILURE: i32 = 1;

/// The invoking parent process disappeared and the watchdog tore us down.
pub const INTERRUPTED: i32 = 130;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [SUCCESS, FAILURE, INTERRUPTED];
        for (i, &a) in codes.iter().enumerate() {
            for (j, &b) in codes.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b, "Exit codes must be distinct");
                }
            }
        }
    }

    #[test]
    fn interrupted_matches_shell_convention() {
        // 128 + SIGINT
        assert_eq!(INTERRUPTED, 130);
    }
}

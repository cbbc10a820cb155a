//! Global input handling: key hook and chord detection.

/// Chord state machine deriving start/stop actions
pub mod chord;
/// Global key hook thread (rdev)
pub mod hook;

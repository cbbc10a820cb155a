//! Push-to-talk chord detection over raw modifier key events.
//!
//! The chord layout is fixed: Ctrl+Win starts a recording, releasing Ctrl
//! stops it with confirmation, pressing Alt stops it without. The detector is
//! a pure state machine: it holds nothing but the per-modifier key-code sets
//! and is fed the caller's recording flag, so redundant stop signals are
//! side-effect-free and the logic is trivially testable.

use tracing::debug;

/// Logical modifier a physical key maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifierKey {
    /// Left or right Control
    Ctrl,
    /// Left or right Windows/Super/Meta
    Win,
    /// Left or right Alt
    Alt,
}

/// Key transition direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDirection {
    /// Key pressed
    Down,
    /// Key released
    Up,
}

/// One raw modifier key transition from the global hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// Logical modifier this key belongs to
    pub modifier: ModifierKey,
    /// Raw key code distinguishing left/right physical variants
    pub code: u32,
    /// Press or release
    pub direction: KeyDirection,
}

/// Logical action derived from a chord transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChordAction {
    /// Ctrl and Win held together: begin recording
    Start,
    /// Ctrl released (with Alt absent): stop and ask for confirmation
    StopConfirm,
    /// Alt pressed mid-recording: stop immediately, no confirmation
    StopPlain,
}

/// Fixed-size set of raw key codes for one logical modifier.
///
/// A set rather than a boolean: left and right variants of a modifier emit
/// distinct codes, and only removing the specific code that was added may
/// empty the set. A phantom key-up for a code never recorded as down is a
/// no-op, so it cannot produce a stuck stop trigger.
#[derive(Debug, Default)]
struct KeySet {
    codes: [Option<u32>; 4],
}

impl KeySet {
    /// Adds a code, returning whether it was newly added. OS key auto-repeat
    /// re-delivers key-down for held keys; those return false so the caller
    /// can keep actions edge-triggered.
    fn insert(&mut self, code: u32) -> bool {
        if self.codes.iter().any(|c| *c == Some(code)) {
            return false; // key-repeat of a held key
        }
        if let Some(slot) = self.codes.iter_mut().find(|c| c.is_none()) {
            *slot = Some(code);
            return true;
        }
        false
    }

    fn remove(&mut self, code: u32) {
        for slot in &mut self.codes {
            if *slot == Some(code) {
                *slot = None;
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.codes.iter().all(Option::is_none)
    }
}

/// Edge-triggered chord state machine.
///
/// The caller is the source of truth for whether the application is
/// recording; it passes that flag into [`ChordDetector::handle`] with each
/// event.
#[derive(Debug, Default)]
pub struct ChordDetector {
    ctrl: KeySet,
    win: KeySet,
    alt: KeySet,
}

impl ChordDetector {
    /// Creates a detector with all modifier sets empty
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one key transition through the chord rules.
    ///
    /// Returns the action this transition fires, if any. Actions are
    /// edge-triggered: holding a chord produces nothing beyond the transition
    /// that completed it.
    pub fn handle(&mut self, event: KeyEvent, recording: bool) -> Option<ChordAction> {
        let action = match (event.direction, event.modifier) {
            (KeyDirection::Down, ModifierKey::Ctrl) => {
                // Only a fresh press is a chord transition; auto-repeat of a
                // held key must not re-fire Start
                let fresh = self.ctrl.insert(event.code);
                if fresh {
                    self.start_if_chord_complete(recording)
                } else {
                    None
                }
            }
            (KeyDirection::Down, ModifierKey::Win) => {
                let fresh = self.win.insert(event.code);
                if fresh {
                    self.start_if_chord_complete(recording)
                } else {
                    None
                }
            }
            (KeyDirection::Down, ModifierKey::Alt) => {
                // Single-key stop, fires on press rather than release
                let fresh = self.alt.insert(event.code);
                (fresh && recording).then_some(ChordAction::StopPlain)
            }
            (KeyDirection::Up, ModifierKey::Ctrl) => {
                self.ctrl.remove(event.code);
                // Release-triggered stop: the absence of ctrl is the trigger.
                // Alt must also be absent: if alt already stopped this
                // recording the alt key is still held, and first-trigger-wins
                // means this release stays silent.
                (recording && self.ctrl.is_empty() && self.alt.is_empty())
                    .then_some(ChordAction::StopConfirm)
            }
            (KeyDirection::Up, ModifierKey::Win) => {
                self.win.remove(event.code);
                None
            }
            (KeyDirection::Up, ModifierKey::Alt) => {
                self.alt.remove(event.code);
                None
            }
        };

        if let Some(a) = action {
            debug!(?a, ?event, "chord action");
        }
        action
    }

    fn start_if_chord_complete(&self, recording: bool) -> Option<ChordAction> {
        (!recording && !self.ctrl.is_empty() && !self.win.is_empty())
            .then_some(ChordAction::Start)
    }
}

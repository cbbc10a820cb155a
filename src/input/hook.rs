//! Global key hook feeding the chord detector.
//!
//! rdev's listener runs on its own thread for the process lifetime (a
//! low-level hook must never be unregistered mid-chord, and its callback must
//! return fast or the OS bypasses it). The callback does the minimum:
//! filter to modifier keys, map to a [`KeyEvent`], push into a channel. All
//! chord logic runs on the main thread's state machine.

use rdev::{listen, EventType, Key};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread;
use tracing::{error, info};

use crate::input::chord::{KeyDirection, KeyEvent, ModifierKey};

/// Raw code for left Control
pub const VK_LCTRL: u32 = 0xA2;
/// Raw code for right Control
pub const VK_RCTRL: u32 = 0xA3;
/// Raw code for left Windows/Super
pub const VK_LWIN: u32 = 0x5B;
/// Raw code for right Windows/Super
pub const VK_RWIN: u32 = 0x5C;
/// Raw code for left Alt
pub const VK_LALT: u32 = 0xA4;
/// Raw code for right Alt (`AltGr`)
pub const VK_RALT: u32 = 0xA5;

/// Maps an rdev key to its logical modifier and raw code.
///
/// rdev abstracts platform scancodes behind its `Key` enum, so the raw codes
/// here are fixed per physical variant; what matters to the chord detector
/// is only that left and right variants stay distinct.
fn map_key(key: Key) -> Option<(ModifierKey, u32)> {
    match key {
        Key::ControlLeft => Some((ModifierKey::Ctrl, VK_LCTRL)),
        Key::ControlRight => Some((ModifierKey::Ctrl, VK_RCTRL)),
        Key::MetaLeft => Some((ModifierKey::Win, VK_LWIN)),
        Key::MetaRight => Some((ModifierKey::Win, VK_RWIN)),
        Key::Alt => Some((ModifierKey::Alt, VK_LALT)),
        Key::AltGr => Some((ModifierKey::Alt, VK_RALT)),
        _ => None,
    }
}

/// Spawns the global hook thread and returns the event channel.
///
/// The thread lives until process exit. Non-modifier keys never cross the
/// channel.
pub fn spawn() -> Receiver<KeyEvent> {
    let (tx, rx): (Sender<KeyEvent>, Receiver<KeyEvent>) = channel();

    thread::spawn(move || {
        info!("global key hook thread starting");
        let result = listen(move |event| {
            let (key, direction) = match event.event_type {
                EventType::KeyPress(key) => (key, KeyDirection::Down),
                EventType::KeyRelease(key) => (key, KeyDirection::Up),
                _ => return,
            };

            if let Some((modifier, code)) = map_key(key) {
                // Receiver gone means shutdown; nothing useful to do here
                let _ = tx.send(KeyEvent {
                    modifier,
                    code,
                    direction,
                });
            }
        });

        if let Err(e) = result {
            error!("global key hook failed: {e:?}");
        }
    });

    rx
}

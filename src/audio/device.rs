use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait};
use tracing::{debug, warn};

/// Immutable snapshot of one input device from a single enumeration pass.
///
/// Superseded by re-enumeration, never mutated in place. cpal exposes no
/// stable OS-level identifier, so `id` is derived from enumeration order and
/// name; it is only valid against the snapshot it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDevice {
    /// Opaque identifier usable with [`resolve`]
    pub id: String,
    /// Human-readable device name
    pub name: String,
    /// Whether this device is the system default input
    pub is_default_input: bool,
}

fn device_id(index: usize, name: &str) -> String {
    format!("input-{index}-{name}")
}

/// Enumerates available input devices.
///
/// # Errors
/// Returns error if the host cannot enumerate devices at all; individual
/// devices that fail to report a name are listed with a placeholder.
pub fn list_input_devices() -> Result<Vec<AudioDevice>> {
    let host = cpal::default_host();
    let default_name = host
        .default_input_device()
        .and_then(|d| d.name().ok());

    let mut devices = Vec::new();
    for (index, device) in host
        .input_devices()
        .context("failed to enumerate input devices")?
        .enumerate()
    {
        let name = device
            .name()
            .unwrap_or_else(|_| format!("Input {}", index + 1));
        devices.push(AudioDevice {
            id: device_id(index, &name),
            is_default_input: default_name.as_deref() == Some(name.as_str()),
            name,
        });
    }

    debug!(count = devices.len(), "enumerated input devices");
    Ok(devices)
}

/// Returns the system default input device as a snapshot entry.
///
/// The entry comes out of the same enumeration pass [`resolve`] walks, so its
/// id carries the default's actual position rather than a fabricated one.
///
/// # Errors
/// Returns error if enumeration fails or no default input device exists.
pub fn default_input_device() -> Result<AudioDevice> {
    list_input_devices()?
        .into_iter()
        .find(|d| d.is_default_input)
        .context("no default input device available")
}

/// Maps a snapshot id back to a cpal device handle.
///
/// `None` id means the system default. An id that no longer matches any
/// device (unplugged since enumeration) resolves to `None` so the caller can
/// run its default-device fallback.
#[must_use]
pub fn resolve(id: Option<&str>) -> Option<cpal::Device> {
    let host = cpal::default_host();

    let Some(wanted) = id else {
        return host.default_input_device();
    };

    match host.input_devices() {
        Ok(inputs) => {
            for (index, device) in inputs.enumerate() {
                let name = device
                    .name()
                    .unwrap_or_else(|_| format!("Input {}", index + 1));
                if device_id(index, &name) == wanted {
                    return Some(device);
                }
            }
            warn!(id = wanted, "requested input device not found");
            None
        }
        Err(e) => {
            warn!("device enumeration failed: {e}");
            None
        }
    }
}

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Transport a device identity was discovered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportKind {
    /// Physically attached accessory
    Usb,
    /// SDK-provided emulation channel
    Emulator,
}

/// Classification derived from identity metadata, never stored redundantly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceClass {
    /// Real hardware on the USB transport
    Physical,
    /// Emulator mimicking the full accessory
    EmulatedAccessory,
    /// Plain software emulator
    EmulatedSoftware,
}

impl DeviceClass {
    pub fn is_emulated(&self) -> bool {
        !matches!(self, DeviceClass::Physical)
    }

    /// Wire label used in state-event reporting
    pub fn device_type(&self) -> &'static str {
        match self {
            DeviceClass::Physical => "device",
            DeviceClass::EmulatedAccessory | DeviceClass::EmulatedSoftware => "emulator",
        }
    }
}

const ACCESSORY_EMULATOR_TAG: &str = "EMULATED FLIR ONE";
const SOFTWARE_EMULATOR_TAG: &str = "C++ Emulator";

/// Opaque handle to a discovered device. Immutable once discovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub device_id: String,
    pub transport: TransportKind,
}

impl DeviceIdentity {
    pub fn new<S: Into<String>>(device_id: S, transport: TransportKind) -> Self {
        Self {
            device_id: device_id.into(),
            transport,
        }
    }

    /// Classification is derived from the transport and the device-id tags
    /// the emulation channels advertise.
    pub fn class(&self) -> DeviceClass {
        match self.transport {
            TransportKind::Usb => DeviceClass::Physical,
            TransportKind::Emulator => {
                if self.device_id.contains(ACCESSORY_EMULATOR_TAG) {
                    DeviceClass::EmulatedAccessory
                } else if self.device_id.contains(SOFTWARE_EMULATOR_TAG) {
                    DeviceClass::EmulatedSoftware
                } else {
                    DeviceClass::EmulatedSoftware
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
struct RegistryEntry {
    identity: DeviceIdentity,
    /// Monotone discovery sequence; bumped on every add so recency
    /// tie-breaks follow last-seen order.
    last_seen: u64,
}

/// Membership bookkeeping for discovered device identities.
///
/// Purely synchronous and side-effect free; callers provide their own
/// synchronization (the supervisor holds it inside its state mutex).
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: HashMap<String, RegistryEntry>,
    seq: u64,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh a device by its unique handle. Idempotent: re-adding
    /// the same handle only updates last-seen.
    pub fn add(&mut self, identity: DeviceIdentity) {
        self.seq += 1;
        let seq = self.seq;
        self.devices
            .entry(identity.device_id.clone())
            .and_modify(|entry| entry.last_seen = seq)
            .or_insert(RegistryEntry {
                identity,
                last_seen: seq,
            });
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Any known physical device, most recently discovered first.
    pub fn best_physical(&self) -> Option<DeviceIdentity> {
        self.best_of(|class| class == DeviceClass::Physical)
    }

    /// Best emulated fallback: accessory-class emulation preferred over
    /// software-class, recency breaking ties within a class.
    pub fn best_emulated(&self) -> Option<DeviceIdentity> {
        self.best_of(|class| class == DeviceClass::EmulatedAccessory)
            .or_else(|| self.best_of(|class| class == DeviceClass::EmulatedSoftware))
    }

    fn best_of<F: Fn(DeviceClass) -> bool>(&self, wanted: F) -> Option<DeviceIdentity> {
        self.devices
            .values()
            .filter(|entry| wanted(entry.identity.class()))
            .max_by_key(|entry| entry.last_seen)
            .map(|entry| entry.identity.clone())
    }
}

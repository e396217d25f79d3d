use crate::registry::DeviceClass;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Reportable connection states delivered to the external observer. A subset
/// of the supervisor's full state set: only transitions an observer can act
/// on are published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportedState {
    Discovering,
    Connected,
    Disconnected,
    DiscoveryError,
}

impl ReportedState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportedState::Discovering => "discovering",
            ReportedState::Connected => "connected",
            ReportedState::Disconnected => "disconnected",
            ReportedState::DiscoveryError => "discovery_error",
        }
    }
}

/// Device attachment details carried only by events that can produce them
/// (a closed type instead of a free-form extras map).
#[derive(Debug, Clone, Serialize)]
pub struct DeviceAttachment {
    /// "device" for physical hardware, "emulator" otherwise
    pub device_type: &'static str,
    pub is_emulator: bool,
}

impl DeviceAttachment {
    pub fn from_class(class: DeviceClass) -> Self {
        Self {
            device_type: class.device_type(),
            is_emulator: class.is_emulated(),
        }
    }
}

/// Connection/state change notification.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceStateEvent {
    pub state: ReportedState,
    pub connected: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<DeviceAttachment>,
    /// Seconds since the epoch, monotonically non-decreasing across events
    pub timestamp: f64,
}

impl DeviceStateEvent {
    pub fn new(state: ReportedState, connected: bool, attachment: Option<DeviceAttachment>) -> Self {
        let message = if connected {
            "Thermal device connected".to_string()
        } else {
            state.as_str().to_string()
        };
        Self {
            state,
            connected,
            message,
            attachment,
            timestamp: epoch_secs(SystemTime::now()),
        }
    }
}

/// New-frame notification: where the exported cache file landed plus a
/// self-describing inline encoding for transports that cannot read the path.
#[derive(Debug, Clone, Serialize)]
pub struct FrameEvent {
    /// Always "frame" on the wire
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Filesystem path of the exported cache image
    pub path: String,
    /// data-URI tagged inline encoding of the same frame
    pub inline: String,
    /// Capture time in fractional seconds since the epoch
    pub timestamp: f64,
}

impl FrameEvent {
    pub fn new(path: String, inline: String, timestamp: f64) -> Self {
        Self {
            kind: "frame",
            path,
            inline,
            timestamp,
        }
    }
}

/// Everything the external observer can receive.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ThermalEvent {
    DeviceState(DeviceStateEvent),
    Frame(FrameEvent),
}

impl ThermalEvent {
    pub fn timestamp(&self) -> f64 {
        match self {
            ThermalEvent::DeviceState(event) => event.timestamp,
            ThermalEvent::Frame(event) => event.timestamp,
        }
    }

    pub fn description(&self) -> String {
        match self {
            ThermalEvent::DeviceState(event) => {
                format!("state={} connected={}", event.state.as_str(), event.connected)
            }
            ThermalEvent::Frame(event) => format!("frame at {}", event.path),
        }
    }
}

pub fn epoch_secs(at: SystemTime) -> f64 {
    at.duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// Notification channel to an external observer (UI/runtime).
///
/// Delivery is fire-and-forget: implementations must never block the
/// producing task and must tolerate the observer being gone.
pub trait EventSink: Send + Sync {
    fn notify_state(&self, event: DeviceStateEvent);
    fn notify_frame(&self, event: FrameEvent);
}

/// Broadcast-channel sink. Sending with no subscribers is a no-op, which
/// covers the observer-torn-down-mid-stream case.
pub struct BroadcastSink {
    sender: broadcast::Sender<ThermalEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ThermalEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    fn publish(&self, event: ThermalEvent) {
        trace!("Publishing event: {}", event.description());
        if self.sender.send(event).is_err() {
            debug!("No event subscribers attached, dropping notification");
        }
    }
}

impl EventSink for BroadcastSink {
    fn notify_state(&self, event: DeviceStateEvent) {
        self.publish(ThermalEvent::DeviceState(event));
    }

    fn notify_frame(&self, event: FrameEvent) {
        self.publish(ThermalEvent::Frame(event));
    }
}

/// Sink that drops everything; used when no observer is wired at all.
pub struct NullSink;

impl EventSink for NullSink {
    fn notify_state(&self, _event: DeviceStateEvent) {}
    fn notify_frame(&self, _event: FrameEvent) {}
}

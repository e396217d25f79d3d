mod emulator;
mod mock;

pub use emulator::{EmulatedSdk, EmulatorKind};
pub use mock::{MockSdk, MockStream};

use crate::error::{ConnectError, DiscoveryError, SdkError, StreamError};
use crate::frame::Frame;
use crate::registry::DeviceIdentity;
use std::sync::Arc;

/// Callback surface for discovery results. The supervisor implements this and
/// funnels both callbacks into its transition function.
pub trait DiscoveryListener: Send + Sync {
    fn on_device_found(&self, identity: DeviceIdentity);
    fn on_discovery_error(&self, error: DiscoveryError);
}

/// Invoked by the transport when an established connection drops out from
/// under us (unplug, hardware fault).
pub type DisconnectHandler = Box<dyn Fn() + Send + Sync>;

/// An established stream of thermal frames.
///
/// `next_frame` blocks until the device produces a frame; only the
/// supervisor's dedicated background task calls it. All methods take `&self`
/// so a sampling handle can coexist with the read loop; implementations use
/// interior mutability.
pub trait ThermalStream: Send + Sync {
    /// Block until the next decoded frame is available.
    fn next_frame(&self) -> Result<Frame, StreamError>;

    /// Point-temperature query against the most recent thermal data, in
    /// degrees Celsius. Bounds checking is the caller's concern.
    fn temperature_at(&self, x: u32, y: u32) -> Result<f64, StreamError>;

    /// Raster dimensions of the thermal image.
    fn dimensions(&self) -> (u32, u32);

    /// Tear the stream down. Unblocks any pending `next_frame` with an error.
    /// Best-effort; must be safe to call more than once.
    fn stop(&self);
}

/// The vendor SDK consumed as an opaque capability: discover, connect,
/// stream, sample. Transport internals stay behind this seam.
pub trait CameraSdk: Send + Sync {
    /// One-time SDK bring-up. Failure means no devices will ever be
    /// discovered on this transport, nothing more.
    fn init(&self) -> Result<(), SdkError>;

    /// Begin scanning. Results arrive through the listener until
    /// `stop_discovery`; discovery has no timeout by design.
    fn start_discovery(&self, listener: Arc<dyn DiscoveryListener>) -> Result<(), DiscoveryError>;

    fn stop_discovery(&self);

    /// Establish a connection to a discovered device. Blocks until the
    /// device accepts or rejects; the handler fires on any later
    /// hardware-initiated disconnect.
    fn connect(
        &self,
        identity: &DeviceIdentity,
        on_disconnect: DisconnectHandler,
    ) -> Result<Arc<dyn ThermalStream>, ConnectError>;
}

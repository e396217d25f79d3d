use super::{CameraSdk, DisconnectHandler, DiscoveryListener, ThermalStream};
use crate::error::{ConnectError, DiscoveryError, SdkError, StreamError};
use crate::frame::Frame;
use crate::registry::{DeviceIdentity, TransportKind};
use image::RgbaImage;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

/// Which emulation profile the SDK advertises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmulatorKind {
    /// Mimics the full accessory, id tagged "EMULATED FLIR ONE"
    Accessory,
    /// Plain software emulator, id tagged "C++ Emulator"
    Software,
}

impl EmulatorKind {
    fn device_id(&self) -> &'static str {
        match self {
            EmulatorKind::Accessory => "EMULATED FLIR ONE 0123",
            EmulatorKind::Software => "C++ Emulator",
        }
    }
}

/// Software emulation of the vendor SDK: discovery always yields the one
/// emulated device, and connecting produces a synthetic gradient stream with
/// a deterministic temperature field. This is the development fallback the
/// selection policy arbitrates against when no hardware is attached.
pub struct EmulatedSdk {
    kind: EmulatorKind,
    width: u32,
    height: u32,
    frame_interval: Duration,
}

impl EmulatedSdk {
    pub fn new(kind: EmulatorKind, width: u32, height: u32, frame_interval: Duration) -> Self {
        Self {
            kind,
            width,
            height,
            frame_interval,
        }
    }

    pub fn identity(&self) -> DeviceIdentity {
        DeviceIdentity::new(self.kind.device_id(), TransportKind::Emulator)
    }
}

impl CameraSdk for EmulatedSdk {
    fn init(&self) -> Result<(), SdkError> {
        debug!("Emulated SDK initialized ({:?})", self.kind);
        Ok(())
    }

    fn start_discovery(&self, listener: Arc<dyn DiscoveryListener>) -> Result<(), DiscoveryError> {
        // The emulation channel always has its device available
        info!("Emulated discovery reporting {:?}", self.identity().device_id);
        listener.on_device_found(self.identity());
        Ok(())
    }

    fn stop_discovery(&self) {}

    fn connect(
        &self,
        identity: &DeviceIdentity,
        _on_disconnect: DisconnectHandler,
    ) -> Result<Arc<dyn ThermalStream>, ConnectError> {
        if identity.device_id != self.kind.device_id() {
            return Err(ConnectError::Gone {
                device_id: identity.device_id.clone(),
            });
        }

        info!("Emulated device {} connected", identity.device_id);
        Ok(Arc::new(EmulatedStream::new(
            self.width,
            self.height,
            self.frame_interval,
        )))
    }
}

/// Paced synthetic stream: a warm spot over ambient background whose
/// intensity breathes slowly so consecutive frames differ.
pub struct EmulatedStream {
    width: u32,
    height: u32,
    frame_interval: Duration,
    running: AtomicBool,
    tick: AtomicU64,
}

const AMBIENT_C: f64 = 20.0;
const HOTSPOT_PEAK_C: f64 = 55.0;

impl EmulatedStream {
    fn new(width: u32, height: u32, frame_interval: Duration) -> Self {
        Self {
            width,
            height,
            frame_interval,
            running: AtomicBool::new(true),
            tick: AtomicU64::new(0),
        }
    }

    fn field_temperature(&self, x: u32, y: u32, tick: u64) -> f64 {
        let cx = f64::from(self.width) / 2.0;
        let cy = f64::from(self.height) / 2.0;
        let dx = f64::from(x) - cx;
        let dy = f64::from(y) - cy;
        let dist2 = dx * dx + dy * dy;

        let breathe = 1.0 + 0.1 * ((tick % 20) as f64 / 20.0);
        AMBIENT_C + HOTSPOT_PEAK_C * breathe / (1.0 + dist2 / 400.0)
    }

    fn render(&self, tick: u64) -> RgbaImage {
        let span = HOTSPOT_PEAK_C * 1.1;
        RgbaImage::from_fn(self.width, self.height, |x, y| {
            let t = self.field_temperature(x, y, tick);
            let v = (((t - AMBIENT_C) / span) * 255.0).clamp(0.0, 255.0) as u8;
            image::Rgba([v, v / 2, 255 - v, 255])
        })
    }
}

impl ThermalStream for EmulatedStream {
    fn next_frame(&self) -> Result<Frame, StreamError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(StreamError::Disconnected);
        }

        std::thread::sleep(self.frame_interval);

        if !self.running.load(Ordering::SeqCst) {
            return Err(StreamError::Disconnected);
        }

        let tick = self.tick.fetch_add(1, Ordering::SeqCst);
        Ok(Frame::new(Some(self.render(tick)), None, SystemTime::now()))
    }

    fn temperature_at(&self, x: u32, y: u32) -> Result<f64, StreamError> {
        if x >= self.width || y >= self.height {
            return Err(StreamError::Read {
                details: format!("point ({}, {}) outside raster", x, y),
            });
        }
        Ok(self.field_temperature(x, y, self.tick.load(Ordering::SeqCst)))
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiscoveryError as Derr;
    use crate::registry::DeviceClass;
    use parking_lot::Mutex;

    struct CollectingListener {
        found: Mutex<Vec<DeviceIdentity>>,
    }

    impl DiscoveryListener for CollectingListener {
        fn on_device_found(&self, identity: DeviceIdentity) {
            self.found.lock().push(identity);
        }

        fn on_discovery_error(&self, _error: Derr) {}
    }

    fn sdk(kind: EmulatorKind) -> EmulatedSdk {
        EmulatedSdk::new(kind, 160, 120, Duration::from_millis(1))
    }

    #[test]
    fn accessory_emulator_classifies_as_accessory() {
        assert_eq!(
            sdk(EmulatorKind::Accessory).identity().class(),
            DeviceClass::EmulatedAccessory
        );
        assert_eq!(
            sdk(EmulatorKind::Software).identity().class(),
            DeviceClass::EmulatedSoftware
        );
    }

    #[test]
    fn discovery_reports_the_emulated_device() {
        let emulated = sdk(EmulatorKind::Software);
        let listener = Arc::new(CollectingListener {
            found: Mutex::new(Vec::new()),
        });

        emulated.start_discovery(listener.clone()).unwrap();

        let found = listener.found.lock();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].device_id, "C++ Emulator");
    }

    #[test]
    fn stream_produces_frames_until_stopped() {
        let emulated = sdk(EmulatorKind::Software);
        let stream = emulated
            .connect(&emulated.identity(), Box::new(|| {}))
            .unwrap();

        let frame = stream.next_frame().unwrap();
        assert!(frame.has_image());
        assert_eq!(frame.primary_image().unwrap().width(), 160);

        stream.stop();
        assert!(stream.next_frame().is_err());
    }

    #[test]
    fn hotspot_is_warmer_than_the_edge() {
        let emulated = sdk(EmulatorKind::Software);
        let stream = emulated
            .connect(&emulated.identity(), Box::new(|| {}))
            .unwrap();

        let center = stream.temperature_at(80, 60).unwrap();
        let corner = stream.temperature_at(0, 0).unwrap();
        assert!(center > corner);
        assert!(center > AMBIENT_C);
    }

    #[test]
    fn connect_to_unknown_identity_is_rejected() {
        let emulated = sdk(EmulatorKind::Software);
        let ghost = DeviceIdentity::new("F1-1234", TransportKind::Usb);
        assert!(emulated.connect(&ghost, Box::new(|| {})).is_err());
    }
}

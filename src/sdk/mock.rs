use super::{CameraSdk, DisconnectHandler, DiscoveryListener, ThermalStream};
use crate::error::{ConnectError, DiscoveryError, SdkError, StreamError};
use crate::frame::Frame;
use crate::registry::DeviceIdentity;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Scripted SDK for exercising the supervisor without hardware.
///
/// Tests drive the discovery and connection callbacks by hand: inject found
/// devices, program the next connect to fail, feed frames into the active
/// stream, and yank the connection out from under the supervisor.
pub struct MockSdk {
    listener: Mutex<Option<Arc<dyn DiscoveryListener>>>,
    fail_next_connect: AtomicBool,
    connect_count: AtomicUsize,
    active: Mutex<Option<ActiveConnection>>,
}

struct ActiveConnection {
    identity: DeviceIdentity,
    frames: Sender<Frame>,
    stream: Arc<MockStream>,
    on_disconnect: DisconnectHandler,
}

impl MockSdk {
    pub fn new() -> Self {
        Self {
            listener: Mutex::new(None),
            fail_next_connect: AtomicBool::new(false),
            connect_count: AtomicUsize::new(0),
            active: Mutex::new(None),
        }
    }

    /// Deliver a discovery callback, as the transport would.
    pub fn discover(&self, identity: DeviceIdentity) {
        let listener = self.listener.lock().clone();
        if let Some(listener) = listener {
            listener.on_device_found(identity);
        }
    }

    /// Deliver a discovery-channel error.
    pub fn report_discovery_error(&self, details: &str) {
        let listener = self.listener.lock().clone();
        if let Some(listener) = listener {
            listener.on_discovery_error(DiscoveryError::Transport {
                interface: "mock".to_string(),
                details: details.to_string(),
            });
        }
    }

    /// Make the next `connect` call fail.
    pub fn fail_next_connect(&self) {
        self.fail_next_connect.store(true, Ordering::SeqCst);
    }

    /// Feed a frame into the active stream. Panics if nothing is connected.
    pub fn push_frame(&self, frame: Frame) {
        let guard = self.active.lock();
        let active = guard.as_ref().expect("no active mock connection");
        active.frames.send(frame).expect("mock stream closed");
    }

    /// Simulate a hardware-initiated disconnect: close the stream and fire
    /// the handler the supervisor registered.
    pub fn drop_connection(&self) {
        let taken = self.active.lock().take();
        if let Some(active) = taken {
            debug!("Mock dropping connection to {}", active.identity.device_id);
            active.stream.close();
            (active.on_disconnect)();
        }
    }

    pub fn connect_count(&self) -> usize {
        self.connect_count.load(Ordering::SeqCst)
    }

    pub fn connected_identity(&self) -> Option<DeviceIdentity> {
        self.active.lock().as_ref().map(|active| active.identity.clone())
    }

    pub fn stream(&self) -> Option<Arc<MockStream>> {
        self.active.lock().as_ref().map(|active| Arc::clone(&active.stream))
    }
}

impl Default for MockSdk {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraSdk for MockSdk {
    fn init(&self) -> Result<(), SdkError> {
        Ok(())
    }

    fn start_discovery(&self, listener: Arc<dyn DiscoveryListener>) -> Result<(), DiscoveryError> {
        *self.listener.lock() = Some(listener);
        Ok(())
    }

    fn stop_discovery(&self) {
        *self.listener.lock() = None;
    }

    fn connect(
        &self,
        identity: &DeviceIdentity,
        on_disconnect: DisconnectHandler,
    ) -> Result<Arc<dyn ThermalStream>, ConnectError> {
        self.connect_count.fetch_add(1, Ordering::SeqCst);

        if self.fail_next_connect.swap(false, Ordering::SeqCst) {
            return Err(ConnectError::Rejected {
                device_id: identity.device_id.clone(),
                details: "scripted connect failure".to_string(),
            });
        }

        let (tx, rx) = mpsc::channel();
        let stream = Arc::new(MockStream::new(rx, (160, 120)));

        *self.active.lock() = Some(ActiveConnection {
            identity: identity.clone(),
            frames: tx,
            stream: Arc::clone(&stream),
            on_disconnect,
        });

        Ok(stream)
    }
}

/// Stream half of the scripted SDK: hands out whatever frames the test feeds
/// in, with a programmable temperature response.
pub struct MockStream {
    frames: Mutex<Receiver<Frame>>,
    dimensions: (u32, u32),
    closed: AtomicBool,
    temperature: Mutex<Option<f64>>,
    fail_queries: AtomicBool,
}

impl MockStream {
    fn new(frames: Receiver<Frame>, dimensions: (u32, u32)) -> Self {
        Self {
            frames: Mutex::new(frames),
            dimensions,
            closed: AtomicBool::new(false),
            temperature: Mutex::new(Some(36.6)),
            fail_queries: AtomicBool::new(false),
        }
    }

    pub fn set_temperature(&self, value: f64) {
        *self.temperature.lock() = Some(value);
    }

    pub fn fail_queries(&self) {
        self.fail_queries.store(true, Ordering::SeqCst);
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl ThermalStream for MockStream {
    fn next_frame(&self) -> Result<Frame, StreamError> {
        // Short poll so stop() can interrupt a blocked read loop
        loop {
            if self.closed.load(Ordering::SeqCst) {
                return Err(StreamError::Disconnected);
            }
            match self.frames.lock().recv_timeout(Duration::from_millis(10)) {
                Ok(frame) => return Ok(frame),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Err(StreamError::Disconnected),
            }
        }
    }

    fn temperature_at(&self, _x: u32, _y: u32) -> Result<f64, StreamError> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(StreamError::Read {
                details: "scripted query fault".to_string(),
            });
        }
        (*self.temperature.lock()).ok_or(StreamError::Disconnected)
    }

    fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    fn stop(&self) {
        self.close();
    }
}

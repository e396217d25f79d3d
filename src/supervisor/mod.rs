
use crate::cache::FrameCache;
use crate::config::ThermocamConfig;
use crate::error::{ConnectError, DiscoveryError, ExportError};
use crate::events::{DeviceAttachment, DeviceStateEvent, EventSink, FrameEvent, ReportedState};
use crate::frame::Frame;
use crate::rate_limit::FrameRateLimiter;
use crate::registry::{DeviceIdentity, DeviceRegistry};
use crate::sampler::TemperatureSampler;
use crate::sdk::{CameraSdk, DisconnectHandler, DiscoveryListener, ThermalStream};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Top-level connection lifecycle states. Streaming is an attribute tracked
/// alongside `Connected` (see [`ConnectionSupervisor::is_streaming`]), not a
/// separate state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Discovering,
    Connecting,
    Connected,
    Disconnected,
    DiscoveryError,
}

/// Internal transition triggers. Discovery callbacks and the background
/// connection task post these into [`ConnectionSupervisor::apply`], which
/// keeps every transition in one place.
#[derive(Debug)]
enum LifecycleEvent {
    DeviceFound(DeviceIdentity),
    DiscoveryFailed(DiscoveryError),
    Connected,
    ConnectFailed(ConnectError),
    FrameReceived(Frame),
    Disconnected,
}

/// Read-only projection of the current connection for external reporting.
#[derive(Debug, Clone)]
pub struct DeviceConnectionInfo {
    pub state: ConnectionState,
    pub identity: Option<DeviceIdentity>,
}

impl fmt::Display for DeviceConnectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.identity {
            None => write!(f, "Not connected"),
            Some(identity) if identity.class().is_emulated() => {
                write!(f, "Emulator ({})", identity.device_id)
            }
            Some(identity) => write!(f, "Physical device ({})", identity.device_id),
        }
    }
}

/// Observer for the fixed-point temperature pushed with each accepted frame.
pub type TemperatureTap = Box<dyn Fn(f64, u32, u32) + Send + Sync>;

struct Inner {
    state: ConnectionState,
    registry: DeviceRegistry,
    active: Option<DeviceIdentity>,
    stream: Option<Arc<dyn ThermalStream>>,
}

/// Owns the discovery -> connect -> stream -> disconnect state machine.
///
/// Public entry points never block: connection work (the connect call and the
/// blocking stream-read loop) runs on one dedicated background task per
/// attempt, and every asynchronous signal funnels through the same transition
/// function under a single mutex, so events are observed in a total order.
/// Faults inside the background task are contained here; they surface only as
/// state transitions and sink notifications.
pub struct ConnectionSupervisor {
    sdk: Arc<dyn CameraSdk>,
    sink: Arc<dyn EventSink>,
    cache: Arc<FrameCache>,
    sampler: Arc<TemperatureSampler>,
    limiter: FrameRateLimiter,
    sample_point: (u32, u32),
    /// Single-shot guard: start has effect at most once until stop() resets it
    discovery_started: AtomicBool,
    inner: Mutex<Inner>,
    connection_task: Mutex<Option<JoinHandle<()>>>,
    temperature_tap: RwLock<Option<TemperatureTap>>,
}

impl ConnectionSupervisor {
    pub fn new(
        sdk: Arc<dyn CameraSdk>,
        sink: Arc<dyn EventSink>,
        config: &ThermocamConfig,
    ) -> Self {
        Self {
            sdk,
            sink,
            cache: Arc::new(FrameCache::new(
                &config.cache.dir,
                &config.cache.file_name,
                config.cache.inline_jpeg_quality,
            )),
            sampler: Arc::new(TemperatureSampler::new()),
            limiter: FrameRateLimiter::from_millis(config.stream.min_frame_interval_ms),
            sample_point: config.camera.center_point(),
            discovery_started: AtomicBool::new(false),
            inner: Mutex::new(Inner {
                state: ConnectionState::Idle,
                registry: DeviceRegistry::new(),
                active: None,
                stream: None,
            }),
            connection_task: Mutex::new(None),
            temperature_tap: RwLock::new(None),
        }
    }

    /// One-time SDK bring-up. An unavailable SDK is not fatal; it only means
    /// no devices will be discovered.
    pub fn init(&self) {
        if let Err(e) = self.sdk.init() {
            warn!("SDK unavailable: {}", e);
        }
    }

    /// Begin the lifecycle. Idempotent: a second call while discovery or a
    /// connection is live is a no-op until `stop()` resets the guard.
    pub fn start_discovery_and_connect(self: &Arc<Self>) {
        if self.discovery_started.swap(true, Ordering::SeqCst) {
            debug!("Discovery already started, ignoring");
            return;
        }

        info!("Starting device discovery");
        self.inner.lock().state = ConnectionState::Discovering;
        self.sink
            .notify_state(DeviceStateEvent::new(ReportedState::Discovering, false, None));

        let listener: Arc<dyn DiscoveryListener> =
            Arc::new(SupervisorListener(Arc::downgrade(self)));
        if let Err(e) = self.sdk.start_discovery(listener) {
            self.apply(LifecycleEvent::DiscoveryFailed(e));
        }
    }

    /// Tear everything down and return to `Idle`. Errors during teardown are
    /// swallowed; stopping never fails observably. Resets the single-shot
    /// guard so a fresh `start_discovery_and_connect` can run a new cycle.
    pub fn stop(&self) {
        info!("Stopping connection supervisor");

        let stream = {
            let mut inner = self.inner.lock();
            inner.state = ConnectionState::Idle;
            inner.active = None;
            inner.registry = DeviceRegistry::new();
            inner.stream.take()
        };

        self.sdk.stop_discovery();
        if let Some(stream) = stream {
            // The device may already be gone; teardown is best-effort
            stream.stop();
        }
        if let Some(task) = self.connection_task.lock().take() {
            task.abort();
        }

        self.sampler.detach();
        self.cache.clear();
        self.limiter.reset();
        self.discovery_started.store(false, Ordering::SeqCst);
    }

    /// Register the observer for the fixed-point temperature push.
    pub fn set_temperature_tap(&self, tap: Option<TemperatureTap>) {
        *self.temperature_tap.write() = tap;
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    /// True while a physical (non-emulated) device is attached, from the
    /// moment it is chosen for connection until the link drops.
    pub fn is_connected(&self) -> bool {
        let inner = self.inner.lock();
        matches!(
            inner.state,
            ConnectionState::Connecting | ConnectionState::Connected
        ) && inner
            .active
            .as_ref()
            .map(|identity| !identity.class().is_emulated())
            .unwrap_or(false)
    }

    /// True when the current attachment is an emulator fallback.
    pub fn is_emulator(&self) -> bool {
        self.inner
            .lock()
            .active
            .as_ref()
            .map(|identity| identity.class().is_emulated())
            .unwrap_or(false)
    }

    /// True once at least one frame of the current connection has been
    /// successfully exported.
    pub fn is_streaming(&self) -> bool {
        self.cache.streaming()
    }

    pub fn connection_info(&self) -> DeviceConnectionInfo {
        let inner = self.inner.lock();
        DeviceConnectionInfo {
            state: inner.state,
            identity: inner.active.clone(),
        }
    }

    pub fn latest_frame_path(&self) -> Option<std::path::PathBuf> {
        self.cache.latest_path()
    }

    pub fn sample_at(&self, x: u32, y: u32) -> Option<f64> {
        self.sampler.sample_at(x, y)
    }

    /// Snapshot of the most recently ingested frame.
    pub fn latest_frame(&self) -> Option<crate::cache::CachedFrame> {
        self.cache.latest()
    }

    /// Central transition function. Every lifecycle signal lands here.
    fn apply(self: &Arc<Self>, event: LifecycleEvent) {
        match event {
            LifecycleEvent::DeviceFound(identity) => self.handle_device_found(identity),
            LifecycleEvent::DiscoveryFailed(error) => self.handle_discovery_failed(error),
            LifecycleEvent::Connected => self.handle_connected(),
            LifecycleEvent::ConnectFailed(error) => {
                warn!("Connect failed: {}", error);
                self.handle_link_down();
            }
            LifecycleEvent::FrameReceived(frame) => self.handle_frame(frame),
            LifecycleEvent::Disconnected => self.handle_link_down(),
        }
    }

    fn handle_device_found(self: &Arc<Self>, identity: DeviceIdentity) {
        let target = {
            let mut inner = self.inner.lock();
            debug!(
                "Discovered {} ({:?})",
                identity.device_id,
                identity.class()
            );
            inner.registry.add(identity);

            // Later discovery while Connecting/Connected is ignored; an
            // earlier discovery error does not stop discovery, so a device
            // found afterwards still connects.
            if !matches!(
                inner.state,
                ConnectionState::Discovering | ConnectionState::DiscoveryError
            ) {
                return;
            }

            // Selection policy: physical first, then accessory emulation,
            // then software emulation.
            let Some(target) = inner
                .registry
                .best_physical()
                .or_else(|| inner.registry.best_emulated())
            else {
                return;
            };

            inner.state = ConnectionState::Connecting;
            inner.active = Some(target.clone());
            target
        };

        info!(
            "Connecting to {} ({:?})",
            target.device_id,
            target.class()
        );

        let supervisor = Arc::clone(self);
        let task = tokio::task::spawn_blocking(move || supervisor.run_connection(target));
        *self.connection_task.lock() = Some(task);
    }

    /// Runs on the dedicated background task: the blocking connect call plus
    /// the stream-read loop. All failures funnel into `apply`.
    fn run_connection(self: Arc<Self>, identity: DeviceIdentity) {
        let weak = Arc::downgrade(&self);
        let on_disconnect: DisconnectHandler = Box::new(move || {
            if let Some(supervisor) = weak.upgrade() {
                supervisor.apply(LifecycleEvent::Disconnected);
            }
        });

        let stream = match self.sdk.connect(&identity, on_disconnect) {
            Ok(stream) => stream,
            Err(error) => {
                self.apply(LifecycleEvent::ConnectFailed(error));
                return;
            }
        };

        let stopped = {
            let mut inner = self.inner.lock();
            if inner.state != ConnectionState::Connecting {
                true
            } else {
                // Attach the sampler in the same critical section, so a
                // stop() observing Idle can never leave it pointed at this
                // stream afterwards.
                inner.stream = Some(Arc::clone(&stream));
                self.sampler.attach(Arc::clone(&stream));
                false
            }
        };
        if stopped {
            // stop() raced the connect; release the device again
            stream.stop();
            return;
        }
        self.apply(LifecycleEvent::Connected);

        loop {
            match stream.next_frame() {
                Ok(frame) => self.apply(LifecycleEvent::FrameReceived(frame)),
                Err(error) => {
                    debug!("Stream ended: {}", error);
                    self.apply(LifecycleEvent::Disconnected);
                    break;
                }
            }
            if self.state() != ConnectionState::Connected {
                break;
            }
        }
    }

    fn handle_connected(&self) {
        let attachment = {
            let mut inner = self.inner.lock();
            if inner.state != ConnectionState::Connecting {
                return;
            }
            inner.state = ConnectionState::Connected;
            inner
                .active
                .as_ref()
                .map(|identity| DeviceAttachment::from_class(identity.class()))
        };

        info!("Device connected");
        self.sink.notify_state(DeviceStateEvent::new(
            ReportedState::Connected,
            true,
            attachment,
        ));
    }

    fn handle_link_down(&self) {
        let (was_linked, stream) = {
            let mut inner = self.inner.lock();
            match inner.state {
                ConnectionState::Connecting | ConnectionState::Connected => {
                    inner.state = ConnectionState::Disconnected;
                    inner.active = None;
                    (true, inner.stream.take())
                }
                // Already idle or disconnected; teardown signals can arrive
                // more than once
                _ => (false, None),
            }
        };

        if !was_linked {
            return;
        }
        // Outside the lock: a stream whose stop() delivers its disconnect
        // callback synchronously would otherwise re-enter this handler and
        // self-deadlock. The re-entered call finds Disconnected and returns.
        if let Some(stream) = stream {
            stream.stop();
        }

        self.sampler.detach();
        self.cache.clear();
        self.limiter.reset();
        self.sink
            .notify_state(DeviceStateEvent::new(ReportedState::Disconnected, false, None));
    }

    fn handle_discovery_failed(&self, error: DiscoveryError) {
        warn!("Discovery error: {}", error);
        {
            let mut inner = self.inner.lock();
            if inner.state == ConnectionState::Discovering {
                inner.state = ConnectionState::DiscoveryError;
            }
        }
        self.sink.notify_state(DeviceStateEvent::new(
            ReportedState::DiscoveryError,
            false,
            None,
        ));
    }

    fn handle_frame(&self, frame: Frame) {
        if !self.limiter.accept(Instant::now()) {
            return;
        }

        match self.cache.ingest(&frame) {
            Ok(export) => {
                self.push_center_temperature();
                self.sink.notify_frame(FrameEvent::new(
                    export.path.display().to_string(),
                    export.inline,
                    export.timestamp_secs,
                ));
            }
            Err(ExportError::NoImageData) => {
                trace!("Dropping frame with no image data");
            }
            Err(error) => {
                warn!("Frame export failed: {}", error);
            }
        }
    }

    fn push_center_temperature(&self) {
        let tap = self.temperature_tap.read();
        if let Some(tap) = tap.as_ref() {
            let (x, y) = self.sample_point;
            // Sampling faults are deliberately dropped; the push is advisory
            if let Some(temperature) = self.sampler.sample_at(x, y) {
                tap(temperature, x, y);
            }
        }
    }
}

/// Adapter handed to the SDK so discovery callbacks outlive no longer than
/// the supervisor they feed.
struct SupervisorListener(Weak<ConnectionSupervisor>);

impl DiscoveryListener for SupervisorListener {
    fn on_device_found(&self, identity: DeviceIdentity) {
        if let Some(supervisor) = self.0.upgrade() {
            supervisor.apply(LifecycleEvent::DeviceFound(identity));
        }
    }

    fn on_discovery_error(&self, error: DiscoveryError) {
        if let Some(supervisor) = self.0.upgrade() {
            supervisor.apply(LifecycleEvent::DiscoveryFailed(error));
        }
    }
}

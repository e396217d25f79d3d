pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod facade;
pub mod frame;
pub mod rate_limit;
pub mod registry;
pub mod sampler;
pub mod sdk;
pub mod supervisor;

pub use cache::{CachedFrame, FrameCache, FrameExport};
pub use config::ThermocamConfig;
pub use error::{
    ConnectError, DiscoveryError, ExportError, Result, SdkError, StreamError, ThermocamError,
};
pub use events::{
    BroadcastSink, DeviceAttachment, DeviceStateEvent, EventSink, FrameEvent, NullSink,
    ReportedState, ThermalEvent,
};
pub use facade::{DeviceFacade, ErrorCode, FacadeError};
pub use frame::Frame;
pub use rate_limit::FrameRateLimiter;
pub use registry::{DeviceClass, DeviceIdentity, DeviceRegistry, TransportKind};
pub use sampler::TemperatureSampler;
pub use sdk::{CameraSdk, DiscoveryListener, EmulatedSdk, EmulatorKind, MockSdk, ThermalStream};
pub use supervisor::{ConnectionState, ConnectionSupervisor, DeviceConnectionInfo};

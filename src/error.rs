use thiserror::Error;

#[derive(Error, Debug)]
pub enum ThermocamError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] toml::de::Error),

    #[error("SDK error: {0}")]
    Sdk(#[from] SdkError),

    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Connect error: {0}")]
    Connect(#[from] ConnectError),

    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("System error: {message}")]
    System { message: String },
}

impl ThermocamError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }
}

/// SDK bring-up faults. Never fatal to the caller; a missing vendor SDK
/// simply means no physical devices will be discovered.
#[derive(Error, Debug)]
pub enum SdkError {
    #[error("SDK unavailable: {details}")]
    Unavailable { details: String },

    #[error("SDK teardown failed: {details}")]
    Teardown { details: String },
}

/// Discovery-channel faults. Reported but non-fatal; discovery keeps running.
#[derive(Error, Debug, Clone)]
pub enum DiscoveryError {
    #[error("Discovery transport error on {interface}: {details}")]
    Transport { interface: String, details: String },
}

/// Faults while establishing a connection. Drive Connecting -> Disconnected.
#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("Device {device_id} rejected connection: {details}")]
    Rejected { device_id: String, details: String },

    #[error("Device {device_id} is no longer present")]
    Gone { device_id: String },
}

/// Faults on an established stream. Drive Connected/Streaming -> Disconnected
/// and terminate the background stream task.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Stream read failed: {details}")]
    Read { details: String },

    #[error("Device disconnected")]
    Disconnected,
}

/// Frame export faults. Contained per-frame; the stream keeps running.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Frame carried no image data")]
    NoImageData,

    #[error("Frame encoding failed: {details}")]
    Encode { details: String },

    #[error("Failed to persist frame export: {source}")]
    PersistFailed {
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ThermocamError>;

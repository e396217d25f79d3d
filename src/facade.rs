use crate::supervisor::{ConnectionSupervisor, DeviceConnectionInfo};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Named rejection codes reported to external callers instead of raw faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NoData,
    PathUnavailable,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NoData => "NO_DATA",
            ErrorCode::PathUnavailable => "PATH_UNAVAILABLE",
        }
    }
}

/// Caller-facing rejection: a named code paired with a human-readable
/// message. The bridge layer forwards these verbatim.
#[derive(Debug, Clone, Error)]
#[error("{}: {message}", .code.as_str())]
pub struct FacadeError {
    pub code: ErrorCode,
    pub message: String,
}

impl FacadeError {
    fn new<S: Into<String>>(code: ErrorCode, message: S) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Synchronous read-only query surface over the supervisor's shared state.
///
/// Every read is a snapshot; nothing here blocks a writer or initiates
/// discovery or connection work as a side effect.
#[derive(Clone)]
pub struct DeviceFacade {
    supervisor: Arc<ConnectionSupervisor>,
}

impl DeviceFacade {
    pub fn new(supervisor: Arc<ConnectionSupervisor>) -> Self {
        Self { supervisor }
    }

    /// Whether the active attachment is an emulator fallback.
    pub fn is_emulator(&self) -> bool {
        self.supervisor.is_emulator()
    }

    /// Whether a physical device is currently attached.
    pub fn is_connected(&self) -> bool {
        self.supervisor.is_connected()
    }

    pub fn connection_info(&self) -> DeviceConnectionInfo {
        self.supervisor.connection_info()
    }

    pub fn latest_frame_path(&self) -> Option<PathBuf> {
        self.supervisor.latest_frame_path()
    }

    /// Point temperature against the most recent frame; `None` for
    /// out-of-bounds points, missing streams, or query faults.
    pub fn sample_at(&self, x: u32, y: u32) -> Option<f64> {
        self.supervisor.sample_at(x, y)
    }

    /// Command form of `sample_at` for bridge layers that report rejections
    /// by code.
    pub fn sample_temperature(&self, x: u32, y: u32) -> Result<f64, FacadeError> {
        self.sample_at(x, y).ok_or_else(|| {
            FacadeError::new(ErrorCode::NoData, "No temperature data available")
        })
    }

    /// Command form of `latest_frame_path`.
    pub fn latest_frame_path_command(&self) -> Result<PathBuf, FacadeError> {
        self.latest_frame_path().ok_or_else(|| {
            FacadeError::new(ErrorCode::PathUnavailable, "No frame has been exported yet")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ThermocamConfig;
    use crate::events::NullSink;
    use crate::sdk::MockSdk;

    fn facade() -> DeviceFacade {
        let supervisor = Arc::new(ConnectionSupervisor::new(
            Arc::new(MockSdk::new()),
            Arc::new(NullSink),
            &ThermocamConfig::default(),
        ));
        DeviceFacade::new(supervisor)
    }

    #[test]
    fn error_codes_use_wire_names() {
        assert_eq!(ErrorCode::NoData.as_str(), "NO_DATA");
        assert_eq!(ErrorCode::PathUnavailable.as_str(), "PATH_UNAVAILABLE");
    }

    #[test]
    fn idle_facade_reports_not_connected() {
        let facade = facade();
        assert!(!facade.is_connected());
        assert!(!facade.is_emulator());
        assert_eq!(facade.connection_info().to_string(), "Not connected");
        assert!(facade.latest_frame_path().is_none());
    }

    #[test]
    fn sample_command_rejects_with_no_data() {
        let facade = facade();
        let err = facade.sample_temperature(80, 60).unwrap_err();
        assert_eq!(err.code, ErrorCode::NoData);
        assert_eq!(err.to_string(), "NO_DATA: No temperature data available");
    }

    #[test]
    fn path_command_rejects_when_nothing_exported() {
        let facade = facade();
        let err = facade.latest_frame_path_command().unwrap_err();
        assert_eq!(err.code, ErrorCode::PathUnavailable);
    }
}

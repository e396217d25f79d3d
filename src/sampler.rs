use crate::sdk::ThermalStream;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::trace;

/// Point-query access to the active stream's thermal data.
///
/// Holds a snapshot handle to whatever stream is currently attached; queries
/// against a detached sampler, out-of-bounds coordinates, or a faulting
/// stream all degrade to `None`. Point queries never propagate hardware
/// faults to callers.
#[derive(Default)]
pub struct TemperatureSampler {
    stream: RwLock<Option<Arc<dyn ThermalStream>>>,
}

impl TemperatureSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, stream: Arc<dyn ThermalStream>) {
        *self.stream.write() = Some(stream);
    }

    pub fn detach(&self) {
        *self.stream.write() = None;
    }

    pub fn is_attached(&self) -> bool {
        self.stream.read().is_some()
    }

    /// Temperature in degrees Celsius at (x, y), or `None` when no stream is
    /// active, the point lies outside the raster, or the query faults.
    pub fn sample_at(&self, x: u32, y: u32) -> Option<f64> {
        let stream = self.stream.read().clone()?;

        let (width, height) = stream.dimensions();
        if x >= width || y >= height {
            trace!("Sample point ({}, {}) outside {}x{} raster", x, y, width, height);
            return None;
        }

        stream.temperature_at(x, y).ok()
    }
}

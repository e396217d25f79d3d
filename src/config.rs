use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ThermocamConfig {
    pub camera: CameraConfig,
    pub stream: StreamConfig,
    pub cache: CacheConfig,
    pub events: EventConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Thermal raster width in pixels
    #[serde(default = "default_frame_width")]
    pub frame_width: u32,

    /// Thermal raster height in pixels
    #[serde(default = "default_frame_height")]
    pub frame_height: u32,
}

impl CameraConfig {
    /// Fixed sample point pushed with each accepted frame: the raster center.
    pub fn center_point(&self) -> (u32, u32) {
        (self.frame_width / 2, self.frame_height / 2)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StreamConfig {
    /// Minimum interval between accepted frames in milliseconds (~3 fps)
    #[serde(default = "default_min_frame_interval_ms")]
    pub min_frame_interval_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheConfig {
    /// Directory for the exported latest-frame file
    #[serde(default = "default_cache_dir")]
    pub dir: String,

    /// File name of the exported latest frame
    #[serde(default = "default_cache_file_name")]
    pub file_name: String,

    /// JPEG quality for the inline transport encoding (1-100)
    #[serde(default = "default_inline_jpeg_quality")]
    pub inline_jpeg_quality: u8,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EventConfig {
    /// Broadcast channel capacity for event delivery
    #[serde(default = "default_event_capacity")]
    pub channel_capacity: usize,
}

fn default_frame_width() -> u32 {
    160
}

fn default_frame_height() -> u32 {
    120
}

fn default_min_frame_interval_ms() -> u64 {
    333
}

fn default_cache_dir() -> String {
    "/tmp/thermocam".to_string()
}

fn default_cache_file_name() -> String {
    "thermal_latest_frame.png".to_string()
}

fn default_inline_jpeg_quality() -> u8 {
    70
}

fn default_event_capacity() -> usize {
    64
}

impl Default for ThermocamConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                frame_width: default_frame_width(),
                frame_height: default_frame_height(),
            },
            stream: StreamConfig {
                min_frame_interval_ms: default_min_frame_interval_ms(),
            },
            cache: CacheConfig {
                dir: default_cache_dir(),
                file_name: default_cache_file_name(),
                inline_jpeg_quality: default_inline_jpeg_quality(),
            },
            events: EventConfig {
                channel_capacity: default_event_capacity(),
            },
        }
    }
}

impl ThermocamConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        let path = config_path.as_ref();

        let mut builder = Config::builder();

        if path.exists() {
            info!("Loading configuration from: {}", path.display());
            builder = builder.add_source(File::from(path));
        } else {
            info!(
                "Configuration file {} not found, using defaults",
                path.display()
            );
        }

        // THERMOCAM_STREAM__MIN_FRAME_INTERVAL_MS=500 etc.
        builder = builder.add_source(
            Environment::with_prefix("THERMOCAM")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;

        debug!("Loaded configuration: {:?}", config);
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.frame_width == 0 || self.camera.frame_height == 0 {
            return Err(ConfigError::Message(
                "camera frame dimensions must be non-zero".to_string(),
            ));
        }

        if self.stream.min_frame_interval_ms == 0 {
            return Err(ConfigError::Message(
                "stream.min_frame_interval_ms must be non-zero".to_string(),
            ));
        }

        if self.cache.inline_jpeg_quality == 0 || self.cache.inline_jpeg_quality > 100 {
            return Err(ConfigError::Message(
                "cache.inline_jpeg_quality must be in 1..=100".to_string(),
            ));
        }

        if self.cache.file_name.is_empty() {
            return Err(ConfigError::Message(
                "cache.file_name must not be empty".to_string(),
            ));
        }

        if self.events.channel_capacity == 0 {
            return Err(ConfigError::Message(
                "events.channel_capacity must be non-zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Render the default configuration as TOML
    pub fn default_toml() -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(&Self::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ThermocamConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.stream.min_frame_interval_ms, 333);
        assert_eq!(config.camera.center_point(), (80, 60));
    }

    #[test]
    fn zero_interval_rejected() {
        let mut config = ThermocamConfig::default();
        config.stream.min_frame_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn jpeg_quality_bounds() {
        let mut config = ThermocamConfig::default();
        config.cache.inline_jpeg_quality = 0;
        assert!(config.validate().is_err());
        config.cache.inline_jpeg_quality = 101;
        assert!(config.validate().is_err());
        config.cache.inline_jpeg_quality = 100;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn default_toml_round_trips() {
        let rendered = ThermocamConfig::default_toml().unwrap();
        let parsed: ThermocamConfig = toml::from_str(&rendered).unwrap();
        assert!(parsed.validate().is_ok());
        assert_eq!(parsed.cache.file_name, "thermal_latest_frame.png");
    }
}

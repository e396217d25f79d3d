use image::RgbaImage;
use std::sync::Arc;
use std::time::SystemTime;

/// A single decoded frame delivered by the active stream.
///
/// Carries up to two rasters: the fused thermal image (thermal enhanced with
/// visible-light edge detail) and the plain visible-light photo from the
/// secondary sensor. At least one must be present for the frame to be usable.
/// Frames are ephemeral: each one supersedes the last and is never queued.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Fused thermal image, if the stream produced one
    pub fused: Option<Arc<RgbaImage>>,
    /// Visible-light image, if the stream produced one
    pub visible: Option<Arc<RgbaImage>>,
    /// Capture timestamp
    pub timestamp: SystemTime,
}

impl Frame {
    pub fn new(
        fused: Option<RgbaImage>,
        visible: Option<RgbaImage>,
        timestamp: SystemTime,
    ) -> Self {
        Self {
            fused: fused.map(Arc::new),
            visible: visible.map(Arc::new),
            timestamp,
        }
    }

    /// The image selected for caching and export: fused if present, else the
    /// visible-light photo.
    pub fn primary_image(&self) -> Option<&Arc<RgbaImage>> {
        self.fused.as_ref().or(self.visible.as_ref())
    }

    /// A frame with neither raster is invalid and gets dropped.
    pub fn has_image(&self) -> bool {
        self.fused.is_some() || self.visible.is_some()
    }

    /// Capture timestamp as fractional seconds since the epoch, the form the
    /// external observer receives.
    pub fn timestamp_secs(&self) -> f64 {
        self.timestamp
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray_image(width: u32, height: u32, value: u8) -> RgbaImage {
        RgbaImage::from_pixel(width, height, image::Rgba([value, value, value, 255]))
    }

    #[test]
    fn primary_prefers_fused() {
        let frame = Frame::new(
            Some(gray_image(4, 4, 10)),
            Some(gray_image(4, 4, 200)),
            SystemTime::now(),
        );
        let primary = frame.primary_image().unwrap();
        assert_eq!(primary.get_pixel(0, 0).0[0], 10);
    }

    #[test]
    fn primary_falls_back_to_visible() {
        let frame = Frame::new(None, Some(gray_image(4, 4, 200)), SystemTime::now());
        let primary = frame.primary_image().unwrap();
        assert_eq!(primary.get_pixel(0, 0).0[0], 200);
    }

    #[test]
    fn empty_frame_has_no_image() {
        let frame = Frame::new(None, None, SystemTime::now());
        assert!(!frame.has_image());
        assert!(frame.primary_image().is_none());
    }

    #[test]
    fn timestamp_converts_to_seconds() {
        let timestamp = SystemTime::UNIX_EPOCH + std::time::Duration::from_millis(1_500);
        let frame = Frame::new(Some(gray_image(1, 1, 0)), None, timestamp);
        assert!((frame.timestamp_secs() - 1.5).abs() < 1e-9);
    }
}

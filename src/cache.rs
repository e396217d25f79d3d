use crate::error::ExportError;
use crate::frame::Frame;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ColorType, DynamicImage, ImageEncoder, RgbaImage};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, trace, warn};

const INLINE_URI_PREFIX: &str = "data:image/jpeg;base64,";

/// Snapshot of the most recently ingested frame.
#[derive(Debug, Clone)]
pub struct CachedFrame {
    pub image: Arc<RgbaImage>,
    pub timestamp: SystemTime,
}

/// Result of a successful frame export: the on-disk path plus the inline
/// transport encoding, ready to publish as a frame event.
#[derive(Debug, Clone)]
pub struct FrameExport {
    pub path: PathBuf,
    pub inline: String,
    pub timestamp_secs: f64,
}

/// Holds the single most recent decoded frame and its export representations.
///
/// The in-memory latest frame is updated before any export work, so
/// `latest()` reflects the newest ingested frame even when export fails.
/// `streaming()` flips true only after at least one frame has been
/// successfully persisted, and flips false when persistence breaks.
pub struct FrameCache {
    dir: PathBuf,
    file_name: String,
    inline_jpeg_quality: u8,
    latest: RwLock<Option<CachedFrame>>,
    export_path: RwLock<Option<PathBuf>>,
    streaming: AtomicBool,
}

impl FrameCache {
    pub fn new<P: AsRef<Path>>(dir: P, file_name: &str, inline_jpeg_quality: u8) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            file_name: file_name.to_string(),
            inline_jpeg_quality,
            latest: RwLock::new(None),
            export_path: RwLock::new(None),
            streaming: AtomicBool::new(false),
        }
    }

    /// Ingest a frame: cache it in memory, export it to disk, and produce the
    /// inline encoding. Each step fails independently; a failed export never
    /// disturbs the in-memory latest frame.
    pub fn ingest(&self, frame: &Frame) -> Result<FrameExport, ExportError> {
        let image = Arc::clone(frame.primary_image().ok_or(ExportError::NoImageData)?);

        *self.latest.write() = Some(CachedFrame {
            image: Arc::clone(&image),
            timestamp: frame.timestamp,
        });

        let png_bytes = encode_png(&image)?;
        let jpeg_bytes = encode_jpeg(&image, self.inline_jpeg_quality)?;

        let path = self.dir.join(&self.file_name);
        if let Err(e) = std::fs::create_dir_all(&self.dir).and_then(|_| std::fs::write(&path, &png_bytes)) {
            warn!("Failed to persist frame export to {}: {}", path.display(), e);
            self.streaming.store(false, Ordering::SeqCst);
            return Err(ExportError::PersistFailed { source: e });
        }

        *self.export_path.write() = Some(path.clone());
        self.streaming.store(true, Ordering::SeqCst);

        trace!(
            "Exported frame to {} ({} bytes png, {} bytes jpeg inline)",
            path.display(),
            png_bytes.len(),
            jpeg_bytes.len()
        );

        Ok(FrameExport {
            path,
            inline: format!("{}{}", INLINE_URI_PREFIX, BASE64.encode(&jpeg_bytes)),
            timestamp_secs: frame.timestamp_secs(),
        })
    }

    /// Most recently ingested frame, regardless of export success.
    pub fn latest(&self) -> Option<CachedFrame> {
        self.latest.read().clone()
    }

    /// Path of the last successful on-disk export.
    pub fn latest_path(&self) -> Option<PathBuf> {
        self.export_path.read().clone()
    }

    pub fn streaming(&self) -> bool {
        self.streaming.load(Ordering::SeqCst)
    }

    /// Drop all cached state; called on stop and disconnect.
    pub fn clear(&self) {
        debug!("Clearing frame cache");
        *self.latest.write() = None;
        *self.export_path.write() = None;
        self.streaming.store(false, Ordering::SeqCst);
    }
}

fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, ExportError> {
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes)
        .write_image(image.as_raw(), image.width(), image.height(), ColorType::Rgba8)
        .map_err(|e| ExportError::Encode {
            details: format!("PNG encode failed: {}", e),
        })?;
    Ok(bytes)
}

fn encode_jpeg(image: &RgbaImage, quality: u8) -> Result<Vec<u8>, ExportError> {
    // JPEG carries no alpha channel
    let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
    let mut bytes = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut bytes, quality);
    encoder
        .encode_image(&rgb)
        .map_err(|e| ExportError::Encode {
            details: format!("JPEG encode failed: {}", e),
        })?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_frame(width: u32, height: u32, value: u8) -> Frame {
        let image = RgbaImage::from_pixel(width, height, image::Rgba([value, value, value, 255]));
        Frame::new(Some(image), None, SystemTime::now())
    }

    fn test_cache(dir: &Path) -> FrameCache {
        FrameCache::new(dir, "thermal_latest_frame.png", 70)
    }

    #[test]
    fn ingest_exports_and_marks_streaming() {
        let dir = tempfile::tempdir().unwrap();
        let cache = test_cache(dir.path());
        assert!(!cache.streaming());

        let export = cache.ingest(&test_frame(160, 120, 128)).unwrap();

        assert!(export.path.exists());
        assert!(export.inline.starts_with("data:image/jpeg;base64,"));
        assert!(cache.streaming());
        assert_eq!(cache.latest_path(), Some(export.path));
    }

    #[test]
    fn export_round_trips_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let cache = test_cache(dir.path());

        let export = cache.ingest(&test_frame(160, 120, 42)).unwrap();

        let decoded = image::open(&export.path).unwrap();
        assert_eq!(decoded.width(), 160);
        assert_eq!(decoded.height(), 120);

        let inline_bytes = BASE64
            .decode(export.inline.trim_start_matches("data:image/jpeg;base64,"))
            .unwrap();
        let inline_decoded = image::load_from_memory(&inline_bytes).unwrap();
        assert_eq!(inline_decoded.width(), 160);
        assert_eq!(inline_decoded.height(), 120);
    }

    #[test]
    fn no_image_data_leaves_cache_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let cache = test_cache(dir.path());

        cache.ingest(&test_frame(8, 8, 200)).unwrap();
        let before = cache.latest().unwrap();

        let empty = Frame::new(None, None, SystemTime::now());
        match cache.ingest(&empty) {
            Err(ExportError::NoImageData) => {}
            other => panic!("expected NoImageData, got {:?}", other.map(|_| ())),
        }

        let after = cache.latest().unwrap();
        assert_eq!(after.timestamp, before.timestamp);
        assert_eq!(after.image.get_pixel(0, 0).0[0], 200);
        assert!(cache.streaming());
    }

    #[test]
    fn persist_failure_keeps_latest_but_clears_streaming() {
        let dir = tempfile::tempdir().unwrap();
        // A file where the cache directory should be makes create_dir_all fail
        let blocked = dir.path().join("blocked");
        std::fs::write(&blocked, b"not a directory").unwrap();
        let cache = test_cache(&blocked);

        let frame = test_frame(8, 8, 17);
        match cache.ingest(&frame) {
            Err(ExportError::PersistFailed { .. }) => {}
            other => panic!("expected PersistFailed, got {:?}", other.map(|_| ())),
        }

        assert!(!cache.streaming());
        assert!(cache.latest_path().is_none());
        // In-memory latest still reflects the ingested frame
        assert_eq!(cache.latest().unwrap().image.get_pixel(0, 0).0[0], 17);
    }

    #[test]
    fn later_frame_overwrites_earlier() {
        let dir = tempfile::tempdir().unwrap();
        let cache = test_cache(dir.path());

        cache.ingest(&test_frame(8, 8, 1)).unwrap();
        std::thread::sleep(Duration::from_millis(2));
        cache.ingest(&test_frame(8, 8, 2)).unwrap();

        assert_eq!(cache.latest().unwrap().image.get_pixel(0, 0).0[0], 2);
    }

    #[test]
    fn clear_resets_everything() {
        let dir = tempfile::tempdir().unwrap();
        let cache = test_cache(dir.path());

        cache.ingest(&test_frame(8, 8, 1)).unwrap();
        cache.clear();

        assert!(cache.latest().is_none());
        assert!(cache.latest_path().is_none());
        assert!(!cache.streaming());
    }
}

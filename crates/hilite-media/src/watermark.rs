//! Watermark overlay for free-tier exports.
//!
//! The watermark PNG is decoded once per process and shared across renders.
//! Placement scales with output resolution so the overlay sits at the same
//! relative position and size at 720p and 1080p.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::RgbaImage;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::error::{MediaError, MediaResult};

/// Default watermark asset path in the production container.
pub const DEFAULT_WATERMARK_PATH: &str = "/app/assets/watermark.png";

/// Development fallback paths to check.
const DEV_WATERMARK_PATHS: &[&str] = &[
    "./assets/watermark.png",
    "../assets/watermark.png",
    "assets/watermark.png",
];

/// Reference canvas height the base watermark dimensions are defined at.
const BASE_RESOLUTION: f64 = 1080.0;
/// Watermark box size at the reference resolution.
const BASE_MARK_WIDTH: f64 = 200.0;
const BASE_MARK_HEIGHT: f64 = 50.0;
/// Padding from the bottom-right corner at the reference resolution.
const BASE_PADDING: f64 = 20.0;
/// Overlay opacity: visible but not intrusive.
const MARK_OPACITY: f64 = 0.6;

/// Resolve the watermark path, checking dev fallbacks when the production
/// path is missing.
pub fn resolve_watermark_path() -> PathBuf {
    if Path::new(DEFAULT_WATERMARK_PATH).exists() {
        return PathBuf::from(DEFAULT_WATERMARK_PATH);
    }

    for path in DEV_WATERMARK_PATHS {
        if Path::new(path).exists() {
            debug!(path = path, "Found watermark at dev fallback path");
            return PathBuf::from(path);
        }
    }

    // Will fail at load time for plans that need it.
    PathBuf::from(DEFAULT_WATERMARK_PATH)
}

/// Process-wide watermark asset cache.
///
/// The decode happens once; concurrent cold-cache callers share the same
/// in-flight load rather than decoding twice. Load failure is surfaced to
/// the caller and retried on the next request, so plans without a watermark
/// are never affected.
pub struct WatermarkCache {
    path: PathBuf,
    cell: OnceCell<Arc<RgbaImage>>,
}

impl WatermarkCache {
    /// Create a cache for the given asset path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cell: OnceCell::new(),
        }
    }

    /// Create a cache using the default path resolution.
    pub fn from_default_paths() -> Self {
        Self::new(resolve_watermark_path())
    }

    /// The asset path this cache loads from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the decoded watermark, loading it on first call.
    pub async fn get(&self) -> MediaResult<Arc<RgbaImage>> {
        let mark = self
            .cell
            .get_or_try_init(|| async {
                let bytes = tokio::fs::read(&self.path)
                    .await
                    .map_err(|_| MediaError::AssetNotFound(self.path.clone()))?;
                let img = image::load_from_memory(&bytes)?.to_rgba8();
                info!(
                    path = %self.path.display(),
                    width = img.width(),
                    height = img.height(),
                    "Loaded watermark asset"
                );
                Ok::<_, MediaError>(Arc::new(img))
            })
            .await?;
        Ok(Arc::clone(mark))
    }
}

/// Computed watermark geometry for one canvas size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatermarkPlacement {
    /// Top-left corner, in canvas coordinates.
    pub x: i64,
    pub y: i64,
    /// Scaled box the watermark is drawn into.
    pub width: u32,
    pub height: u32,
}

impl WatermarkPlacement {
    /// Compute placement for a canvas: 200x50 box at 1080p with 20px
    /// bottom-right padding, all scaled by `min(canvas_h / 1080, 1)`.
    pub fn for_canvas(canvas_w: u32, canvas_h: u32) -> Self {
        let scale = (f64::from(canvas_h) / BASE_RESOLUTION).min(1.0);
        let width = (BASE_MARK_WIDTH * scale).round() as u32;
        let height = (BASE_MARK_HEIGHT * scale).round() as u32;
        let pad_x = (BASE_PADDING * scale).round() as i64;
        let pad_y = (BASE_PADDING * scale).round() as i64;
        Self {
            x: i64::from(canvas_w) - i64::from(width) - pad_x,
            y: i64::from(canvas_h) - i64::from(height) - pad_y,
            width,
            height,
        }
    }
}

/// Draw the watermark onto a canvas with normal (source-over) blending at
/// 60% opacity, bottom-right anchored.
///
/// Called once per render on the shared base canvas, not per frame.
pub fn apply_watermark(canvas: &mut RgbaImage, mark: &RgbaImage) {
    let placement = WatermarkPlacement::for_canvas(canvas.width(), canvas.height());
    if placement.width == 0 || placement.height == 0 {
        return;
    }

    let mut scaled = imageops::resize(
        mark,
        placement.width,
        placement.height,
        FilterType::Triangle,
    );
    for pixel in scaled.pixels_mut() {
        pixel.0[3] = (f64::from(pixel.0[3]) * MARK_OPACITY).round() as u8;
    }

    imageops::overlay(canvas, &scaled, placement.x, placement.y);
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_placement_at_reference_resolution() {
        let p = WatermarkPlacement::for_canvas(1920, 1080);
        assert_eq!(p.width, 200);
        assert_eq!(p.height, 50);
        assert_eq!(p.x, 1920 - 200 - 20);
        assert_eq!(p.y, 1080 - 50 - 20);
    }

    #[test]
    fn test_placement_scales_down_at_720p() {
        let p = WatermarkPlacement::for_canvas(1280, 720);
        // scale = 720/1080 = 2/3
        assert_eq!(p.width, 133); // round(200 * 2/3)
        assert_eq!(p.height, 33); // round(50 * 2/3)
        assert_eq!(p.x, 1280 - 133 - 13);
        assert_eq!(p.y, 720 - 33 - 13);
    }

    #[test]
    fn test_placement_never_scales_up() {
        let p = WatermarkPlacement::for_canvas(3840, 2160);
        assert_eq!(p.width, 200);
        assert_eq!(p.height, 50);
    }

    #[test]
    fn test_placement_relative_position_is_resolution_invariant() {
        let p720 = WatermarkPlacement::for_canvas(1280, 720);
        let p1080 = WatermarkPlacement::for_canvas(1920, 1080);
        // Right-edge distance scales with the same factor as the box.
        let rel720 = (1280 - p720.x) as f64 / 720.0;
        let rel1080 = (1920 - p1080.x) as f64 / 1080.0;
        assert!((rel720 - rel1080).abs() < 0.01);
    }

    #[test]
    fn test_apply_blends_at_sixty_percent() {
        let mut canvas = RgbaImage::from_pixel(400, 1080, Rgba([0, 0, 0, 255]));
        let mark = RgbaImage::from_pixel(10, 10, Rgba([255, 255, 255, 255]));
        apply_watermark(&mut canvas, &mark);

        let p = WatermarkPlacement::for_canvas(400, 1080);
        let sample = canvas.get_pixel(
            (p.x + i64::from(p.width) / 2) as u32,
            (p.y + i64::from(p.height) / 2) as u32,
        );
        // White over black at 0.6 alpha lands around 153.
        assert!(sample.0[0] > 140 && sample.0[0] < 165, "got {:?}", sample);
    }

    #[tokio::test]
    async fn test_cache_missing_asset_is_asset_not_found() {
        let cache = WatermarkCache::new("/nonexistent/watermark.png");
        let err = cache.get().await.unwrap_err();
        assert!(matches!(err, MediaError::AssetNotFound(_)));
    }

    #[tokio::test]
    async fn test_cache_returns_shared_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("watermark.png");
        let mark = RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255]));
        mark.save(&path).unwrap();

        let cache = WatermarkCache::new(&path);
        let a = cache.get().await.unwrap();
        let b = cache.get().await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}

//! Frame compositing for highlight exports.
//!
//! A render builds one [`BaseCanvas`] up front (source image decoded,
//! scaled to the plan's resolution cap, padded to even dimensions, with the
//! watermark baked in when the plan requires it) and then stamps the
//! animated highlight rectangle onto a copy of it for every frame. Frames
//! are emitted as lossless PNG buffers, the unit the encoder consumes.

use std::io::Cursor;

use image::imageops::{self, FilterType};
use image::{ImageOutputFormat, RgbaImage};
use tracing::debug;

use hilite_models::HighlightRect;

use crate::error::MediaResult;
use crate::watermark::apply_watermark;

/// The pre-rendered per-request canvas every frame starts from.
#[derive(Debug, Clone)]
pub struct BaseCanvas {
    image: RgbaImage,
}

impl BaseCanvas {
    /// Decode a source image and prepare the base canvas.
    ///
    /// If either dimension exceeds `max_resolution`, the image is uniformly
    /// downscaled so its larger dimension equals the cap (dimensions
    /// floored). Both output dimensions are then grown by at most one pixel
    /// to be even, as required by 4:2:0 chroma subsampling.
    pub fn build(
        source: &[u8],
        max_resolution: u32,
        watermark: Option<&RgbaImage>,
    ) -> MediaResult<Self> {
        let decoded = image::load_from_memory(source)?.to_rgba8();
        let (src_w, src_h) = decoded.dimensions();

        let (mut img_w, mut img_h) = (src_w, src_h);
        let scaled;
        let img = if src_w > max_resolution || src_h > max_resolution {
            let scale = (f64::from(max_resolution) / f64::from(src_w))
                .min(f64::from(max_resolution) / f64::from(src_h));
            img_w = ((f64::from(src_w) * scale).floor() as u32).max(1);
            img_h = ((f64::from(src_h) * scale).floor() as u32).max(1);
            scaled = imageops::resize(&decoded, img_w, img_h, FilterType::Triangle);
            &scaled
        } else {
            &decoded
        };

        let canvas_w = img_w + (img_w % 2);
        let canvas_h = img_h + (img_h % 2);

        let mut canvas = RgbaImage::new(canvas_w, canvas_h);
        imageops::replace(&mut canvas, img, 0, 0);

        if let Some(mark) = watermark {
            apply_watermark(&mut canvas, mark);
        }

        debug!(
            src_w,
            src_h, canvas_w, canvas_h, "Built base canvas"
        );

        Ok(Self { image: canvas })
    }

    /// Canvas width in pixels (always even).
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Canvas height in pixels (always even).
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Render one frame: base canvas plus the highlight rectangle at the
    /// frame's animated width and opacity, returned as an encoded PNG.
    ///
    /// The drawn width is floored to one pixel so the overlay never
    /// disappears entirely at `t = 0`.
    pub fn render_frame(
        &self,
        rect: &HighlightRect,
        color: [u8; 3],
        width_now: f64,
        opacity_now: f64,
    ) -> MediaResult<Vec<u8>> {
        let mut frame = self.image.clone();
        let draw_width = width_now.max(1.0);
        let alpha = opacity_now.clamp(0.0, 1.0);

        fill_rect_multiply(&mut frame, rect, draw_width, color, alpha);

        let mut buf = Cursor::new(Vec::new());
        frame.write_to(&mut buf, ImageOutputFormat::Png)?;
        Ok(buf.into_inner())
    }

    /// Borrow the underlying pixel buffer.
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

/// Fill `rect` (with `draw_width` in place of its own width) using multiply
/// blending at `alpha`, clipped to the canvas.
///
/// Multiply keeps the underlying detail visible through the overlay, the
/// highlighter-marker look, instead of flat occlusion.
fn fill_rect_multiply(
    frame: &mut RgbaImage,
    rect: &HighlightRect,
    draw_width: f64,
    color: [u8; 3],
    alpha: f64,
) {
    if alpha <= 0.0 {
        return;
    }

    // Normalize a negative height the way a 2D canvas does: extend upward.
    let (top, bottom) = if rect.h >= 0.0 {
        (rect.y, rect.y + rect.h)
    } else {
        (rect.y + rect.h, rect.y)
    };

    let (w, h) = frame.dimensions();
    let x0 = rect.x.round().clamp(0.0, f64::from(w)) as u32;
    let x1 = (rect.x + draw_width).round().clamp(0.0, f64::from(w)) as u32;
    let y0 = top.round().clamp(0.0, f64::from(h)) as u32;
    let y1 = bottom.round().clamp(0.0, f64::from(h)) as u32;

    let fill = [
        f64::from(color[0]) / 255.0,
        f64::from(color[1]) / 255.0,
        f64::from(color[2]) / 255.0,
    ];

    for y in y0..y1 {
        for x in x0..x1 {
            let px = frame.get_pixel_mut(x, y);
            for c in 0..3 {
                let base = f64::from(px.0[c]);
                // base*(1-a) + (base*fill)*a
                let blended = base * (1.0 - alpha * (1.0 - fill[c]));
                px.0[c] = blended.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn png_bytes(w: u32, h: u32, pixel: Rgba<u8>) -> Vec<u8> {
        let img = RgbaImage::from_pixel(w, h, pixel);
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageOutputFormat::Png).unwrap();
        buf.into_inner()
    }

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    #[test]
    fn test_small_image_is_not_scaled() {
        let canvas = BaseCanvas::build(&png_bytes(100, 100, WHITE), 720, None).unwrap();
        assert_eq!((canvas.width(), canvas.height()), (100, 100));
    }

    #[test]
    fn test_resolution_cap_preserves_aspect() {
        let canvas = BaseCanvas::build(&png_bytes(2000, 1000, WHITE), 720, None).unwrap();
        // scale = 720/2000 -> 720x360
        assert_eq!((canvas.width(), canvas.height()), (720, 360));
    }

    #[test]
    fn test_resolution_cap_on_tall_image() {
        let canvas = BaseCanvas::build(&png_bytes(1000, 2000, WHITE), 720, None).unwrap();
        assert_eq!((canvas.width(), canvas.height()), (360, 720));
    }

    #[test]
    fn test_odd_dimensions_padded_to_even() {
        let canvas = BaseCanvas::build(&png_bytes(101, 75, WHITE), 720, None).unwrap();
        assert_eq!((canvas.width(), canvas.height()), (102, 76));
    }

    #[test]
    fn test_cap_then_pad_stays_within_one_pixel() {
        // 999x999 capped to 720 -> 719x719 after floor -> padded to 720x720
        let canvas = BaseCanvas::build(&png_bytes(999, 999, WHITE), 720, None).unwrap();
        assert!(canvas.width() <= 721 && canvas.width() % 2 == 0);
        assert_eq!(canvas.width(), canvas.height());
    }

    #[test]
    fn test_multiply_blend_full_opacity() {
        let canvas = BaseCanvas::build(&png_bytes(20, 20, WHITE), 720, None).unwrap();
        let rect = HighlightRect::new(0.0, 0.0, 10.0, 10.0);
        let png = canvas
            .render_frame(&rect, [255, 255, 0], 10.0, 1.0)
            .unwrap();
        let frame = image::load_from_memory(&png).unwrap().to_rgba8();
        // White * yellow = yellow inside the rect.
        assert_eq!(frame.get_pixel(5, 5).0, [255, 255, 0, 255]);
        // Untouched outside.
        assert_eq!(frame.get_pixel(15, 15).0, [255, 255, 255, 255]);
    }

    #[test]
    fn test_multiply_blend_half_opacity() {
        let canvas = BaseCanvas::build(&png_bytes(20, 20, WHITE), 720, None).unwrap();
        let rect = HighlightRect::new(0.0, 0.0, 10.0, 10.0);
        let png = canvas
            .render_frame(&rect, [255, 255, 0], 10.0, 0.5)
            .unwrap();
        let frame = image::load_from_memory(&png).unwrap().to_rgba8();
        let px = frame.get_pixel(5, 5);
        assert_eq!(px.0[0], 255);
        assert_eq!(px.0[1], 255);
        // Blue: 255 * (1 - 0.5) = 127.5 -> rounds to 128
        assert_eq!(px.0[2], 128);
    }

    #[test]
    fn test_draw_width_floors_to_one_pixel() {
        let canvas = BaseCanvas::build(&png_bytes(20, 20, WHITE), 720, None).unwrap();
        let rect = HighlightRect::new(3.0, 3.0, 10.0, 5.0);
        // Animated width 0 still paints a single column.
        let png = canvas.render_frame(&rect, [0, 0, 0], 0.0, 1.0).unwrap();
        let frame = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(frame.get_pixel(3, 4).0, [0, 0, 0, 255]);
        assert_eq!(frame.get_pixel(4, 4).0, [255, 255, 255, 255]);
    }

    #[test]
    fn test_rect_clips_to_canvas() {
        let canvas = BaseCanvas::build(&png_bytes(20, 20, WHITE), 720, None).unwrap();
        let rect = HighlightRect::new(-5.0, -5.0, 100.0, 100.0);
        // Must not panic; whole canvas tinted.
        let png = canvas
            .render_frame(&rect, [255, 255, 0], 100.0, 1.0)
            .unwrap();
        let frame = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(frame.get_pixel(0, 0).0, [255, 255, 0, 255]);
        assert_eq!(frame.get_pixel(19, 19).0, [255, 255, 0, 255]);
    }

    #[test]
    fn test_negative_height_extends_upward() {
        let canvas = BaseCanvas::build(&png_bytes(20, 20, WHITE), 720, None).unwrap();
        let rect = HighlightRect::new(0.0, 10.0, 5.0, -5.0);
        let png = canvas.render_frame(&rect, [0, 0, 0], 5.0, 1.0).unwrap();
        let frame = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(frame.get_pixel(2, 7).0, [0, 0, 0, 255]);
        assert_eq!(frame.get_pixel(2, 12).0, [255, 255, 255, 255]);
    }

    #[test]
    fn test_frame_is_valid_png() {
        let canvas = BaseCanvas::build(&png_bytes(10, 10, WHITE), 720, None).unwrap();
        let rect = HighlightRect::new(0.0, 0.0, 4.0, 4.0);
        let png = canvas.render_frame(&rect, [255, 255, 0], 4.0, 0.5).unwrap();
        assert_eq!(&png[0..8], &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]);
    }

    #[test]
    fn test_invalid_source_bytes_error() {
        let err = BaseCanvas::build(b"not an image", 720, None).unwrap_err();
        assert!(matches!(err, crate::error::MediaError::ImageDecode(_)));
    }
}

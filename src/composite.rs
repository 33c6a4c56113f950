//! # Composite Builder
//!
//! Flattens the room image and all placements into a single raster at the
//! room's natural resolution.
//!
//! Placement geometry lives in display space (whatever size the room renders
//! at in the client's viewport), so every rectangle is scaled by
//! `natural / displayed` before drawing:
//!
//! ```text
//! sx = natural_width  / display_width
//! sy = natural_height / display_height
//!
//! (x, y, w, h)  ──►  (x·sx, y·sy, w·sx, h·sy)
//! ```
//!
//! Layers are drawn in slice order, so later placements end up on top. Only
//! the part of a layer that lands on the canvas is resampled; a placement
//! dragged far past the room edge costs no more than one the room's size.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbaImage};
use tracing::debug;

use crate::error::{Result, RoomstageError};
use crate::media::ImageData;
use crate::placement::{Placement, Size};

/// Mime type of composites sent to the generation service.
pub const COMPOSITE_MIME: &str = "image/jpeg";

/// JPEG quality used for composites.
pub const COMPOSITE_QUALITY: u8 = 90;

/// Display-to-natural scale factors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleFactors {
    pub x: f64,
    pub y: f64,
}

impl ScaleFactors {
    /// Factors mapping `display` space onto an image of `natural` pixels.
    pub fn between(natural: (u32, u32), display: Size) -> Result<Self> {
        if !(display.width > 0.0 && display.height > 0.0) {
            return Err(RoomstageError::InputUnavailable(format!(
                "Display size {}x{} is not usable",
                display.width, display.height
            )));
        }
        Ok(Self {
            x: natural.0 as f64 / display.width,
            y: natural.1 as f64 / display.height,
        })
    }
}

/// A pixel rectangle in natural-image space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

/// Map a placement's display-space rectangle into natural-image pixels.
pub fn scale_rect(placement: &Placement, scale: ScaleFactors) -> PixelRect {
    PixelRect {
        x: (placement.position.x * scale.x).round() as i64,
        y: (placement.position.y * scale.y).round() as i64,
        width: (placement.size.width * scale.x).round().max(1.0) as u32,
        height: (placement.size.height * scale.y).round().max(1.0) as u32,
    }
}

/// Draw `layers` over `room` in order.
pub fn composite(room: &DynamicImage, layers: &[(DynamicImage, PixelRect)]) -> RgbaImage {
    let mut canvas = room.to_rgba8();
    let bounds = canvas.dimensions();
    for (layer, rect) in layers {
        match visible_part(layer, *rect, bounds) {
            Some((scaled, x, y)) => imageops::overlay(&mut canvas, &scaled.to_rgba8(), x, y),
            None => debug!(?rect, "Layer lies outside the canvas, skipped"),
        }
    }
    canvas
}

/// Crop `layer` to the part of `rect` inside a `bounds`-sized canvas and
/// resample just that part. Returns the scaled piece and its canvas offset.
fn visible_part(
    layer: &DynamicImage,
    rect: PixelRect,
    bounds: (u32, u32),
) -> Option<(DynamicImage, i64, i64)> {
    let left = rect.x.max(0);
    let top = rect.y.max(0);
    let right = rect.x.saturating_add(rect.width as i64).min(bounds.0 as i64);
    let bottom = rect.y.saturating_add(rect.height as i64).min(bounds.1 as i64);
    if right <= left || bottom <= top || layer.width() == 0 || layer.height() == 0 {
        return None;
    }

    // Visible window mapped back into source pixels.
    let sx = layer.width() as f64 / rect.width as f64;
    let sy = layer.height() as f64 / rect.height as f64;
    let offset = |edge: i64, origin: i64| edge as f64 - origin as f64;
    let src_x = ((offset(left, rect.x) * sx).floor() as u32).min(layer.width() - 1);
    let src_y = ((offset(top, rect.y) * sy).floor() as u32).min(layer.height() - 1);
    let src_right = ((offset(right, rect.x) * sx).ceil() as u32).min(layer.width());
    let src_bottom = ((offset(bottom, rect.y) * sy).ceil() as u32).min(layer.height());
    let src_w = src_right.saturating_sub(src_x).max(1);
    let src_h = src_bottom.saturating_sub(src_y).max(1);

    let piece = layer.crop_imm(src_x, src_y, src_w, src_h).resize_exact(
        (right - left) as u32,
        (bottom - top) as u32,
        FilterType::Triangle,
    );
    Some((piece, left, top))
}

/// Encode a composite as JPEG.
pub fn encode_composite(canvas: &RgbaImage) -> Result<ImageData> {
    let rgb = DynamicImage::ImageRgba8(canvas.clone()).to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, COMPOSITE_QUALITY).encode_image(&rgb)?;
    Ok(ImageData::new(out, COMPOSITE_MIME))
}

/// Build the flattened composite for a room and its placements.
///
/// The room and every placement image are decoded concurrently on the
/// blocking pool; drawing starts only after all decodes finished and then
/// runs strictly in placement order.
pub async fn build_composite(
    room: &ImageData,
    display: Size,
    placements: &[Placement],
) -> Result<ImageData> {
    let room_decode = spawn_decode(room.clone());
    let layer_decodes: Vec<_> = placements
        .iter()
        .map(|p| spawn_decode(p.image.clone()))
        .collect();

    let room_image = join_decode(room_decode).await?;
    let mut decoded = Vec::with_capacity(layer_decodes.len());
    for handle in layer_decodes {
        decoded.push(join_decode(handle).await?);
    }

    let scale = ScaleFactors::between((room_image.width(), room_image.height()), display)?;
    let layers: Vec<(DynamicImage, PixelRect)> = decoded
        .into_iter()
        .zip(placements)
        .map(|(img, p)| (img, scale_rect(p, scale)))
        .collect();

    debug!(
        width = room_image.width(),
        height = room_image.height(),
        layers = layers.len(),
        "Compositing"
    );

    tokio::task::spawn_blocking(move || encode_composite(&composite(&room_image, &layers)))
        .await
        .map_err(|e| RoomstageError::InputUnavailable(format!("Composite task failed: {}", e)))?
}

fn spawn_decode(image: ImageData) -> tokio::task::JoinHandle<Result<DynamicImage>> {
    tokio::task::spawn_blocking(move || image.decode())
}

async fn join_decode(
    handle: tokio::task::JoinHandle<Result<DynamicImage>>,
) -> Result<DynamicImage> {
    handle
        .await
        .map_err(|e| RoomstageError::InputUnavailable(format!("Decode task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::test_support::solid_png;
    use crate::placement::{Placement, PlacementId, Point};
    use image::Rgba;

    fn placement_at(id: u64, color: [u8; 4], center: Point, natural: (u32, u32)) -> Placement {
        Placement::create(
            PlacementId(id),
            solid_png(natural.0, natural.1, color),
            "block",
            center,
            Some(natural),
        )
        .unwrap()
    }

    #[test]
    fn test_scale_factors() {
        let scale = ScaleFactors::between((2000, 1000), Size::new(500.0, 250.0)).unwrap();
        assert_eq!(scale, ScaleFactors { x: 4.0, y: 4.0 });
        assert!(ScaleFactors::between((10, 10), Size::new(0.0, 10.0)).is_err());
        assert!(ScaleFactors::between((10, 10), Size::new(f64::NAN, 10.0)).is_err());
    }

    #[test]
    fn test_scale_rect() {
        // Drop at (100,100) with natural 300x200: 150x100 at (25,50)
        let p = placement_at(1, [0, 0, 0, 255], Point::new(100.0, 100.0), (300, 200));
        let rect = scale_rect(&p, ScaleFactors { x: 2.0, y: 3.0 });
        assert_eq!(
            rect,
            PixelRect {
                x: 50,
                y: 150,
                width: 300,
                height: 300
            }
        );
    }

    #[tokio::test]
    async fn test_later_placement_draws_on_top() {
        let room = solid_png(400, 400, [255, 255, 255, 255]);
        let red = placement_at(1, [255, 0, 0, 255], Point::new(100.0, 100.0), (100, 100));
        let blue = placement_at(2, [0, 0, 255, 255], Point::new(150.0, 150.0), (100, 100));

        let out = build_composite(&room, Size::new(400.0, 400.0), &[red.clone(), blue.clone()])
            .await
            .unwrap();
        assert_eq!(out.mime_type(), COMPOSITE_MIME);

        let pixels = out.decode().unwrap().to_rgb8();
        // Red covers 25..175, blue covers 75..225
        let overlap = pixels.get_pixel(120, 120);
        assert!(overlap[2] > 200 && overlap[0] < 60, "expected blue, got {:?}", overlap);
        // Red-only region
        let red_only = pixels.get_pixel(40, 40);
        assert!(red_only[0] > 200 && red_only[2] < 60, "expected red, got {:?}", red_only);

        // Swapping insertion order swaps who wins.
        let out = build_composite(&room, Size::new(400.0, 400.0), &[blue, red])
            .await
            .unwrap();
        let overlap = out.decode().unwrap().to_rgb8().get_pixel(120, 120).0;
        assert!(overlap[0] > 200 && overlap[2] < 60, "expected red, got {:?}", overlap);
    }

    #[test]
    fn test_composite_scales_to_natural_space() {
        let room = DynamicImage::ImageRgba8(RgbaImage::from_pixel(200, 100, Rgba([255; 4])));
        let product = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 255])));
        let p = placement_at(1, [0, 0, 0, 255], Point::new(0.0, 0.0), (10, 10))
            .moved_to(Point::new(10.0, 5.0))
            .with_width(20.0);

        // Displayed at half size: everything doubles.
        let scale = ScaleFactors::between((200, 100), Size::new(100.0, 50.0)).unwrap();
        let rect = scale_rect(&p, scale);
        assert_eq!((rect.x, rect.y, rect.width, rect.height), (20, 10, 40, 40));

        let canvas = composite(&room, &[(product, rect)]);
        assert_eq!(canvas.dimensions(), (200, 100));
        assert_eq!(canvas.get_pixel(20, 10).0, [0, 0, 0, 255]);
        assert_eq!(canvas.get_pixel(59, 49).0, [0, 0, 0, 255]);
        assert_eq!(canvas.get_pixel(60, 50).0, [255; 4]);
        assert_eq!(canvas.get_pixel(19, 10).0, [255; 4]);
    }

    #[test]
    fn test_oversized_layer_is_clipped_to_canvas() {
        let room = DynamicImage::ImageRgba8(RgbaImage::from_pixel(200, 100, Rgba([255; 4])));
        let product = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 255])));
        // Resized far beyond the room, as a runaway drag would leave it.
        let huge = placement_at(1, [0, 0, 0, 255], Point::new(0.0, 0.0), (10, 10))
            .moved_to(Point::new(-50.0, 40.0))
            .with_width(1.0e9);
        let rect = scale_rect(&huge, ScaleFactors { x: 1.0, y: 1.0 });
        assert!(rect.width > 1_000_000);

        let canvas = composite(&room, &[(product.clone(), rect)]);
        assert_eq!(canvas.dimensions(), (200, 100));
        assert_eq!(canvas.get_pixel(0, 40).0, [0, 0, 0, 255]);
        assert_eq!(canvas.get_pixel(199, 99).0, [0, 0, 0, 255]);
        assert_eq!(canvas.get_pixel(199, 39).0, [255; 4]);

        // Entirely off-canvas layers leave the room untouched.
        let off = PixelRect {
            x: 500,
            y: 500,
            width: 40,
            height: 40,
        };
        let canvas = composite(&room, &[(product, off)]);
        assert!(canvas.pixels().all(|p| p.0 == [255; 4]));
    }

    #[tokio::test]
    async fn test_undecodable_placement_fails() {
        let room = solid_png(50, 50, [255; 4]);
        let mut p = placement_at(1, [0, 0, 0, 255], Point::new(10.0, 10.0), (5, 5));
        p.image = ImageData::sniff(b"junk".to_vec());
        let err = build_composite(&room, Size::new(50.0, 50.0), &[p]).await.unwrap_err();
        assert!(matches!(err, RoomstageError::Image(_)));
    }
}

//! Screen capture decoding and cropping

use image::{imageops, GrayImage, ImageFormat};
use std::io::Cursor;
use tracing::debug;

use crate::error::{AdbOcrError, Result};
use crate::geometry::BoundingBox;

/// Decode raw `screencap -p` output into an 8-bit grayscale image
pub fn decode_screen(bytes: &[u8]) -> Result<GrayImage> {
    if bytes.is_empty() {
        return Err(AdbOcrError::CommandFailed(
            "screencap returned no data".to_string(),
        ));
    }

    let img = image::load_from_memory(bytes)?;
    debug!("Screen dimensions: {}x{}", img.width(), img.height());

    Ok(img.to_luma8())
}

/// The part of `area` with non-negative coordinates. Size shrinks by however
/// far the origin was moved, never below zero.
pub fn clip_area(area: &BoundingBox) -> BoundingBox {
    let x = area.x.max(0);
    let y = area.y.max(0);
    BoundingBox::new(
        x,
        y,
        area.width.saturating_sub(x - area.x).max(0),
        area.height.saturating_sub(y - area.y).max(0),
    )
}

/// Crop `image` to `area`.
///
/// The area is first clipped to non-negative coordinates, then to the image
/// bounds, so an area hanging off the screen yields a smaller (possibly
/// empty) image rather than an error.
pub fn crop_to_area(image: &GrayImage, area: &BoundingBox) -> GrayImage {
    let clipped = clip_area(area);
    imageops::crop_imm(
        image,
        clipped.x as u32,
        clipped.y as u32,
        clipped.width as u32,
        clipped.height as u32,
    )
    .to_image()
}

/// Encode a grayscale image as PNG
pub fn encode_png(image: &GrayImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    image.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)?;
    Ok(buffer)
}

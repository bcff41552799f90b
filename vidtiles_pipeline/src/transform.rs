//! Pixel-to-image conversion at the end of the selection pipeline.

use image::RgbImage;
use vidtiles_core::{CODED_ALIGNMENT, PIXEL_CHANNELS, PixelBuffer, Rectangle};

/// Rounds a dimension up to the coded multiple the decoder reconfiguration
/// contract requires.
#[must_use]
pub fn round_up_to_coded(dimension: u32) -> u32 {
	dimension.next_multiple_of(CODED_ALIGNMENT)
}

/// Converts an RGBA pixel plane into an RGB image no larger than
/// `max_width × max_height`.
///
/// Decoded planes carry coded padding on their right and bottom edges; the
/// clamp crops it away so emitted images match display dimensions.
#[must_use]
pub fn pixels_to_image(pixels: &PixelBuffer, max_width: u32, max_height: u32) -> RgbImage {
	let width = pixels.width().min(max_width);
	let height = pixels.height().min(max_height);
	let cropped = if width == pixels.width() && height == pixels.height() {
		pixels.clone()
	} else {
		pixels.crop(&Rectangle {
			id: 0,
			x: 0,
			y: 0,
			width,
			height,
		})
	};

	let mut rgb = Vec::with_capacity((width * height * 3) as usize);
	for rgba in cropped.as_raw().chunks_exact(PIXEL_CHANNELS as usize) {
		rgb.extend_from_slice(&rgba[..3]);
	}
	RgbImage::from_raw(width, height, rgb).expect("buffer length matches dimensions")
}

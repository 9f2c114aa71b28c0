//! Caption font
//!
//! DejaVu Sans Mono Bold is bundled with the crate (license in
//! `assets/DejaVu-LICENSE.txt`), so captions render the same on every host.

use ab_glyph::{FontRef, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};

use crate::OverlayError;

const FONT_DATA: &[u8] = include_bytes!("../assets/DejaVuSansMono-Bold.ttf");

/// Parse the bundled font
pub fn caption_font() -> Result<FontRef<'static>, OverlayError> {
    FontRef::try_from_slice(FONT_DATA).map_err(|e| OverlayError::Font(e.to_string()))
}

/// Pixel size of `text` at `scale`
pub fn caption_size(font: &FontRef<'_>, text: &str, scale: f32) -> (u32, u32) {
    text_size(PxScale::from(scale), font, text)
}

/// Draw `text` with its top-left corner at (`x`, `y`); clipped to the canvas
pub fn draw_caption(
    canvas: &mut RgbImage,
    font: &FontRef<'_>,
    text: &str,
    x: i32,
    y: i32,
    scale: f32,
    color: Rgb<u8>,
) {
    draw_text_mut(canvas, color, x, y, PxScale::from(scale), font, text);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_font_parses() {
        assert!(caption_font().is_ok());
    }

    #[test]
    fn test_caption_size_grows_with_text() {
        let font = caption_font().unwrap();
        let (short, height) = caption_size(&font, "ALERT", 24.0);
        let (long, _) = caption_size(&font, "DROWSY DETECTED", 24.0);
        assert!(short > 0 && height > 0);
        assert!(long > short);
    }

    #[test]
    fn test_draws_solid_glyph_pixels_and_clips() {
        let font = caption_font().unwrap();
        let red = Rgb([255, 0, 0]);
        let mut img = RgbImage::new(120, 40);
        draw_caption(&mut img, &font, "HI", 4, 4, 24.0, red);
        assert!(img.pixels().any(|p| *p == red));
        assert_eq!(*img.get_pixel(119, 39), Rgb([0, 0, 0]));

        draw_caption(&mut img, &font, "OFF THE EDGE", 100, 30, 24.0, red);
        draw_caption(&mut img, &font, "NEGATIVE", -40, -10, 24.0, red);
    }
}

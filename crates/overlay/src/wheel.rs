//! Wheel simulation
//!
//! A decorative wheel that keeps turning while the driver is alert and
//! stops once drowsiness is detected.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_circle_mut, draw_line_segment_mut};

use crate::font::{caption_font, draw_caption};
use crate::{OverlayError, ALERT_COLOR, LABEL_SCALE, NORMAL_COLOR};

/// Degrees the wheel turns per running frame
pub const WHEEL_STEP_DEGREES: u32 = 5;
/// Side length of the square wheel canvas
pub const WHEEL_CANVAS_SIZE: u32 = 400;

const WHEEL_RADIUS: i32 = 150;
const RIM_THICKNESS: i32 = 8;
const SPOKE_THICKNESS: i32 = 5;
const SPOKE_COUNT: u32 = 6;
const RIM_COLOR: Rgb<u8> = Rgb([200, 200, 200]);
const HUB_COLOR: Rgb<u8> = Rgb([100, 100, 100]);
const SPOKE_COLOR: Rgb<u8> = Rgb([50, 50, 50]);

/// Wheel angle, advanced once per frame while running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wheel {
    angle: u32,
    step: u32,
}

impl Default for Wheel {
    fn default() -> Self {
        Self {
            angle: 0,
            step: WHEEL_STEP_DEGREES,
        }
    }
}

impl Wheel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn angle(&self) -> u32 {
        self.angle
    }

    /// Advance by one step if running; the angle wraps at 360
    pub fn advance(&mut self, running: bool) -> u32 {
        if running {
            self.angle = (self.angle + self.step) % 360;
        }
        self.angle
    }

    pub fn render(&self, running: bool) -> Result<RgbImage, OverlayError> {
        render_wheel(self.angle, running)
    }
}

/// Draw the wheel at `angle` degrees with a RUNNING/STOPPED caption
pub fn render_wheel(angle: u32, running: bool) -> Result<RgbImage, OverlayError> {
    let font = caption_font()?;
    let mut canvas = RgbImage::new(WHEEL_CANVAS_SIZE, WHEEL_CANVAS_SIZE);
    let center = (WHEEL_CANVAS_SIZE as i32 / 2, WHEEL_CANVAS_SIZE as i32 / 2);
    let hub_radius = WHEEL_RADIUS / 6;

    for offset in -RIM_THICKNESS / 2..RIM_THICKNESS / 2 {
        draw_hollow_circle_mut(&mut canvas, center, WHEEL_RADIUS + offset, RIM_COLOR);
    }
    draw_filled_circle_mut(&mut canvas, center, hub_radius, HUB_COLOR);

    for i in 0..SPOKE_COUNT {
        let theta = ((angle + i * 360 / SPOKE_COUNT) as f32).to_radians();
        let (sin, cos) = theta.sin_cos();
        // Thicken by drawing parallel segments along the spoke's normal
        for offset in -(SPOKE_THICKNESS / 2)..=SPOKE_THICKNESS / 2 {
            let nx = -sin * offset as f32;
            let ny = cos * offset as f32;
            let start = (
                center.0 as f32 + hub_radius as f32 * cos + nx,
                center.1 as f32 + hub_radius as f32 * sin + ny,
            );
            let end = (
                center.0 as f32 + WHEEL_RADIUS as f32 * cos + nx,
                center.1 as f32 + WHEEL_RADIUS as f32 * sin + ny,
            );
            draw_line_segment_mut(&mut canvas, start, end, SPOKE_COLOR);
        }
    }

    let (caption, color) = if running {
        ("RUNNING", NORMAL_COLOR)
    } else {
        ("STOPPED", ALERT_COLOR)
    };
    let baseline = center.1 + WHEEL_RADIUS + 30;
    draw_caption(
        &mut canvas,
        &font,
        caption,
        center.0 - 50,
        baseline - LABEL_SCALE as i32,
        LABEL_SCALE,
        color,
    );

    Ok(canvas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn has_color(img: &RgbImage, color: Rgb<u8>, rows: std::ops::Range<u32>) -> bool {
        rows.flat_map(|y| (0..img.width()).map(move |x| (x, y)))
            .any(|(x, y)| *img.get_pixel(x, y) == color)
    }

    #[test]
    fn test_wheel_wraps_after_full_turn() {
        let mut wheel = Wheel::new();
        for _ in 0..71 {
            wheel.advance(true);
        }
        assert_eq!(wheel.angle(), 355);
        assert_eq!(wheel.advance(true), 0);
    }

    #[test]
    fn test_stopped_wheel_holds_angle() {
        let mut wheel = Wheel::new();
        wheel.advance(true);
        wheel.advance(true);
        assert_eq!(wheel.advance(false), 10);
        assert_eq!(wheel.advance(false), 10);
    }

    #[test]
    fn test_render_geometry() {
        // Spokes at 30, 90, ... leave the 0 degree rim point uncovered
        let img = render_wheel(30, true).unwrap();
        assert_eq!(img.dimensions(), (400, 400));
        assert_eq!(*img.get_pixel(200, 200), HUB_COLOR);
        assert_eq!(*img.get_pixel(350, 200), RIM_COLOR);
        assert_eq!(*img.get_pixel(0, 0), Rgb([0, 0, 0]));

        // The 90 degree spoke points straight down in image coordinates
        assert_eq!(*img.get_pixel(200, 290), SPOKE_COLOR);
    }

    #[test]
    fn test_caption_color_tracks_running_flag() {
        let running = render_wheel(0, true).unwrap();
        let stopped = render_wheel(0, false).unwrap();
        assert!(has_color(&running, NORMAL_COLOR, 360..385));
        assert!(!has_color(&running, ALERT_COLOR, 360..385));
        assert!(has_color(&stopped, ALERT_COLOR, 360..385));
    }

    proptest! {
        #[test]
        fn angle_stays_in_range(steps in prop::collection::vec(any::<bool>(), 0..500)) {
            let mut wheel = Wheel::new();
            let mut expected = 0u32;
            for running in steps {
                let angle = wheel.advance(running);
                if running {
                    expected = (expected + WHEEL_STEP_DEGREES) % 360;
                }
                prop_assert!(angle < 360);
                prop_assert_eq!(angle, expected);
            }
        }
    }
}

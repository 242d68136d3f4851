//! Status screen for boards with a display
//!
//! Pure embedded-graphics code so it renders into any `DrawTarget`; the
//! firmware passes the ST7789 driver, tests pass a framebuffer.

use core::fmt::Write;

use embedded_graphics::{
    mono_font::{ascii::FONT_10X20, MonoTextStyle},
    pixelcolor::Rgb565,
    prelude::*,
    text::{Baseline, Text},
};
use heapless::String;

use crate::sequencer::DeviceState;

/// 240 px at 10 px per glyph
pub type Line = String<24>;

const LINE_HEIGHT: i32 = 26;
const TOP_MARGIN: i32 = 16;
const LEFT_MARGIN: i32 = 10;

const BACKGROUND: Rgb565 = Rgb565::BLACK;
const TEXT: Rgb565 = Rgb565::WHITE;
const SELECTED: Rgb565 = Rgb565::YELLOW;
const RECORDING: Rgb565 = Rgb565::RED;

/// Text rows: gain, white balance, transport. The cursor marks the row the
/// keys currently adjust.
pub fn status_lines(state: &DeviceState) -> [Line; 3] {
    let marker = |row: u8| if state.cursor == row { '>' } else { ' ' };

    let mut gain = Line::new();
    let _ = write!(gain, "{} GAIN {:+4} dB", marker(0), state.gain_db);

    let mut wb = Line::new();
    let _ = write!(wb, "{} WB   {:5} K", marker(1), state.white_balance_k);

    let mut transport = Line::new();
    let _ = transport.push_str(if state.recording {
        "  * REC"
    } else {
        "    STBY"
    });

    [gain, wb, transport]
}

pub fn draw_status<D>(display: &mut D, state: &DeviceState) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb565>,
{
    display.clear(BACKGROUND)?;

    for (row, line) in status_lines(state).iter().enumerate() {
        let color = match row {
            2 if state.recording => RECORDING,
            r if r == usize::from(state.cursor) => SELECTED,
            _ => TEXT,
        };
        let origin = Point::new(LEFT_MARGIN, TOP_MARGIN + row as i32 * LINE_HEIGHT);
        Text::with_baseline(
            line.as_str(),
            origin,
            MonoTextStyle::new(&FONT_10X20, color),
            Baseline::Top,
        )
        .draw(display)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DISPLAY_HEIGHT, DISPLAY_WIDTH};
    use core::convert::Infallible;

    /// Framebuffer that tolerates overdraw
    struct Framebuffer {
        pixels: std::vec::Vec<Rgb565>,
    }

    impl Framebuffer {
        fn new() -> Self {
            Self {
                pixels: vec![Rgb565::GREEN; (DISPLAY_WIDTH * DISPLAY_HEIGHT) as usize],
            }
        }

        fn count(&self, color: Rgb565) -> usize {
            self.pixels.iter().filter(|&&p| p == color).count()
        }
    }

    impl DrawTarget for Framebuffer {
        type Color = Rgb565;
        type Error = Infallible;

        fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
        where
            I: IntoIterator<Item = Pixel<Self::Color>>,
        {
            for Pixel(p, color) in pixels {
                if p.x >= 0
                    && p.y >= 0
                    && (p.x as u32) < DISPLAY_WIDTH
                    && (p.y as u32) < DISPLAY_HEIGHT
                {
                    self.pixels[(p.y as u32 * DISPLAY_WIDTH + p.x as u32) as usize] = color;
                }
            }
            Ok(())
        }
    }

    impl OriginDimensions for Framebuffer {
        fn size(&self) -> Size {
            Size::new(DISPLAY_WIDTH, DISPLAY_HEIGHT)
        }
    }

    #[test]
    fn lines_show_values_and_cursor() {
        let state = DeviceState {
            gain_db: -6,
            white_balance_k: 5600,
            cursor: 1,
            ..DeviceState::default()
        };
        let [gain, wb, transport] = status_lines(&state);
        assert_eq!(gain.as_str(), "  GAIN   -6 dB");
        assert_eq!(wb.as_str(), "> WB    5600 K");
        assert_eq!(transport.as_str(), "    STBY");
    }

    #[test]
    fn widest_values_fit_a_line() {
        let state = DeviceState {
            gain_db: -12,
            white_balance_k: 9900,
            recording: true,
            ..DeviceState::default()
        };
        for line in status_lines(&state) {
            assert!(line.len() * 10 <= DISPLAY_WIDTH as usize);
        }
    }

    #[test]
    fn draw_clears_and_highlights() {
        let mut fb = Framebuffer::new();
        let state = DeviceState {
            recording: true,
            ..DeviceState::default()
        };
        draw_status(&mut fb, &state).unwrap();
        assert_eq!(fb.count(Rgb565::GREEN), 0);
        assert!(fb.count(SELECTED) > 0);
        assert!(fb.count(TEXT) > 0);
        assert!(fb.count(RECORDING) > 0);
    }
}

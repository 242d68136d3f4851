//! Driver for the ST7789 status display
//!
//! A 240x135 panel on SPI1, written with raw controller commands and exposed
//! to embedded-graphics as a `DrawTarget`. The display task redraws the status
//! screen every time the control loop signals new state.

use embassy_rp::gpio::Output;
use embassy_rp::peripherals;
use embassy_rp::spi::{Blocking, Spi};
use embassy_time::{Duration, Timer};
use embedded_graphics::pixelcolor::raw::{RawData, RawU16};
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PointsIter, Rectangle};
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiDevice;
use embedded_hal_bus::spi::{ExclusiveDevice, NoDelay};

use crate::channels::DISPLAY_SIGNAL;
use crate::config::*;
use crate::view;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum DisplayError {
    Spi,
    Pin,
}

pub type DisplaySpi = ExclusiveDevice<Spi<'static, peripherals::SPI1, Blocking>, Output<'static>, NoDelay>;
pub type Panel = St7789<DisplaySpi, Output<'static>, Output<'static>>;

// ===================================================================
// Display Controller Structure
// ===================================================================

pub struct St7789<SPI, DC, RST> {
    spi: SPI,
    dc: DC,
    rst: RST,
}

impl<SPI, DC, RST> St7789<SPI, DC, RST>
where
    SPI: SpiDevice,
    DC: OutputPin,
    RST: OutputPin,
{
    pub fn new(spi: SPI, dc: DC, rst: RST) -> Self {
        Self { spi, dc, rst }
    }

    /// Hardware reset and controller bring-up, landscape RGB565
    pub async fn init(&mut self) -> Result<(), DisplayError> {
        info!("Initializing ST7789 ({}x{})", DISPLAY_WIDTH, DISPLAY_HEIGHT);

        self.rst.set_low().map_err(|_| DisplayError::Pin)?;
        Timer::after(Duration::from_millis(10)).await;
        self.rst.set_high().map_err(|_| DisplayError::Pin)?;
        Timer::after(Duration::from_millis(120)).await;

        self.command(ST7789_SWRESET, &[])?;
        Timer::after(Duration::from_millis(150)).await;

        self.command(ST7789_SLPOUT, &[])?;
        Timer::after(Duration::from_millis(120)).await;

        self.command(ST7789_MADCTL, &[ST7789_MADCTL_LANDSCAPE])?;
        self.command(ST7789_COLMOD, &[ST7789_COLOR_MODE_16BIT])?;

        // IPS panel needs inversion for true colors
        self.command(ST7789_INVON, &[])?;
        self.command(ST7789_NORON, &[])?;
        self.command(ST7789_DISPON, &[])?;
        Timer::after(Duration::from_millis(10)).await;

        info!("ST7789 ready");
        Ok(())
    }

    fn command(&mut self, command: u8, params: &[u8]) -> Result<(), DisplayError> {
        self.dc.set_low().map_err(|_| DisplayError::Pin)?;
        self.spi.write(&[command]).map_err(|_| DisplayError::Spi)?;
        if !params.is_empty() {
            self.data(params)?;
        }
        Ok(())
    }

    fn data(&mut self, data: &[u8]) -> Result<(), DisplayError> {
        self.dc.set_high().map_err(|_| DisplayError::Pin)?;
        self.spi.write(data).map_err(|_| DisplayError::Spi)
    }

    /// Address an inclusive window in panel coordinates and start a memory write
    fn set_window(&mut self, x_start: u16, y_start: u16, x_end: u16, y_end: u16) -> Result<(), DisplayError> {
        let (xs, xe) = (x_start + DISPLAY_X_OFFSET, x_end + DISPLAY_X_OFFSET);
        let (ys, ye) = (y_start + DISPLAY_Y_OFFSET, y_end + DISPLAY_Y_OFFSET);

        self.command(ST7789_CASET, &[(xs >> 8) as u8, xs as u8, (xe >> 8) as u8, xe as u8])?;
        self.command(ST7789_RASET, &[(ys >> 8) as u8, ys as u8, (ye >> 8) as u8, ye as u8])?;
        self.command(ST7789_RAMWR, &[])
    }

    /// Stream colors into the current window in small batches
    fn write_pixels(&mut self, colors: impl IntoIterator<Item = Rgb565>) -> Result<(), DisplayError> {
        self.dc.set_high().map_err(|_| DisplayError::Pin)?;
        let mut buffer = [0u8; 128];
        let mut len = 0;
        for color in colors {
            let raw = RawU16::from(color).into_inner().to_be_bytes();
            buffer[len..len + 2].copy_from_slice(&raw);
            len += 2;
            if len == buffer.len() {
                self.spi.write(&buffer).map_err(|_| DisplayError::Spi)?;
                len = 0;
            }
        }
        if len > 0 {
            self.spi.write(&buffer[..len]).map_err(|_| DisplayError::Spi)?;
        }
        Ok(())
    }
}

impl<SPI, DC, RST> OriginDimensions for St7789<SPI, DC, RST> {
    fn size(&self) -> Size {
        Size::new(DISPLAY_WIDTH, DISPLAY_HEIGHT)
    }
}

impl<SPI, DC, RST> DrawTarget for St7789<SPI, DC, RST>
where
    SPI: SpiDevice,
    DC: OutputPin,
    RST: OutputPin,
{
    type Color = Rgb565;
    type Error = DisplayError;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let bounds = self.bounding_box();
        for Pixel(point, color) in pixels {
            if !bounds.contains(point) {
                continue;
            }
            let (x, y) = (point.x as u16, point.y as u16);
            self.set_window(x, y, x, y)?;
            self.write_pixels([color])?;
        }
        Ok(())
    }

    fn fill_contiguous<I>(&mut self, area: &Rectangle, colors: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Self::Color>,
    {
        let visible = area.intersection(&self.bounding_box());
        let Some(bottom_right) = visible.bottom_right() else {
            return Ok(());
        };
        if visible != *area {
            // partially off screen, fall back to per-pixel clipping
            return self.draw_iter(area.points().zip(colors).map(|(p, c)| Pixel(p, c)));
        }
        self.set_window(
            visible.top_left.x as u16,
            visible.top_left.y as u16,
            bottom_right.x as u16,
            bottom_right.y as u16,
        )?;
        self.write_pixels(colors.into_iter().take(visible.size.width as usize * visible.size.height as usize))
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let visible = area.intersection(&self.bounding_box());
        let count = visible.size.width as usize * visible.size.height as usize;
        self.fill_contiguous(&visible, core::iter::repeat(color).take(count))
    }
}

// ===================================================================
// Display Task Implementation
// ===================================================================

#[embassy_executor::task]
pub async fn display_task(mut panel: Panel, mut backlight: Output<'static>) {
    info!("Display task started");

    if let Err(e) = panel.init().await {
        error!("Display init failed: {}", e);
        return;
    }
    backlight.set_high();

    let mut state = DISPLAY_SIGNAL.wait().await;
    loop {
        if let Err(e) = view::draw_status(&mut panel, &state) {
            warn!("Display redraw failed: {}", e);
        }
        state = DISPLAY_SIGNAL.wait().await;
    }
}

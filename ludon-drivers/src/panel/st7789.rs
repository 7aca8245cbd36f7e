//! ST7789 driver core
//!
//! Mostly used for setup and the menu-drawing primitives; the scanline
//! path opens a frame here and then streams pixel data via DMA. Pixel
//! traffic is serialized big-endian over a fixed 8-bit SPI format, so the
//! DMA byte stream and these blocking writes produce identical wire bytes.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;

use super::font::glyph;

/// ST7789 commands
#[allow(dead_code)]
mod cmd {
    pub const SWRESET: u8 = 0x01;
    pub const SLPOUT: u8 = 0x11;
    pub const NORON: u8 = 0x13;
    pub const INVON: u8 = 0x21;
    pub const DISPON: u8 = 0x29;
    pub const CASET: u8 = 0x2A;
    pub const RASET: u8 = 0x2B;
    pub const RAMWR: u8 = 0x2C;
    pub const MADCTL: u8 = 0x36;
    pub const COLMOD: u8 = 0x3A;
}

/// MADCTL bits
const MADCTL_MY: u8 = 0x80;
const MADCTL_MX: u8 = 0x40;
const MADCTL_MV: u8 = 0x20;
const MADCTL_RGB: u8 = 0x00;

/// COLMOD value for 65K colours, 16 bits per pixel
const COLMOD_16BPP: u8 = 0x55;

/// Errors from the panel transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PanelError<S, P> {
    /// SPI bus error
    Spi(S),
    /// Control line error
    Pin(P),
}

/// ST7789 panel driver.
///
/// Owns the SPI bus and the three control lines plus backlight. The
/// chip-select is asserted around every command and left asserted after
/// [`begin_ram_write`](Self::begin_ram_write) so a DMA engine can keep
/// streaming pixel bytes; the next command re-frames the bus.
pub struct St7789<SPI, DC, CS, RST, BL> {
    spi: SPI,
    dc: DC,
    cs: CS,
    rst: RST,
    backlight: BL,
    width: u16,
    height: u16,
    x_start: u16,
    y_start: u16,
}

impl<SPI, DC, CS, RST, BL, PinE> St7789<SPI, DC, CS, RST, BL>
where
    SPI: SpiBus<u8>,
    DC: OutputPin<Error = PinE>,
    CS: OutputPin<Error = PinE>,
    RST: OutputPin<Error = PinE>,
    BL: OutputPin<Error = PinE>,
{
    pub fn new(spi: SPI, dc: DC, cs: CS, rst: RST, backlight: BL, width: u16, height: u16) -> Self {
        Self {
            spi,
            dc,
            cs,
            rst,
            backlight,
            width,
            height,
            x_start: 0,
            y_start: 0,
        }
    }

    /// Hardware reset and init sequence, leaving the display on
    pub fn init(&mut self, delay: &mut impl DelayNs) -> Result<(), PanelError<SPI::Error, PinE>> {
        self.cs.set_high().map_err(PanelError::Pin)?;
        self.dc.set_high().map_err(PanelError::Pin)?;

        self.rst.set_low().map_err(PanelError::Pin)?;
        delay.delay_ms(150);
        self.rst.set_high().map_err(PanelError::Pin)?;
        delay.delay_ms(100);

        self.command(cmd::SWRESET, &[])?;
        delay.delay_ms(150);

        self.command(cmd::SLPOUT, &[])?;
        delay.delay_ms(10);

        self.set_rotation(1)?;

        self.command(cmd::COLMOD, &[COLMOD_16BPP])?;
        delay.delay_ms(10);

        self.set_address_window(0, 0, self.width, self.height)?;

        // The panel ships inverted; INVON gives true colours.
        self.command(cmd::INVON, &[])?;
        delay.delay_ms(10);
        self.command(cmd::NORON, &[])?;
        delay.delay_ms(10);
        self.command(cmd::DISPON, &[])?;
        delay.delay_ms(10);

        Ok(())
    }

    pub fn backlight(&mut self, on: bool) -> Result<(), PanelError<SPI::Error, PinE>> {
        if on {
            self.backlight.set_high().map_err(PanelError::Pin)
        } else {
            self.backlight.set_low().map_err(PanelError::Pin)
        }
    }

    /// Send one command with its parameter bytes
    pub fn command(&mut self, cmd: u8, params: &[u8]) -> Result<(), PanelError<SPI::Error, PinE>> {
        self.cs.set_low().map_err(PanelError::Pin)?;
        self.dc.set_low().map_err(PanelError::Pin)?;
        self.spi.write(&[cmd]).map_err(PanelError::Spi)?;
        if !params.is_empty() {
            self.dc.set_high().map_err(PanelError::Pin)?;
            self.spi.write(params).map_err(PanelError::Spi)?;
        }
        self.spi.flush().map_err(PanelError::Spi)?;
        self.cs.set_high().map_err(PanelError::Pin)?;
        self.dc.set_high().map_err(PanelError::Pin)
    }

    /// Set the memory access order and the rotation's window offsets
    pub fn set_rotation(&mut self, rotation: u8) -> Result<(), PanelError<SPI::Error, PinE>> {
        let madctl = match rotation & 0x03 {
            0 => {
                self.x_start = 0;
                self.y_start = 80;
                MADCTL_MX | MADCTL_MY | MADCTL_RGB
            }
            1 => {
                // Ribbon cable on the left side of the display
                self.x_start = 80;
                self.y_start = 0;
                MADCTL_MY | MADCTL_MV | MADCTL_RGB
            }
            2 => {
                self.x_start = 0;
                self.y_start = 0;
                MADCTL_RGB
            }
            _ => {
                self.x_start = 0;
                self.y_start = 0;
                MADCTL_MX | MADCTL_MV | MADCTL_RGB
            }
        };
        self.command(cmd::MADCTL, &[madctl])
    }

    /// Address a `w` x `h` window at `(x, y)` for the next RAM write
    pub fn set_address_window(
        &mut self,
        x: u16,
        y: u16,
        w: u16,
        h: u16,
    ) -> Result<(), PanelError<SPI::Error, PinE>> {
        let xs = x + self.x_start;
        let ys = y + self.y_start;
        let xe = xs + (w - 1);
        let ye = ys + (h - 1);

        let cols = [(xs >> 8) as u8, xs as u8, (xe >> 8) as u8, xe as u8];
        self.command(cmd::CASET, &cols)?;
        let rows = [(ys >> 8) as u8, ys as u8, (ye >> 8) as u8, ye as u8];
        self.command(cmd::RASET, &rows)
    }

    /// Enter RAM-write mode.
    ///
    /// Chip-select stays asserted and DC stays in data mode on return;
    /// everything written to the bus next is pixel data.
    pub fn begin_ram_write(&mut self) -> Result<(), PanelError<SPI::Error, PinE>> {
        self.cs.set_low().map_err(PanelError::Pin)?;
        self.dc.set_low().map_err(PanelError::Pin)?;
        self.spi.write(&[cmd::RAMWR]).map_err(PanelError::Spi)?;
        self.spi.flush().map_err(PanelError::Spi)?;
        self.dc.set_high().map_err(PanelError::Pin)
    }

    /// Blocking pixel write, big-endian on the wire
    pub fn write_pixels(&mut self, pixels: &[u16]) -> Result<(), PanelError<SPI::Error, PinE>> {
        for &px in pixels {
            self.spi.write(&px.to_be_bytes()).map_err(PanelError::Spi)?;
        }
        Ok(())
    }

    /// Fill the entire display with one colour
    pub fn fill(&mut self, colour: u16) -> Result<(), PanelError<SPI::Error, PinE>> {
        self.fill_rect(0, 0, self.width, self.height, colour)
    }

    /// Fill a rectangle with one colour
    pub fn fill_rect(
        &mut self,
        x: u16,
        y: u16,
        w: u16,
        h: u16,
        colour: u16,
    ) -> Result<(), PanelError<SPI::Error, PinE>> {
        self.set_address_window(x, y, w, h)?;
        self.begin_ram_write()?;
        let bytes = colour.to_be_bytes();
        for _ in 0..(w as u32 * h as u32) {
            self.spi.write(&bytes).map_err(PanelError::Spi)?;
        }
        self.spi.flush().map_err(PanelError::Spi)
    }

    /// Copy a pixel buffer to a window
    pub fn blit(
        &mut self,
        pixels: &[u16],
        x: u16,
        y: u16,
        w: u16,
        h: u16,
    ) -> Result<(), PanelError<SPI::Error, PinE>> {
        self.set_address_window(x, y, w, h)?;
        self.begin_ram_write()?;
        self.write_pixels(pixels)?;
        self.spi.flush().map_err(PanelError::Spi)
    }

    /// Draw a text string with the 8x8 font, clipped at the right edge
    pub fn text(
        &mut self,
        s: &str,
        mut x: u16,
        y: u16,
        colour: u16,
        bg: u16,
    ) -> Result<(), PanelError<SPI::Error, PinE>> {
        let mut cell = [0u16; 64];
        for c in s.chars() {
            if x + 8 > self.width {
                break;
            }
            let rows = glyph(c);
            for (gy, &row_bits) in rows.iter().enumerate() {
                for gx in 0..8 {
                    cell[gy * 8 + gx] = if row_bits & (0x80 >> gx) != 0 { colour } else { bg };
                }
            }
            self.blit(&cell, x, y, 8, 8)?;
            x += 8;
        }
        Ok(())
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;

    /// Records every byte written, tagged command/data by the DC level
    #[derive(Default)]
    struct BusLog {
        dc_high: bool,
        commands: heapless::Vec<u8, 256>,
        data: heapless::Vec<u8, 8192>,
    }

    struct SpiLog<'a>(&'a core::cell::RefCell<BusLog>);
    struct DcPin<'a>(&'a core::cell::RefCell<BusLog>);
    struct NullPin;
    struct NoDelay;

    impl embedded_hal::spi::ErrorType for SpiLog<'_> {
        type Error = Infallible;
    }

    impl SpiBus<u8> for SpiLog<'_> {
        fn read(&mut self, words: &mut [u8]) -> Result<(), Infallible> {
            words.fill(0);
            Ok(())
        }
        fn write(&mut self, words: &[u8]) -> Result<(), Infallible> {
            let mut log = self.0.borrow_mut();
            if log.dc_high {
                log.data.extend_from_slice(words).unwrap();
            } else {
                log.commands.extend_from_slice(words).unwrap();
            }
            Ok(())
        }
        fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Infallible> {
            read.fill(0);
            self.write(write)
        }
        fn transfer_in_place(&mut self, _words: &mut [u8]) -> Result<(), Infallible> {
            Ok(())
        }
        fn flush(&mut self) -> Result<(), Infallible> {
            Ok(())
        }
    }

    impl embedded_hal::digital::ErrorType for DcPin<'_> {
        type Error = Infallible;
    }

    impl OutputPin for DcPin<'_> {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.0.borrow_mut().dc_high = false;
            Ok(())
        }
        fn set_high(&mut self) -> Result<(), Infallible> {
            self.0.borrow_mut().dc_high = true;
            Ok(())
        }
    }

    impl embedded_hal::digital::ErrorType for NullPin {
        type Error = Infallible;
    }

    impl OutputPin for NullPin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            Ok(())
        }
        fn set_high(&mut self) -> Result<(), Infallible> {
            Ok(())
        }
    }

    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    fn panel(
        log: &core::cell::RefCell<BusLog>,
    ) -> St7789<SpiLog<'_>, DcPin<'_>, NullPin, NullPin, NullPin> {
        St7789::new(SpiLog(log), DcPin(log), NullPin, NullPin, NullPin, 240, 240)
    }

    #[test]
    fn init_issues_the_wake_up_sequence() {
        let log = core::cell::RefCell::new(BusLog::default());
        panel(&log).init(&mut NoDelay).unwrap();

        let commands = log.borrow().commands.clone();
        assert_eq!(commands[0], cmd::SWRESET);
        assert_eq!(commands[1], cmd::SLPOUT);
        assert_eq!(*commands.last().unwrap(), cmd::DISPON);
        assert!(commands.contains(&cmd::COLMOD));
        assert!(commands.contains(&cmd::INVON));
    }

    #[test]
    fn rotation_offsets_shift_the_window() {
        let log = core::cell::RefCell::new(BusLog::default());
        let mut panel = panel(&log);
        panel.set_rotation(1).unwrap();
        log.borrow_mut().data.clear();

        panel.set_address_window(0, 0, 240, 240).unwrap();

        // Rotation 1 starts 80 columns in on the 320-line axis.
        let data = log.borrow().data.clone();
        assert_eq!(&data[..4], &[0, 80, (319u16 >> 8) as u8, (319 & 0xFF) as u8]);
        assert_eq!(&data[4..8], &[0, 0, 0, 239]);
    }

    #[test]
    fn fill_rect_streams_every_pixel() {
        let log = core::cell::RefCell::new(BusLog::default());
        panel(&log).fill_rect(0, 0, 8, 4, 0xF800).unwrap();

        let log = log.borrow();
        // CASET + RASET params (8 bytes) precede the pixel data.
        assert_eq!(log.data.len(), 8 + 8 * 4 * 2);
        assert_eq!(&log.data[8..10], &[0xF8, 0x00]);
        assert_eq!(*log.commands.last().unwrap(), cmd::RAMWR);
    }

    #[test]
    fn text_renders_glyph_rows() {
        let log = core::cell::RefCell::new(BusLog::default());
        panel(&log).text("I", 0, 0, 0xFFFF, 0x0000).unwrap();

        let log = log.borrow();
        let pixels = &log.data[8..];
        // 'I' top row is 0b00111100.
        assert_eq!(&pixels[..8], &[0, 0, 0, 0, 0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(pixels.len(), 64 * 2);
    }

    #[test]
    fn text_clips_at_the_right_edge() {
        let log = core::cell::RefCell::new(BusLog::default());
        panel(&log)
            .text("ABCDEFGHIJKLMNOPQRSTUVWXYZABCDEFGH", 0, 0, 0xFFFF, 0)
            .unwrap();

        // 240 / 8 = 30 glyph cells fit; the rest are clipped.
        let log = log.borrow();
        let ramwr = log.commands.iter().filter(|&&c| c == cmd::RAMWR).count();
        assert_eq!(ramwr, 30);
    }
}

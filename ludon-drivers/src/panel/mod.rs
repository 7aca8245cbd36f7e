//! ST7789 LCD panel driver
//!
//! Command/control layer for the SPI panel: init sequence, rotation,
//! window addressing and the blocking drawing primitives the ROM selector
//! consumes (fill, rectangles, text). The scanline streaming path only
//! uses this layer to open a frame; pixel data then flows via DMA.

mod font;
mod st7789;

pub use st7789::{PanelError, St7789};

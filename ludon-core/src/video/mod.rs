//! Display scanline engine
//!
//! Renders one panel line at a time into a pair of line buffers and
//! alternates two DMA channels to push each finished line to the panel
//! while the next is being built.
//!
//! - [`palette`]: the 3x4 colour table and raw-pixel lookup
//! - [`line`]: palette mapping plus horizontal scaling/offset
//! - [`machine`]: the WaitFrame/StartFrame/RenderRow/WaitDma stepper

pub mod line;
pub mod machine;
pub mod palette;

pub use line::{render_line, LineBuffer, Scaling};
pub use machine::{Action, RenderState, ScanlineMachine, TransferPool};
pub use palette::Palette;

/// Source row width in pixels (the producer's native resolution)
pub const SOURCE_WIDTH: usize = 160;

/// Panel line width in pixels
pub const PANEL_WIDTH: usize = 240;

/// Panel height in lines
pub const PANEL_HEIGHT: usize = 240;

/// Horizontal margin centring an unscaled source row on the panel
pub const H_MARGIN: usize = (PANEL_WIDTH - SOURCE_WIDTH) / 2;

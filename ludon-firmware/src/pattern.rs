//! Bring-up producers
//!
//! Deterministic stand-ins for the emulator core, exercising the same
//! producer interfaces it would: one indexed pixel row plus palette per
//! scanline, one interleaved stereo PCM block per frame.

use ludon_core::video::{Palette, SOURCE_WIDTH};

use crate::config::SAMPLE_RATE_HZ;
use crate::dispatch;

/// Source rows per frame (the producer's native height)
pub const SOURCE_HEIGHT: usize = 144;

/// DMG-style green shades, identical across the three groups
const PALETTE: Palette = Palette([[0x9772, 0x6BCD, 0x4A89, 0x2965]; 3]);

/// Scrolling checkerboard over the four shades
pub struct TestPattern {
    frame: u32,
}

impl TestPattern {
    pub const fn new() -> Self {
        Self { frame: 0 }
    }

    /// Render and submit one full frame of rows, then raise the frame
    /// flag, exactly as the emulator's per-scanline callback would
    pub fn emit_frame(&mut self) {
        let mut row = [0u8; SOURCE_WIDTH];
        for y in 0..SOURCE_HEIGHT {
            self.render_row(y, &mut row);
            dispatch::submit_line(&row, &PALETTE, y as u8);
        }
        dispatch::frame_ready();
        self.frame = self.frame.wrapping_add(1);
    }

    fn render_row(&self, y: usize, row: &mut [u8; SOURCE_WIDTH]) {
        let scroll = (self.frame / 2) as usize;
        for (x, pixel) in row.iter_mut().enumerate() {
            let shade = (((x + scroll) / 8) + (y / 8)) & 0x03;
            // Background group selector in bits 4-5
            *pixel = shade as u8 | 0x20;
        }
    }
}

/// 440 Hz triangle wave, both channels
pub struct ToneGen {
    phase: u32,
}

impl ToneGen {
    const PERIOD: u32 = SAMPLE_RATE_HZ / 440;

    pub const fn new() -> Self {
        Self { phase: 0 }
    }

    /// Fill an interleaved stereo block, continuing from the previous
    /// call's phase
    pub fn render(&mut self, out: &mut [u16]) {
        for pair in out.chunks_exact_mut(2) {
            self.phase = (self.phase + 1) % Self::PERIOD;
            let ramp = if self.phase < Self::PERIOD / 2 {
                self.phase
            } else {
                Self::PERIOD - self.phase
            };
            let level = (ramp * 2 * 0xFFFF / Self::PERIOD) as u16;
            pair[0] = level;
            pair[1] = level;
        }
    }
}

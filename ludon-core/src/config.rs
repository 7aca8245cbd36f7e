//! Configuration type definitions
//!
//! These types parameterize the output engines. The firmware compiles its
//! values in; host tools and tests construct them directly.

use crate::video::Scaling;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Audio pipeline configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AudioConfig {
    /// Nominal playback rate in Hz; the source is never resampled
    pub sample_rate_hz: u32,
    /// Initial volume in 8.8 fixed point (256 = 1.0)
    pub volume: u16,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 44_100,
            volume: 256,
        }
    }
}

/// Video pipeline configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VideoConfig {
    /// Horizontal scaling applied when a source row is rendered
    pub scaling: Scaling,
    /// Number of panel lines streamed per frame
    pub panel_height: u16,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            scaling: Scaling::OneAndHalf,
            panel_height: crate::video::PANEL_HEIGHT as u16,
        }
    }
}

//! Board-agnostic output engines for the Ludon handheld firmware
//!
//! This crate contains all streaming logic that does not depend on
//! specific hardware implementations:
//!
//! - Audio double-buffer engine (PCM mixing, sample accounting, refill flags)
//! - Display scanline state machine (palette mapping, scaling, channel pool)
//! - Cross-core command codec and busy gate
//! - Configuration type definitions
//!
//! The firmware crate binds these to real DMA channels, the PWM slice and
//! the panel SPI bus; everything here runs on the host for testing.

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod audio;
pub mod config;
pub mod dispatch;
pub mod video;

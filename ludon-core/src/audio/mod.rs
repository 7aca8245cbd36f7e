//! Audio double-buffer engine
//!
//! Streams 8-bit PWM duty levels to the speaker through a pair of chained
//! DMA channels: one block plays while the other is refilled. The split
//! mirrors the execution contexts involved:
//!
//! - [`mixer`]: pure PCM-to-duty arithmetic and sample accounting
//! - [`flags`]: the atomic flag block shared with the completion interrupt
//! - [`engine`]: the session state and block ownership, driven from the
//!   main loop once per emulated frame

pub mod engine;
pub mod flags;
pub mod mixer;

pub use engine::{ArmPlan, AudioEngine, Refill, SampleBlock};
pub use flags::{ChannelFlags, CompletionAction, BLOCK_COUNT};
pub use mixer::{FillOutcome, SampleCounter, BLOCK_CAPACITY, PWM_LEVEL_IDLE, PWM_LEVEL_MAX};

//! Flag block shared between the DMA completion interrupt and the main loop
//!
//! The interrupt handler must not touch buffers or block; it only decides
//! between re-arming its channel and stopping playback, and records refill
//! work for [`service`](crate::audio::AudioEngine::service) to pick up
//! outside interrupt context. All accesses are sequentially consistent so
//! an update made in one context is promptly visible in the other.

use portable_atomic::{AtomicBool, Ordering};

/// Number of ping-pong sample blocks (and DMA channels)
pub const BLOCK_COUNT: usize = 2;

const ORDER: Ordering = Ordering::SeqCst;

/// What the completion interrupt must do with its channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CompletionAction {
    /// Rewind the channel's read address to its own block; the block will
    /// be refilled from the main loop
    Rearm,
    /// Playback is over: silence the output and abort the *other* channel
    /// immediately
    HardStop,
}

/// The cross-context audio flags.
///
/// Lives in a `static` so both the interrupt handler and the engine can
/// reach it; the engine holds a reference.
pub struct ChannelFlags {
    refill: [AtomicBool; BLOCK_COUNT],
    terminate: [AtomicBool; BLOCK_COUNT],
    playing: AtomicBool,
}

impl ChannelFlags {
    pub const fn new() -> Self {
        Self {
            refill: [AtomicBool::new(false), AtomicBool::new(false)],
            terminate: [AtomicBool::new(false), AtomicBool::new(false)],
            playing: AtomicBool::new(false),
        }
    }

    /// Clear every flag; called when a session starts or stops
    pub fn reset(&self) {
        for block in 0..BLOCK_COUNT {
            self.refill[block].store(false, ORDER);
            self.terminate[block].store(false, ORDER);
        }
    }

    /// The completion decision, taken in interrupt context.
    ///
    /// A pending termination request consumes itself and clears the playing
    /// flag; otherwise the block is marked as needing a refill.
    pub fn on_block_complete(&self, block: usize) -> CompletionAction {
        if self.terminate[block].swap(false, ORDER) {
            self.playing.store(false, ORDER);
            CompletionAction::HardStop
        } else {
            self.refill[block].store(true, ORDER);
            CompletionAction::Rearm
        }
    }

    /// Consume a pending refill request for `block`
    pub fn take_refill(&self, block: usize) -> bool {
        self.refill[block].swap(false, ORDER)
    }

    /// Request that `block`'s *next* completion stops playback.
    ///
    /// Set one cycle ahead of the short block being consumed, because the
    /// decision is made from non-interrupt context.
    pub fn request_terminate(&self, block: usize) {
        self.terminate[block].store(true, ORDER);
    }

    pub fn set_playing(&self) {
        self.playing.store(true, ORDER);
    }

    pub fn clear_playing(&self) {
        self.playing.store(false, ORDER);
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(ORDER)
    }
}

impl Default for ChannelFlags {
    fn default() -> Self {
        Self::new()
    }
}

//! Playback session and block ownership
//!
//! The engine owns the two DMA-sourced sample blocks and the session
//! counters. Hardware operations (arming channels, rewinding read
//! addresses, aborting) stay in the firmware crate; the engine hands back
//! small plans describing what the hardware layer must apply.
//!
//! Block ownership alternates strictly: while one block feeds the DMA
//! engine, only the other may be written. The flag block enforces the
//! hand-over, so refills here never race the interrupt handler.

use crate::config::AudioConfig;

use super::flags::{ChannelFlags, BLOCK_COUNT};
use super::mixer::{mix_block, FillOutcome, SampleCounter, BLOCK_CAPACITY};

/// One DMA-sourced block of PWM duty levels.
///
/// Each level occupies a 32-bit word because the transfer destination is
/// the PWM counter-compare register. Alignment matches the block size in
/// samples, as the DMA engine requires for wrapped reads.
#[repr(align(1024))]
pub struct SampleBlock([u32; BLOCK_CAPACITY]);

impl SampleBlock {
    const fn new() -> Self {
        Self([0; BLOCK_CAPACITY])
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }
}

/// Initial transfer counts for the chained channel pair, one per block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ArmPlan {
    pub transfer_counts: [u32; BLOCK_COUNT],
}

/// Outcome of one refill performed by [`AudioEngine::service`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Refill {
    /// `Some(n)` when the block was the session's final partial block:
    /// the channel's transfer count must shrink to `n` before its next
    /// retrigger so the DMA engine never reads stale samples
    pub transfer_count: Option<u32>,
}

/// The audio double-buffer engine.
///
/// Driven from the main loop; shares only the atomic flag block with the
/// completion interrupt. Pre-emption is the caller's policy: a new session
/// at lower or equal [`priority`](Self::priority) should be ignored, a
/// higher one should [`stop`](Self::stop) the current session first.
pub struct AudioEngine<'f> {
    blocks: [SampleBlock; BLOCK_COUNT],
    counter: SampleCounter,
    volume: u16,
    priority: u8,
    flags: &'f ChannelFlags,
}

impl<'f> AudioEngine<'f> {
    pub fn new(flags: &'f ChannelFlags, config: AudioConfig) -> Self {
        Self {
            blocks: [SampleBlock::new(), SampleBlock::new()],
            counter: SampleCounter::new(),
            volume: config.volume,
            priority: 0,
            flags,
        }
    }

    /// Begin a session of `total` samples read from `src`.
    ///
    /// Primes both blocks synchronously and returns the transfer counts to
    /// arm the chained channel pair with. Starting over a live session is a
    /// caller bug (the channels would be reconfigured mid-transfer).
    pub fn start(&mut self, src: &[u16], total: u32, priority: u8) -> ArmPlan {
        debug_assert!(!self.flags.is_playing(), "start() over a live session");

        self.counter.reset(total);
        self.priority = priority;

        let first = self.fill(0, src);
        let second = self.fill(1, src);

        self.flags.reset();
        self.flags.set_playing();

        ArmPlan {
            transfer_counts: [first.loaded, second.loaded],
        }
    }

    /// Refill any block whose completion interrupt has fired since the
    /// last call. Called once per emulated frame, outside interrupt
    /// context.
    ///
    /// A refill that hits the session's final partial block converts into
    /// a termination request for that channel's next completion.
    pub fn service(&mut self, src: &[u16]) -> [Option<Refill>; BLOCK_COUNT] {
        let mut serviced = [None; BLOCK_COUNT];

        if !self.flags.is_playing() {
            return serviced;
        }

        for block in 0..BLOCK_COUNT {
            if self.flags.take_refill(block) {
                let outcome = self.fill(block, src);
                let transfer_count = if outcome.last_block {
                    self.flags.request_terminate(block);
                    Some(outcome.loaded)
                } else {
                    None
                };
                serviced[block] = Some(Refill { transfer_count });
            }
        }

        serviced
    }

    /// Stop playback now.
    ///
    /// Returns true when a session was live; the hardware layer must then
    /// abort both channels and silence the output. No drain, no fade.
    pub fn stop(&mut self) -> bool {
        if !self.flags.is_playing() {
            return false;
        }
        self.flags.clear_playing();
        self.flags.reset();
        true
    }

    fn fill(&mut self, block: usize, src: &[u16]) -> FillOutcome {
        let outcome = self.counter.take_block(BLOCK_CAPACITY as u32);
        let valid = &mut self.blocks[block].0[..outcome.loaded as usize];
        mix_block(src, valid, self.volume);
        outcome
    }

    pub fn block(&self, block: usize) -> &SampleBlock {
        &self.blocks[block]
    }

    pub fn is_playing(&self) -> bool {
        self.flags.is_playing()
    }

    /// Priority of the current session, for the caller's pre-emption policy
    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn volume(&self) -> u16 {
        self.volume
    }

    /// Set the 8.8 fixed-point volume; takes effect from the next refill
    pub fn set_volume(&mut self, volume: u16) {
        self.volume = volume;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::flags::CompletionAction;

    fn stereo_ramp(pairs: usize) -> std::vec::Vec<u16> {
        let mut src = std::vec::Vec::with_capacity(pairs * 2);
        for i in 0..pairs {
            src.push((i as u16) << 8);
            src.push((i as u16) << 8);
        }
        src
    }

    #[test]
    fn start_primes_both_blocks() {
        let flags = ChannelFlags::new();
        let mut engine = AudioEngine::new(&flags, AudioConfig::default());
        let src = stereo_ramp(BLOCK_CAPACITY);

        let plan = engine.start(&src, 2500, 1);

        assert_eq!(plan.transfer_counts, [1024, 1024]);
        assert!(engine.is_playing());
        assert_eq!(engine.priority(), 1);
        // Volume 256 passes the summed channels through unscaled.
        assert_eq!(engine.block(0).as_slice()[3], 6);
        assert_eq!(engine.block(1).as_slice()[3], 6);
    }

    #[test]
    fn session_streams_exactly_its_sample_count() {
        let flags = ChannelFlags::new();
        let mut engine = AudioEngine::new(&flags, AudioConfig::default());
        let src = stereo_ramp(BLOCK_CAPACITY);

        let plan = engine.start(&src, 2500, 0);
        let mut streamed: u32 = plan.transfer_counts.iter().sum();

        // Block 0 completes and gets refilled with the 452-sample tail.
        assert_eq!(flags.on_block_complete(0), CompletionAction::Rearm);
        let serviced = engine.service(&src);
        let refill = serviced[0].expect("block 0 wanted a refill");
        assert_eq!(refill.transfer_count, Some(452));
        assert_eq!(serviced[1], None);
        streamed += 452;

        assert_eq!(streamed, 2500);
        // Loop restart: the counter rewinds to the session total.
        // The next completion of block 0 is the hard stop.
        assert_eq!(flags.on_block_complete(1), CompletionAction::Rearm);
        assert_eq!(flags.on_block_complete(0), CompletionAction::HardStop);
        assert!(!engine.is_playing());
    }

    #[test]
    fn full_blocks_keep_transfer_count() {
        let flags = ChannelFlags::new();
        let mut engine = AudioEngine::new(&flags, AudioConfig::default());
        let src = stereo_ramp(BLOCK_CAPACITY);

        engine.start(&src, 4096, 0);
        flags.on_block_complete(0);
        let serviced = engine.service(&src);
        assert_eq!(serviced[0], Some(Refill { transfer_count: None }));
    }

    #[test]
    fn counter_rewinds_for_looped_playback() {
        let flags = ChannelFlags::new();
        let mut engine = AudioEngine::new(&flags, AudioConfig::default());
        let src = stereo_ramp(512);

        // A session shorter than one block primes each block with the
        // whole session; each refill replays it from the top.
        let plan = engine.start(&src, 512, 0);
        assert_eq!(plan.transfer_counts, [512, 512]);

        flags.on_block_complete(0);
        let serviced = engine.service(&src);
        assert_eq!(serviced[0].unwrap().transfer_count, Some(512));
    }

    #[test]
    fn service_is_a_no_op_while_stopped() {
        let flags = ChannelFlags::new();
        let mut engine = AudioEngine::new(&flags, AudioConfig::default());
        let src = stereo_ramp(BLOCK_CAPACITY);

        engine.start(&src, 2048, 0);
        flags.on_block_complete(0);
        assert!(engine.stop());
        assert!(!engine.stop(), "stop is idempotent");

        // The pending refill died with the session.
        assert_eq!(engine.service(&src), [None, None]);
    }

    #[test]
    fn volume_applies_to_subsequent_fills() {
        let flags = ChannelFlags::new();
        let mut engine = AudioEngine::new(&flags, AudioConfig::default());
        let src = stereo_ramp(BLOCK_CAPACITY);

        engine.start(&src, 4096, 0);
        assert_eq!(engine.block(0).as_slice()[2], 4);

        engine.set_volume(128);
        flags.on_block_complete(0);
        engine.service(&src);
        assert_eq!(engine.block(0).as_slice()[2], 2);
    }
}

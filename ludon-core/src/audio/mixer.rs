//! PCM mixing and sample accounting
//!
//! The producer hands over interleaved stereo 16-bit PCM; the PWM output
//! wants 8-bit duty levels. Each output sample is the *sum* of the two
//! channels after an 8-bit reduction, scaled by an 8.8 fixed-point volume
//! and saturated at the maximum duty. The sum (rather than a mean) is the
//! observed behavior of the shipped hardware and is preserved exactly.

/// Samples per DMA block
pub const BLOCK_CAPACITY: usize = 1024;

/// Maximum representable PWM duty level
pub const PWM_LEVEL_MAX: u32 = 255;

/// Mid-rail duty level driven while no session is playing
pub const PWM_LEVEL_IDLE: u16 = 128;

/// Mix one stereo sample pair down to a PWM duty level.
///
/// Saturating: two full-scale inputs at unity volume clamp to
/// [`PWM_LEVEL_MAX`] instead of wrapping.
#[inline]
pub fn mix_sample(left: u16, right: u16, volume: u16) -> u32 {
    let sum = (right >> 8) as u32 + (left >> 8) as u32;
    ((sum * volume as u32) >> 8).min(PWM_LEVEL_MAX)
}

/// Mix `dst.len()` stereo pairs from the head of `src` into `dst`.
///
/// `src` must hold at least `2 * dst.len()` samples; the producer rewrites
/// its stream buffer every frame, so each fill reads from the head.
pub fn mix_block(src: &[u16], dst: &mut [u32], volume: u16) {
    debug_assert!(src.len() >= dst.len() * 2, "source block shorter than fill");
    for (i, slot) in dst.iter_mut().enumerate() {
        *slot = mix_sample(src[i * 2], src[i * 2 + 1], volume);
    }
}

/// Tracks how many samples of the current session remain unplayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SampleCounter {
    remaining: u32,
    total: u32,
}

/// Result of carving one block's worth of samples off the counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FillOutcome {
    /// Number of valid samples in the block
    pub loaded: u32,
    /// True when this block holds the session's final partial run of
    /// samples; the transfer count must shrink to `loaded`
    pub last_block: bool,
}

impl SampleCounter {
    pub const fn new() -> Self {
        Self {
            remaining: 0,
            total: 0,
        }
    }

    /// Reset for a new session of `total` samples
    pub fn reset(&mut self, total: u32) {
        self.remaining = total;
        self.total = total;
    }

    /// Account for one block fill of up to `capacity` samples.
    ///
    /// A partial block rewinds the counter to the session total so a
    /// restarted (looped) session replays from the full length.
    pub fn take_block(&mut self, capacity: u32) -> FillOutcome {
        if self.remaining < capacity {
            let loaded = self.remaining;
            self.remaining = self.total;
            FillOutcome {
                loaded,
                last_block: true,
            }
        } else {
            self.remaining -= capacity;
            FillOutcome {
                loaded: capacity,
                last_block: false,
            }
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn total(&self) -> u32 {
        self.total
    }
}

impl Default for SampleCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn full_scale_inputs_clamp() {
        // Two samples with their top bytes at 255, unity volume: the sum
        // is 510, which must saturate rather than wrap.
        assert_eq!(mix_sample(0xFF00, 0xFF00, 256), 255);
    }

    #[test]
    fn mixing_sums_channels() {
        // 0x1000 >> 8 = 16, 0x2000 >> 8 = 32; a mean would give 24.
        assert_eq!(mix_sample(0x1000, 0x2000, 256), 48);
    }

    #[test]
    fn volume_scales_after_summing() {
        assert_eq!(mix_sample(0x1000, 0x2000, 128), 24);
        assert_eq!(mix_sample(0x1000, 0x2000, 0), 0);
    }

    #[test]
    fn block_fill_reads_interleaved_pairs() {
        let src = [0x0100u16, 0x0200, 0x0300, 0x0400];
        let mut dst = [0u32; 2];
        mix_block(&src, &mut dst, 256);
        assert_eq!(dst, [3, 7]);
    }

    #[test]
    fn counter_signals_final_partial_block() {
        let mut counter = SampleCounter::new();
        counter.reset(2500);

        let first = counter.take_block(1024);
        assert_eq!((first.loaded, first.last_block), (1024, false));
        let second = counter.take_block(1024);
        assert_eq!((second.loaded, second.last_block), (1024, false));
        let last = counter.take_block(1024);
        assert_eq!((last.loaded, last.last_block), (452, true));

        // Loop restart: back to the session total, not zero.
        assert_eq!(counter.remaining(), 2500);
    }

    #[test]
    fn exact_multiple_ends_with_empty_final_block() {
        let mut counter = SampleCounter::new();
        counter.reset(2048);
        assert!(!counter.take_block(1024).last_block);
        assert!(!counter.take_block(1024).last_block);
        let last = counter.take_block(1024);
        assert_eq!((last.loaded, last.last_block), (0, true));
    }

    proptest! {
        #[test]
        fn mixed_levels_never_exceed_duty_range(l: u16, r: u16, vol in 0u16..=256) {
            prop_assert!(mix_sample(l, r, vol) <= PWM_LEVEL_MAX);
        }

        #[test]
        fn fills_conserve_sample_count(total in 1u32..=16384) {
            let mut counter = SampleCounter::new();
            counter.reset(total);
            let mut streamed = 0u32;
            loop {
                let outcome = counter.take_block(BLOCK_CAPACITY as u32);
                streamed += outcome.loaded;
                if outcome.last_block {
                    break;
                }
            }
            prop_assert_eq!(streamed, total);
            prop_assert_eq!(counter.remaining(), total);
        }
    }
}

//! Board constants for the handheld
//!
//! GPIO assignments (console revision B):
//!
//! | Signal        | GPIO |
//! |---------------|------|
//! | Panel CS      | 17   |
//! | Panel CLK     | 18   |
//! | Panel SDA     | 19   |
//! | Panel DC      | 20   |
//! | Panel RST     | 21   |
//! | Panel BL      | 22   |
//! | Audio PWM     | 6    |
//! | Amp enable    | 26   |
//!
//! Buttons live on their own GPIOs and are handled outside this firmware
//! layer.

/// SPI clock for the panel; the ST7789 keeps up at half the 125 MHz
/// peripheral clock
pub const SPI_FREQ_HZ: u32 = 62_500_000;

/// Nominal audio sample rate; the DMA pacing timer divides `clk_sys`
/// down to this
pub const SAMPLE_RATE_HZ: u32 = 44_100;

/// PWM slice for GPIO6 (slice 3, output A)
pub const AUDIO_PWM_SLICE: usize = 3;

/// DMA channels of the chained audio pair, in block order.
/// Channel 0 is left to the async runtime.
pub const AUDIO_DMA_CHANNELS: [u8; 2] = [1, 2];

/// DMA channels of the scanline transfer pool
pub const LINE_DMA_CHANNELS: [u8; 2] = [5, 6];

/// Length of the bring-up tone session in samples (five seconds); the
/// session restarts from the top when it runs out
pub const TONE_SESSION_SAMPLES: u32 = 5 * SAMPLE_RATE_HZ;

/// Frame pacing for the bring-up producer, ~59.7 Hz
pub const FRAME_INTERVAL_US: u64 = 16_742;

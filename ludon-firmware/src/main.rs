//! Ludon - Handheld Console Output Firmware
//!
//! Main firmware binary for the RP2040-based handheld. Core 0 runs the
//! compute side (frame/audio producers and the audio refill service);
//! core 1 runs the scanline render consumer. The two meet only at the
//! line gate and the inter-core FIFO.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::multicore::{spawn_core1, Stack};
use embassy_rp::spi::{self, Spi};
use embassy_time::{Duration, Ticker};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use ludon_core::audio::{AudioEngine, BLOCK_CAPACITY};
use ludon_core::config::{AudioConfig, VideoConfig};
use ludon_core::video::{ScanlineMachine, PANEL_HEIGHT, PANEL_WIDTH};
use ludon_drivers::panel::St7789;

mod audio;
mod config;
mod dispatch;
mod pattern;
mod scanline;

static CORE1_STACK: StaticCell<Stack<8192>> = StaticCell::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Ludon firmware starting...");

    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    // Panel SPI and control lines. The panel keeps up at half the
    // peripheral clock; commands and pixel data share the 8-bit format.
    let mut spi_cfg = spi::Config::default();
    spi_cfg.frequency = config::SPI_FREQ_HZ;
    let spi = Spi::new_blocking_txonly(p.SPI0, p.PIN_18, p.PIN_19, spi_cfg);

    let dc = Output::new(p.PIN_20, Level::High);
    let cs = Output::new(p.PIN_17, Level::High);
    let rst = Output::new(p.PIN_21, Level::High);
    let backlight = Output::new(p.PIN_22, Level::Low);
    let panel = St7789::new(
        spi,
        dc,
        cs,
        rst,
        backlight,
        PANEL_WIDTH as u16,
        PANEL_HEIGHT as u16,
    );
    info!("Panel bus initialized");

    // Audio output path: PWM carrier plus the chained DMA pair.
    let audio_hw = audio::AudioPwm::new(p.PWM_SLICE3, p.PIN_6, p.DMA_CH1, p.DMA_CH2);
    let amp_enable = Output::new(p.PIN_26, Level::High);
    info!("Audio PWM and DMA pacing initialized");

    // Scanline path, handed to core 1 together with the panel.
    let (lines, pool) = scanline::LineDma::new(p.DMA_CH5, p.DMA_CH6);
    let video = VideoConfig::default();
    let machine = ScanlineMachine::new(video.panel_height, pool);

    let stack = CORE1_STACK.init(Stack::new());
    spawn_core1(p.CORE1, stack, move || {
        dispatch::run_consumer(panel, lines, machine, video.scaling)
    });
    info!("Render core spawned");

    spawner.spawn(frame_loop(audio_hw, amp_enable)).unwrap();
}

/// The compute-core frame loop.
///
/// Steps the bring-up producers at frame rate: submits every scanline,
/// raises the frame flag, regenerates the PCM block and services the
/// audio engine - the same cadence the emulator core drives when it is
/// linked in place of the producers.
#[embassy_executor::task]
async fn frame_loop(mut audio_hw: audio::AudioPwm, _amp_enable: Output<'static>) {
    let mut engine = AudioEngine::new(&audio::AUDIO_FLAGS, AudioConfig::default());
    let mut stream = [0u16; BLOCK_CAPACITY * 2];
    let mut tone = pattern::ToneGen::new();
    let mut frames = pattern::TestPattern::new();

    tone.render(&mut stream);
    let plan = engine.start(&stream, config::TONE_SESSION_SAMPLES, 0);
    audio_hw.arm(&engine, plan);
    info!("Audio session armed");

    let mut ticker = Ticker::every(Duration::from_micros(config::FRAME_INTERVAL_US));
    loop {
        frames.emit_frame();

        tone.render(&mut stream);
        let serviced = engine.service(&stream);
        audio_hw.apply(serviced);

        if !engine.is_playing() {
            // The session ran its course; loop the tone from the top.
            debug!("tone session finished, restarting");
            let plan = engine.start(&stream, config::TONE_SESSION_SAMPLES, 0);
            audio_hw.arm(&engine, plan);
        }

        ticker.next().await;
    }
}

//! Audio DMA and PWM binding
//!
//! Two DMA channels stream the engine's sample blocks into the PWM
//! counter-compare register, chained so one plays while the other is
//! refilled, each paced by DMA timer 0 at the nominal sample rate. The
//! completion interrupt does nothing but flip flags and re-arm registers;
//! every buffer refill happens in [`AudioEngine::service`] on the main
//! loop.
//!
//! Both channels interrupt on `DMA_IRQ_1`; `DMA_IRQ_0` belongs to the
//! async runtime's own DMA driver.

use embassy_rp::interrupt::InterruptExt;
use embassy_rp::pac;
use embassy_rp::peripherals::{DMA_CH1, DMA_CH2, PIN_6, PWM_SLICE3};
use embassy_rp::pwm::{Config as PwmConfig, Pwm};
use embassy_rp::Peri;
use fixed::traits::ToFixed;
use portable_atomic::{AtomicU32, Ordering};

use ludon_core::audio::{
    ArmPlan, AudioEngine, ChannelFlags, CompletionAction, Refill, BLOCK_COUNT, PWM_LEVEL_IDLE,
};

use crate::config::{AUDIO_DMA_CHANNELS, AUDIO_PWM_SLICE, SAMPLE_RATE_HZ};

/// Flag block shared with the completion interrupt
pub static AUDIO_FLAGS: ChannelFlags = ChannelFlags::new();

/// Read addresses the interrupt rewinds each channel to, captured when
/// the session is armed
static BLOCK_ADDR: [AtomicU32; BLOCK_COUNT] = [AtomicU32::new(0), AtomicU32::new(0)];

/// The PWM output and its chained DMA channel pair.
///
/// Holding the channel peripherals keeps the async runtime from handing
/// them out elsewhere; all register access goes through their fixed
/// indices.
pub struct AudioPwm {
    _pwm: Pwm<'static>,
    _ch_a: Peri<'static, DMA_CH1>,
    _ch_b: Peri<'static, DMA_CH2>,
}

impl AudioPwm {
    pub fn new(
        slice: Peri<'static, PWM_SLICE3>,
        pin: Peri<'static, PIN_6>,
        ch_a: Peri<'static, DMA_CH1>,
        ch_b: Peri<'static, DMA_CH2>,
    ) -> Self {
        let clk_sys = embassy_rp::clocks::clk_sys_freq();

        // The PWM counter wraps at 255 (one duty step per level) and runs
        // 16 carrier cycles per audio sample where the clock allows.
        let mut cfg = PwmConfig::default();
        cfg.top = 255;
        let divider = (clk_sys as f32) / 255.0 / SAMPLE_RATE_HZ as f32 / 16.0;
        cfg.divider = divider.max(1.0).to_fixed();
        cfg.compare_a = PWM_LEVEL_IDLE;
        let pwm = Pwm::new_output_a(slice, pin, cfg);

        // DMA timer 0 emits one transfer request per sample period.
        pac::DMA.timer(0).write(|w| {
            w.set_x(1);
            w.set_y((clk_sys / SAMPLE_RATE_HZ) as u16);
        });

        embassy_rp::interrupt::DMA_IRQ_1.unpend();
        unsafe { embassy_rp::interrupt::DMA_IRQ_1.enable() };

        Self {
            _pwm: pwm,
            _ch_a: ch_a,
            _ch_b: ch_b,
        }
    }

    /// Arm both channels for a freshly started session and kick off the
    /// first block.
    pub fn arm(&mut self, engine: &AudioEngine, plan: ArmPlan) {
        for block in 0..BLOCK_COUNT {
            BLOCK_ADDR[block].store(
                engine.block(block).as_slice().as_ptr() as u32,
                Ordering::SeqCst,
            );
        }

        let mut enabled = pac::DMA.inte1().read();
        for block in 0..BLOCK_COUNT {
            let channel = AUDIO_DMA_CHANNELS[block] as usize;
            let chained = AUDIO_DMA_CHANNELS[block ^ 1];
            let ch = pac::DMA.ch(channel);

            debug_assert!(!ch.ctrl_trig().read().busy(), "arming a busy channel");

            ch.read_addr()
                .write_value(BLOCK_ADDR[block].load(Ordering::SeqCst));
            ch.write_addr()
                .write_value(pac::PWM.ch(AUDIO_PWM_SLICE).cc().as_ptr() as u32);
            ch.trans_count().write_value(plan.transfer_counts[block]);

            let mut ctrl = pac::dma::regs::CtrlTrig::default();
            ctrl.set_data_size(pac::dma::vals::DataSize::SIZE_WORD);
            ctrl.set_incr_read(true);
            ctrl.set_incr_write(false);
            ctrl.set_treq_sel(pac::dma::vals::TreqSel::TIMER0);
            ctrl.set_chain_to(chained);
            ctrl.set_en(true);
            // Non-trigger alias: the chain (or the kick below) starts it.
            ch.al1_ctrl().write_value(ctrl.0);

            pac::DMA.ints1().write_value(1 << channel);
            enabled |= 1 << channel;
        }
        pac::DMA.inte1().write_value(enabled);

        pac::DMA
            .multi_chan_trigger()
            .write(|w| w.set_multi_chan_trigger(1 << AUDIO_DMA_CHANNELS[0]));
    }

    /// Apply the outcome of [`AudioEngine::service`]: a final partial
    /// block shortens that channel's transfer count before its next
    /// chain trigger.
    pub fn apply(&mut self, serviced: [Option<Refill>; BLOCK_COUNT]) {
        for (block, refill) in serviced.iter().enumerate() {
            if let Some(Refill {
                transfer_count: Some(count),
            }) = refill
            {
                let channel = AUDIO_DMA_CHANNELS[block] as usize;
                pac::DMA.ch(channel).trans_count().write_value(*count);
            }
        }
    }

    /// Hard stop: abort both channels and silence the output.
    /// Pairs with [`AudioEngine::stop`].
    #[allow(dead_code)]
    pub fn stop(&mut self) {
        for &channel in AUDIO_DMA_CHANNELS.iter() {
            pac::DMA.ints1().write_value(1 << channel);
            abort_channel(channel);
        }
        set_idle_level();
    }
}

fn abort_channel(channel: u8) {
    pac::DMA
        .chan_abort()
        .write(|w| w.set_chan_abort(1 << channel));
    while pac::DMA.ch(channel as usize).ctrl_trig().read().busy() {}
}

fn set_idle_level() {
    pac::PWM
        .ch(AUDIO_PWM_SLICE)
        .cc()
        .write(|w| w.set_a(PWM_LEVEL_IDLE));
}

/// Completion interrupt for both audio channels.
///
/// Overrides the weak vector entry; bounded and allocation-free. The
/// refill itself is deferred to `service()` via the flag block.
#[no_mangle]
#[allow(non_snake_case)]
extern "C" fn DMA_IRQ_1() {
    let pending = pac::DMA.ints1().read();

    for (block, &channel) in AUDIO_DMA_CHANNELS.iter().enumerate() {
        let mask = 1u32 << channel;
        if pending & mask == 0 {
            continue;
        }

        match AUDIO_FLAGS.on_block_complete(block) {
            CompletionAction::Rearm => {
                // Rewind this channel to its own block; the chained
                // channel is already playing.
                pac::DMA
                    .ch(channel as usize)
                    .read_addr()
                    .write_value(BLOCK_ADDR[block].load(Ordering::SeqCst));
            }
            CompletionAction::HardStop => {
                set_idle_level();
                abort_channel(AUDIO_DMA_CHANNELS[block ^ 1]);
            }
        }

        pac::DMA.ints1().write_value(mask);
    }
}

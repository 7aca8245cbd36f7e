//! Scanline DMA binding
//!
//! Owns the two line buffers and executes the transfer actions of the
//! core scanline machine: each finished line streams to the panel's SPI
//! data register, paced by the SPI TX request, while the next line is
//! rendered into the sibling buffer. No completion interrupt here; the
//! machine polls the busy bit between lines.

use embassy_rp::pac;
use embassy_rp::peripherals::{DMA_CH5, DMA_CH6};
use embassy_rp::Peri;

use ludon_core::video::{LineBuffer, TransferPool};

use crate::config::LINE_DMA_CHANNELS;

/// The scanline transfer pair: two line buffers and the DMA channels
/// that alternate pushing them to the panel.
pub struct LineDma {
    buffers: [LineBuffer; 2],
    _ch_a: Peri<'static, DMA_CH5>,
    _ch_b: Peri<'static, DMA_CH6>,
}

impl LineDma {
    /// Claim the channel pair; returns the round-robin pool the scanline
    /// machine alternates over.
    pub fn new(ch_a: Peri<'static, DMA_CH5>, ch_b: Peri<'static, DMA_CH6>) -> (Self, TransferPool) {
        let pool = TransferPool::new(&LINE_DMA_CHANNELS);
        (
            Self {
                buffers: [LineBuffer::new(), LineBuffer::new()],
                _ch_a: ch_a,
                _ch_b: ch_b,
            },
            pool,
        )
    }

    /// Non-blocking busy poll for one pool channel
    pub fn busy(&self, channel: u8) -> bool {
        pac::DMA.ch(channel as usize).ctrl_trig().read().busy()
    }

    /// The buffer the machine wants rendered into
    pub fn line_mut(&mut self, slot: usize) -> &mut LineBuffer {
        &mut self.buffers[slot]
    }

    /// Start the transfer of `slot` on `channel`.
    ///
    /// The machine only issues this once the channel reports idle; the
    /// wait below covers the last few FIFO drains after the busy bit.
    pub fn start_transfer(&mut self, channel: u8, slot: usize) {
        let buffer = &self.buffers[slot];
        let ch = pac::DMA.ch(channel as usize);

        while ch.ctrl_trig().read().busy() {}

        ch.read_addr()
            .write_value(buffer.as_slice().as_ptr() as u32);
        ch.write_addr().write_value(pac::SPI0.dr().as_ptr() as u32);
        ch.trans_count().write_value(buffer.byte_len());

        let mut ctrl = pac::dma::regs::CtrlTrig::default();
        ctrl.set_data_size(pac::dma::vals::DataSize::SIZE_BYTE);
        ctrl.set_incr_read(true);
        ctrl.set_incr_write(false);
        ctrl.set_high_priority(true);
        ctrl.set_treq_sel(pac::dma::vals::TreqSel::SPI0_TX);
        // Chaining to itself disables chaining.
        ctrl.set_chain_to(channel);
        ctrl.set_en(true);
        ch.ctrl_trig().write_value(ctrl);
    }
}

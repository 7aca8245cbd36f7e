//! Cross-core scanline dispatch
//!
//! The compute core submits finished rows here; the render core runs
//! [`run_consumer`] forever. One packed command word crosses the SIO
//! FIFO per line; the row payload and palette are copied into a staging
//! cell whose ownership alternates with the line gate. Rendezvous uses
//! the event signal: waiters sleep in `wfe` and the other core `sev`s
//! after every hand-over, so neither side burns its bus while blocked.

use core::cell::UnsafeCell;

use embassy_rp::pac;
use portable_atomic::{AtomicBool, Ordering};

use ludon_core::dispatch::{Command, LineGate};
use ludon_core::video::{
    render_line, Action, Palette, RenderState, Scaling, ScanlineMachine, PANEL_HEIGHT, PANEL_WIDTH,
    SOURCE_WIDTH,
};
use ludon_drivers::panel::St7789;

use crate::scanline::LineDma;

/// One staged scanline: the raw indexed row plus the palette it should
/// be mapped through
#[derive(Clone, Copy)]
pub struct StagedRow {
    pub pixels: [u8; SOURCE_WIDTH],
    pub palette: Palette,
}

impl StagedRow {
    const fn blank() -> Self {
        Self {
            pixels: [0; SOURCE_WIDTH],
            palette: Palette([[0; 4]; 3]),
        }
    }
}

/// Staging cell shared across the cores.
///
/// Safety of the `Sync` impl rests on the gate protocol: the producer
/// writes only while the gate is idle, the consumer reads only while it
/// is busy, and the gate is sequentially consistent.
struct RowCell(UnsafeCell<StagedRow>);

unsafe impl Sync for RowCell {}

static STAGED: RowCell = RowCell(UnsafeCell::new(StagedRow::blank()));

static LINE_GATE: LineGate = LineGate::new();

/// Set by the producer when a frame is complete; drained into the
/// machine's frame request by the consumer
static FRAME_FLAG: AtomicBool = AtomicBool::new(false);

/// Submit one finished row from the compute core.
///
/// Blocks (sleeping on `wfe`) until the consumer has released the
/// previous line, so the producer can never overrun the staging cell.
/// The caller's row buffer is free for reuse on return.
pub fn submit_line(pixels: &[u8; SOURCE_WIDTH], palette: &Palette, row: u8) {
    LINE_GATE.wait_idle(cortex_m::asm::wfe);

    // Gate idle: this side owns the cell until set_busy below.
    unsafe {
        *STAGED.0.get() = StagedRow {
            pixels: *pixels,
            palette: *palette,
        };
    }

    LINE_GATE.set_busy();
    fifo_push_blocking(Command::DrawLine { row }.pack());
}

/// Flag the end of a frame from the compute core
pub fn frame_ready() {
    FRAME_FLAG.store(true, Ordering::SeqCst);
    cortex_m::asm::sev();
}

fn fifo_push_blocking(word: u32) {
    while !pac::SIO.fifo_st().read().rdy() {
        core::hint::spin_loop();
    }
    pac::SIO.fifo_wr().write_value(word);
    cortex_m::asm::sev();
}

fn fifo_try_pop() -> Option<u32> {
    if pac::SIO.fifo_st().read().vld() {
        Some(pac::SIO.fifo_rd().read())
    } else {
        None
    }
}

/// The render core's consumer loop.
///
/// Pops line commands, drives the scanline machine one line per command
/// (two when 2x scaling doubles an odd row), and keeps polling the
/// machine between commands so a frame in flight drains at DMA speed.
/// Between commands the machine renders from the consumer's copy of the
/// most recent row, never from the shared cell.
pub fn run_consumer<SPI, DC, CS, RST, BL, PinE>(
    mut panel: St7789<SPI, DC, CS, RST, BL>,
    mut lines: LineDma,
    mut machine: ScanlineMachine,
    scaling: Scaling,
) -> !
where
    SPI: embedded_hal::spi::SpiBus<u8>,
    DC: embedded_hal::digital::OutputPin<Error = PinE>,
    CS: embedded_hal::digital::OutputPin<Error = PinE>,
    RST: embedded_hal::digital::OutputPin<Error = PinE>,
    BL: embedded_hal::digital::OutputPin<Error = PinE>,
{
    let mut delay = embassy_time::Delay;
    if panel.init(&mut delay).is_err() {
        defmt::error!("panel init failed");
    }
    let _ = panel.backlight(true);
    let _ = panel.fill(0x0000);
    defmt::info!("render core up");

    let mut current = StagedRow::blank();

    loop {
        if FRAME_FLAG.swap(false, Ordering::SeqCst) {
            machine.request_frame();
        }

        if let Some(word) = fifo_try_pop() {
            match Command::unpack(word) {
                Command::DrawLine { row } => {
                    // The producer set the gate before pushing, so the
                    // staged row is ours until release().
                    unsafe {
                        current = *STAGED.0.get();
                    }

                    for _ in 0..scaling.lines_for_row(row) {
                        drive_one_line(&mut machine, &mut lines, &mut panel, &current, scaling);
                    }

                    LINE_GATE.release();
                    cortex_m::asm::sev();
                }
                Command::Nop => {}
            }
            continue;
        }

        // No command pending: keep the engine draining, then sleep if
        // there is truly nothing to do.
        let busy = lines.busy(machine.last_channel());
        if step(&mut machine, &mut lines, &mut panel, &current, scaling, busy).is_none()
            && machine.state() == RenderState::WaitFrame
        {
            cortex_m::asm::wfe();
        }
    }
}

/// Pump the machine until the staged line's transfer has been issued.
///
/// Returns immediately when the machine is parked waiting for a frame;
/// rows submitted before the first frame flag only update the staging
/// copy.
fn drive_one_line<SPI, DC, CS, RST, BL, PinE>(
    machine: &mut ScanlineMachine,
    lines: &mut LineDma,
    panel: &mut St7789<SPI, DC, CS, RST, BL>,
    staged: &StagedRow,
    scaling: Scaling,
) where
    SPI: embedded_hal::spi::SpiBus<u8>,
    DC: embedded_hal::digital::OutputPin<Error = PinE>,
    CS: embedded_hal::digital::OutputPin<Error = PinE>,
    RST: embedded_hal::digital::OutputPin<Error = PinE>,
    BL: embedded_hal::digital::OutputPin<Error = PinE>,
{
    loop {
        let busy = lines.busy(machine.last_channel());
        match step(machine, lines, panel, staged, scaling, busy) {
            Some(Action::StartTransfer { .. }) => return,
            Some(_) => {}
            None => {
                if machine.state() == RenderState::WaitFrame {
                    return;
                }
                core::hint::spin_loop();
            }
        }
    }
}

/// One machine poll, executing whatever action it returns
fn step<SPI, DC, CS, RST, BL, PinE>(
    machine: &mut ScanlineMachine,
    lines: &mut LineDma,
    panel: &mut St7789<SPI, DC, CS, RST, BL>,
    staged: &StagedRow,
    scaling: Scaling,
    busy: bool,
) -> Option<Action>
where
    SPI: embedded_hal::spi::SpiBus<u8>,
    DC: embedded_hal::digital::OutputPin<Error = PinE>,
    CS: embedded_hal::digital::OutputPin<Error = PinE>,
    RST: embedded_hal::digital::OutputPin<Error = PinE>,
    BL: embedded_hal::digital::OutputPin<Error = PinE>,
{
    let action = machine.poll(busy)?;
    match action {
        Action::BeginFrame => {
            let opened = panel
                .set_address_window(0, 0, PANEL_WIDTH as u16, PANEL_HEIGHT as u16)
                .and_then(|_| panel.begin_ram_write());
            if opened.is_err() {
                defmt::warn!("panel frame setup failed");
            }
        }
        Action::RenderLine { slot } => {
            render_line(&staged.pixels, &staged.palette, scaling, lines.line_mut(slot));
        }
        Action::StartTransfer { channel, slot } => {
            lines.start_transfer(channel, slot);
        }
    }
    Some(action)
}

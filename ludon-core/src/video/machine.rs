//! The scanline state machine
//!
//! Drives one frame as `height` render/transfer line cycles. The machine
//! is a pure stepper: each [`poll`](ScanlineMachine::poll) inspects the
//! busy state of the last transfer channel and returns at most one action
//! for the hardware layer to execute. The two idle checks are non-blocking
//! polls repeated by the caller, so the driving loop stays responsive.

use heapless::Vec;

/// Upper bound on transfer channels in a pool
pub const MAX_POOL_CHANNELS: usize = 4;

/// Machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RenderState {
    /// Idle until the frame-ready flag is observed
    WaitFrame,
    /// Waiting for the previous frame's final transfer before addressing
    /// the panel for a new frame
    StartFrame,
    /// Build the next line into the inactive buffer slot
    RenderRow,
    /// Waiting for the previous line's transfer before starting this one
    WaitDma,
}

/// One hardware operation requested by the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Action {
    /// Issue the full-frame address window and enter RAM-write mode
    BeginFrame,
    /// Render the staged source row into line buffer `slot`
    RenderLine { slot: usize },
    /// Start the DMA transfer of line buffer `slot` on `channel`
    StartTransfer { channel: u8, slot: usize },
}

/// Round-robin pool of DMA transfer channels.
///
/// Consecutive line transfers must never reuse the same channel: on the
/// shipped hardware, back-to-back reuse produced visible timing glitches.
/// The root cause was never established, so the alternation is kept as a
/// constraint rather than a workaround for anything specific.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransferPool {
    channels: Vec<u8, MAX_POOL_CHANNELS>,
    cursor: usize,
}

impl TransferPool {
    /// Build a pool from at least two channel identifiers.
    pub fn new(channels: &[u8]) -> Self {
        assert!(channels.len() >= 2, "transfer pool needs at least 2 channels");
        Self {
            channels: Vec::from_slice(channels).expect("too many pool channels"),
            cursor: 0,
        }
    }

    /// The channel the most recent transfer used
    pub fn current(&self) -> u8 {
        self.channels[self.cursor]
    }

    fn advance(&mut self) -> u8 {
        self.cursor = (self.cursor + 1) % self.channels.len();
        self.channels[self.cursor]
    }
}

/// The four-state scanline engine.
///
/// Owns the row counter and buffer-slot parity; line buffer contents and
/// DMA registers live with the caller executing the returned actions.
pub struct ScanlineMachine {
    state: RenderState,
    row: u16,
    height: u16,
    fill_slot: usize,
    pool: TransferPool,
    frame_pending: bool,
    rendering: bool,
}

impl ScanlineMachine {
    pub fn new(height: u16, pool: TransferPool) -> Self {
        Self {
            state: RenderState::WaitFrame,
            row: 0,
            height,
            fill_slot: 0,
            pool,
            frame_pending: false,
            rendering: false,
        }
    }

    /// Note that the producer finished a frame; observed at the next
    /// WaitFrame poll (a request made mid-frame stays pending).
    pub fn request_frame(&mut self) {
        self.frame_pending = true;
    }

    /// Step the machine once.
    ///
    /// `last_transfer_busy` is the busy state of [`last_channel`]
    /// (queried by the caller immediately before this call).
    ///
    /// [`last_channel`]: Self::last_channel
    pub fn poll(&mut self, last_transfer_busy: bool) -> Option<Action> {
        match self.state {
            RenderState::WaitFrame => {
                if self.frame_pending {
                    self.frame_pending = false;
                    self.state = RenderState::StartFrame;
                }
                None
            }
            RenderState::StartFrame => {
                if last_transfer_busy {
                    return None;
                }
                self.rendering = true;
                self.state = RenderState::RenderRow;
                Some(Action::BeginFrame)
            }
            RenderState::RenderRow => {
                self.state = RenderState::WaitDma;
                Some(Action::RenderLine {
                    slot: self.fill_slot,
                })
            }
            RenderState::WaitDma => {
                if last_transfer_busy {
                    return None;
                }
                let channel = self.pool.advance();
                let slot = self.fill_slot;
                self.fill_slot ^= 1;
                self.row += 1;
                if self.row == self.height {
                    self.row = 0;
                    self.rendering = false;
                    self.state = RenderState::WaitFrame;
                } else {
                    self.state = RenderState::RenderRow;
                }
                Some(Action::StartTransfer { channel, slot })
            }
        }
    }

    /// Channel of the most recently issued transfer, for the caller's
    /// busy query
    pub fn last_channel(&self) -> u8 {
        self.pool.current()
    }

    /// True from the first line of a frame until its last transfer is
    /// issued; the producer can use this to hold off a new frame
    pub fn is_rendering(&self) -> bool {
        self.rendering
    }

    pub fn state(&self) -> RenderState {
        self.state
    }

    pub fn row(&self) -> u16 {
        self.row
    }
}

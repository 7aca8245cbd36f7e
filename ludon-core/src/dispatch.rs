//! Cross-core command dispatch
//!
//! The compute core hands finished scanlines to the render core through
//! the hardware inter-core FIFO, one packed command word per line. Pointers
//! never cross the core boundary: the row payload is copied into a staging
//! buffer owned by the dispatcher, and [`LineGate`] alternates ownership of
//! that buffer between the cores. The gate plus the bounded FIFO are the
//! only backpressure: a producer that outruns the consumer blocks.

use portable_atomic::{AtomicBool, Ordering};

/// Command opcode: do nothing
const OPCODE_NOP: u8 = 0;

/// Command opcode: draw the staged row at the carried row index
const OPCODE_DRAW_LINE: u8 = 1;

/// A command crossing the inter-core FIFO.
///
/// Packs into one 32-bit word so the hardware queue transfers it
/// atomically: opcode in the low byte, row index in the high byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    Nop,
    DrawLine { row: u8 },
}

impl Command {
    /// Pack for the FIFO
    pub fn pack(self) -> u32 {
        match self {
            Command::Nop => OPCODE_NOP as u32,
            Command::DrawLine { row } => OPCODE_DRAW_LINE as u32 | (row as u32) << 24,
        }
    }

    /// Unpack a FIFO word; unknown opcodes decode to [`Command::Nop`]
    pub fn unpack(word: u32) -> Self {
        match (word & 0xFF) as u8 {
            OPCODE_DRAW_LINE => Command::DrawLine {
                row: (word >> 24) as u8,
            },
            _ => Command::Nop,
        }
    }
}

/// The line-busy flag: the single synchronization point between the
/// compute core and the render core.
///
/// Protocol: the producer waits for the gate to open, writes the staging
/// buffer, closes the gate, then pushes its command. The consumer opens
/// the gate only after the draw completes. Sequentially consistent
/// accesses keep both cores' views in step.
pub struct LineGate {
    busy: AtomicBool,
}

const ORDER: Ordering = Ordering::SeqCst;

impl LineGate {
    pub const fn new() -> Self {
        Self {
            busy: AtomicBool::new(false),
        }
    }

    /// Block until the consumer has released the previous line.
    ///
    /// `park` runs between observations; the firmware passes an event
    /// wait so the spinning core sleeps instead of burning the bus.
    pub fn wait_idle(&self, mut park: impl FnMut()) {
        while self.busy.load(ORDER) {
            park();
        }
    }

    /// Producer side: claim the staging buffer. Must only be called while
    /// the gate is idle (after [`wait_idle`](Self::wait_idle)).
    pub fn set_busy(&self) {
        debug_assert!(!self.busy.load(ORDER), "line submitted while busy");
        self.busy.store(true, ORDER);
    }

    /// Consumer side: release the staging buffer after the draw
    pub fn release(&self) {
        self.busy.store(false, ORDER);
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(ORDER)
    }
}

impl Default for LineGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering as StdOrdering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn commands_pack_into_one_word() {
        assert_eq!(Command::Nop.pack(), 0);
        assert_eq!(Command::DrawLine { row: 143 }.pack(), 0x8F00_0001);
    }

    #[test]
    fn commands_roundtrip() {
        for row in [0u8, 1, 143, 255] {
            let cmd = Command::DrawLine { row };
            assert_eq!(Command::unpack(cmd.pack()), cmd);
        }
        assert_eq!(Command::unpack(Command::Nop.pack()), Command::Nop);
    }

    #[test]
    fn unknown_opcodes_decode_to_nop() {
        assert_eq!(Command::unpack(0x0000_00FE), Command::Nop);
        assert_eq!(Command::unpack(0xFFFF_FF02), Command::Nop);
    }

    #[test]
    fn producer_blocks_until_consumer_releases() {
        static GATE: LineGate = LineGate::new();
        static SUBMITTED: AtomicU32 = AtomicU32::new(0);

        GATE.set_busy();

        thread::scope(|scope| {
            let producer = scope.spawn(|| {
                // Models submit_line: wait, stage, close the gate again.
                GATE.wait_idle(|| thread::yield_now());
                GATE.set_busy();
                SUBMITTED.fetch_add(1, StdOrdering::SeqCst);
            });

            // The producer must not get through while the gate is held.
            thread::sleep(Duration::from_millis(20));
            assert_eq!(SUBMITTED.load(StdOrdering::SeqCst), 0);

            GATE.release();
            producer.join().unwrap();
        });

        assert_eq!(SUBMITTED.load(StdOrdering::SeqCst), 1);
        assert!(GATE.is_busy(), "producer reclaims the gate for its line");
        GATE.release();
    }

    #[test]
    fn one_command_per_submission() {
        use std::collections::VecDeque;
        use std::sync::Mutex;

        // Gate + queue discipline end to end: every submission lands as
        // exactly one command, in order, despite the consumer lagging.
        let gate = LineGate::new();
        let queue: Mutex<VecDeque<u32>> = Mutex::new(VecDeque::new());

        thread::scope(|scope| {
            scope.spawn(|| {
                for row in 0..32u8 {
                    gate.wait_idle(|| thread::yield_now());
                    gate.set_busy();
                    queue
                        .lock()
                        .unwrap()
                        .push_back(Command::DrawLine { row }.pack());
                }
            });

            let mut seen = std::vec::Vec::new();
            while seen.len() < 32 {
                let word = queue.lock().unwrap().pop_front();
                if let Some(word) = word {
                    match Command::unpack(word) {
                        Command::DrawLine { row } => seen.push(row),
                        Command::Nop => {}
                    }
                    gate.release();
                } else {
                    thread::yield_now();
                }
            }
            let expected: std::vec::Vec<u8> = (0..32).collect();
            assert_eq!(seen, expected);
        });
    }
}

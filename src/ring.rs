//! The pulse ring: 256 slots of `(low, high)` tick counts with 8-bit cursors.
//!
//! The ring is the single shared structure between the interrupt-driven
//! sampler, the transmit replay path and the cooperative decoders. Its
//! concurrency discipline is deliberately narrow:
//!
//! - In receive mode the sampler is the only writer of [`PulseRing::current`]
//!   and of slot contents; decoders keep a local cursor and only read slots
//!   they have not caught up to.
//! - A slot whose low phase has saturated at [`SATURATED_TICKS`] no longer
//!   changes, so reading that one byte under the write head is stable. The
//!   decoders rely on this to spot the end-of-message sentinel without
//!   waiting for the next rising edge.
//! - All cursor arithmetic wraps modulo 256; "how far ahead" is a wrapping
//!   subtract, never a bounds check.

use crate::consts::{PULSE_RING_SLOTS, SATURATED_TICKS};

/// One measured cycle: ticks spent low and ticks spent high between two
/// consecutive rising edges on the receiver pin.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct Pulse {
    /// Ticks the line spent low during this cycle. `0xff` means the phase
    /// stretched to the measurable maximum and marks end-of-message.
    pub low: u8,
    /// Ticks the line spent high during this cycle.
    pub high: u8,
}

impl Pulse {
    /// Cycle duration. Widened to `u16` so two near-saturated phases do not
    /// wrap.
    pub fn duration(&self) -> u16 {
        self.low as u16 + self.high as u16
    }

    /// Whether this slot carries the end-of-message sentinel.
    pub fn is_end_marker(&self) -> bool {
        self.low == SATURATED_TICKS
    }

    pub(crate) fn bump(&mut self, level: bool) {
        let phase = if level { &mut self.high } else { &mut self.low };
        if *phase != SATURATED_TICKS {
            *phase += 1;
        }
    }
}

/// Distance from cursor `a` to cursor `b`, modulo the ring size.
///
/// This is the overflow-aware subtract every cursor comparison in the crate
/// reduces to; a decoder has pending work exactly while
/// `ovf_sub(pi, current) != 0`.
pub fn ovf_sub(a: u8, b: u8) -> u8 {
    b.wrapping_sub(a)
}

/// The circular pulse buffer shared by sampler, decoders and replay.
#[derive(Debug)]
pub struct PulseRing {
    slots: [Pulse; PULSE_RING_SLOTS],
    /// Sampler write head in receive mode; replay read head in transmit
    /// mode. Never written by decoders.
    pub current: u8,
    /// First slot of the message being decoded or replayed.
    pub msg_start: u8,
    /// One past the last slot of a message staged for replay.
    pub msg_end: u8,
}

impl PulseRing {
    pub(crate) const fn new() -> Self {
        Self {
            slots: [Pulse { low: 0, high: 0 }; PULSE_RING_SLOTS],
            current: 0,
            msg_start: 0,
            msg_end: 0,
        }
    }

    /// Copies out the slot at `index`.
    pub fn get(&self, index: u8) -> Pulse {
        self.slots[index as usize]
    }

    pub(crate) fn set(&mut self, index: u8, pulse: Pulse) {
        self.slots[index as usize] = pulse;
    }

    pub(crate) fn clear(&mut self, index: u8) {
        self.slots[index as usize] = Pulse::default();
    }

    pub(crate) fn bump(&mut self, index: u8, level: bool) {
        self.slots[index as usize].bump(level);
    }

    /// Zeroes all three cursors. Slot contents are left stale; the sampler
    /// clears each slot before reusing it.
    pub(crate) fn reset(&mut self) {
        self.current = 0;
        self.msg_start = 0;
        self.msg_end = 0;
    }
}

//! Demodulators and the per-frame decode state they share.
//!
//! One decoder runs at a time, chosen by the sync searcher; all of them walk
//! the pulse ring with a private cursor, stuff bits through the line emitter
//! and terminate on the saturated-low end-of-message sentinel. Lock-in comes
//! first in every mode: a decoder only commits (emits its header and starts
//! producing payload) after enough consecutive cycles match the nominal
//! duration, so stray noise never reaches the serial line.

pub(crate) mod ask;
pub(crate) mod manchester;
pub(crate) mod ook;
pub(crate) mod pulses;

use crate::consts::CHECKSUM_SEED;

/// Modulation of the frame being decoded or replayed, as named in the
/// serial header (`MA:`, `MM:`, `MO:`, `MP:`).
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub(crate) enum Modulation {
    /// Wide-vs-narrow pulses within a uniform cycle period.
    #[default]
    Ask,
    /// Mid-cycle transitions carry the data.
    Manchester,
    /// Raw pulse pairs, no demodulation (learning mode).
    Pulses,
    /// Degenerate ASK with one- or two-cycle off phases. Emit only.
    Ook,
}

impl Modulation {
    pub(crate) fn code(self) -> u8 {
        match self {
            Modulation::Ask => b'A',
            Modulation::Manchester => b'M',
            Modulation::Pulses => b'P',
            Modulation::Ook => b'O',
        }
    }
}

/// Shared decode state for the frame in flight.
///
/// Written by exactly one task at a time, serialized by the running-state
/// machine: the sync searcher seeds it, the active decoder fills it, the
/// trailer emission consumes it. The command parser reuses the same fields
/// when it accumulates an inbound line, which is what makes the round-trip
/// checksum law hold by construction.
#[derive(Debug, Default)]
pub(crate) struct Frame {
    pub(crate) msg_type: Modulation,
    /// Adaptively averaged nominal cycle duration, in ticks.
    pub(crate) sync_duration: u8,
    /// Bits stuffed so far (pulses, in raw dump mode).
    pub(crate) bit_count: u8,
    /// MSB-first bit accumulator; flushed to serial every eighth bit.
    pub(crate) byte: u8,
    /// Running additive checksum, seeded with `0x55`.
    pub(crate) checksum: u8,
    /// Set once the decoder has committed at least a lock-in's worth of
    /// valid bits. Gates the ASK-to-Manchester retry.
    pub(crate) decoded: bool,
}

impl Frame {
    /// Resets everything but the nominal duration for a fresh frame of the
    /// given modulation.
    pub(crate) fn begin(&mut self, msg_type: Modulation) {
        self.msg_type = msg_type;
        self.bit_count = 0;
        self.byte = 0;
        self.checksum = CHECKSUM_SEED;
        self.decoded = false;
    }
}

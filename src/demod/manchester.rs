//! Manchester demodulation: a demi-clock tracker emitting one bit per two
//! half-cycles.
//!
//! Each cycle is consumed as two half-pulses, low then high. A half a full
//! nominal duration wide is a polarity change: it latches the bit value
//! (the phase it landed on) and advances the demi-clock an extra step. The
//! stuff clock trails the demi-clock, emitting the latched bit on every odd
//! half-bit boundary: one bit per two half-cycles, however the halves were
//! distributed across pulses.

use crate::consts::{MANCHESTER_LOCKIN_PULSES, MANCHESTER_MAX_BITS, MIN_CYCLE_TICKS, SYNC_TOLERANCE};
use crate::driver::Bridge;
use crate::sync::normalize;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal_nb::serial::{Read, Write};

/// Resumable state of the Manchester decoder task.
#[derive(Clone, Copy, Default, Debug)]
pub(crate) struct ManchesterDecode {
    pi: u8,
    matched: u8,
    committed: bool,
    /// Half-bits consumed from the pulse stream.
    demi: u8,
    /// Half-bits already accounted for by emission.
    stuff: u8,
    /// Latched bit value, updated at each polarity change.
    bit: bool,
}

impl ManchesterDecode {
    pub(crate) fn reset(&mut self, start: u8) {
        *self = Self::default();
        self.pi = start;
    }
}

impl<TX, RX, ANT, SER> Bridge<TX, RX, ANT, SER>
where
    TX: OutputPin,
    RX: InputPin,
    ANT: OutputPin,
    SER: Read + Write,
{
    /// One scheduler step of the Manchester decoder.
    ///
    /// Lock-in is stricter than ASK (32 cycles) because Manchester carries
    /// twice the edge density; cycles are shape-normalized first so
    /// alternating full/half pulses count as one train. Decoding walks the
    /// raw halves. Terminates on the sentinel or once the bit budget is
    /// spent.
    pub(crate) fn manchester_step(&mut self) {
        loop {
            let pi = self.manchester.pi;
            let pulse = self.ring.get(pi);
            if pi == self.ring.current && !pulse.is_end_marker() {
                return;
            }
            if !self.manchester.committed {
                if pulse.is_end_marker() {
                    self.decode_failed(pi);
                    return;
                }
                let (p0, p1) = normalize(pulse, self.frame.sync_duration);
                let d = p0 + p1;
                if d < MIN_CYCLE_TICKS
                    || d.abs_diff(self.frame.sync_duration as u16) > SYNC_TOLERANCE
                {
                    self.decode_failed(pi);
                    return;
                }
                self.manchester.matched += 1;
                self.manchester.pi = pi.wrapping_add(1);
                if self.manchester.matched == MANCHESTER_LOCKIN_PULSES {
                    let start = self.ring.msg_start;
                    self.manchester.committed = true;
                    self.manchester.pi = start;
                    self.manchester.demi = 0;
                    self.manchester.stuff = 0;
                    self.manchester.bit = false;
                    self.frame.decoded = true;
                    self.emit_header();
                }
            } else {
                if pulse.is_end_marker() {
                    self.decode_done(pi);
                    return;
                }
                self.half_cycle(pulse.low, false);
                self.half_cycle(pulse.high, true);
                self.manchester.pi = pi.wrapping_add(1);
                if self.frame.bit_count >= MANCHESTER_MAX_BITS {
                    self.decode_done(self.manchester.pi);
                    return;
                }
            }
        }
    }

    /// Consumes one half-cycle in the given phase.
    fn half_cycle(&mut self, width: u8, phase: bool) {
        self.catch_up();
        let margin = self.frame.sync_duration / 4;
        if width.abs_diff(self.frame.sync_duration) < margin {
            // Full-clock half: polarity change.
            self.manchester.bit = phase;
            self.manchester.demi = self.manchester.demi.wrapping_add(1);
        }
        self.manchester.demi = self.manchester.demi.wrapping_add(1);
        self.catch_up();
    }

    /// Lets the stuff clock trail the demi-clock by one step, emitting the
    /// latched bit on odd half-bit boundaries.
    fn catch_up(&mut self) {
        if self.manchester.stuff != self.manchester.demi {
            if self.manchester.stuff & 1 == 1 {
                let bit = self.manchester.bit;
                self.stuff_bit(bit);
            }
            self.manchester.stuff = self.manchester.stuff.wrapping_add(1);
        }
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use crate::consts::SATURATED_TICKS;
    use crate::driver::{Bridge, RunningState};
    use crate::ring::Pulse;
    use crate::testutil::{SimPin, SimSerial, load_ring, run_polls};

    /// Uniform half-clock cycle: no polarity change, one bit per cycle.
    const FLAT: Pulse = Pulse {
        low: 0x28,
        high: 0x28,
    };
    /// Full-clock low half, half-clock high half.
    const LOW_FULL: Pulse = Pulse {
        low: 0x50,
        high: 0x28,
    };
    /// Half-clock low half, full-clock high half.
    const HIGH_FULL: Pulse = Pulse {
        low: 0x28,
        high: 0x50,
    };

    fn bridge() -> Bridge<SimPin, SimPin, SimPin, SimSerial> {
        Bridge::new(SimPin::new(), SimPin::new(), None, SimSerial::new())
    }

    #[test]
    fn flat_train_emits_latched_zeros() {
        let mut b = bridge();
        let mut pulses = vec![FLAT; 40];
        pulses.push(Pulse {
            low: SATURATED_TICKS,
            high: 0x20,
        });
        load_ring(&mut b, &pulses);
        run_polls(&mut b, 8);
        // 40 cycles, one bit each, latch never moves off zero.
        // checksum = 0x55 + 0x28 + 0x50 = 0xcd
        assert_eq!(b.serial.take_output(), "MM:0000000000#28!50*CD\n");
        assert_eq!(b.running, RunningState::SyncSearch);
    }

    #[test]
    fn polarity_changes_move_the_latch() {
        let mut b = bridge();
        let mut pulses = vec![FLAT; 32];
        pulses.push(HIGH_FULL);
        pulses.extend([FLAT; 3]);
        pulses.push(LOW_FULL);
        pulses.extend([FLAT; 4]);
        pulses.push(Pulse {
            low: SATURATED_TICKS,
            high: 0x20,
        });
        load_ring(&mut b, &pulses);
        run_polls(&mut b, 8);
        // 32 zeros, then the high-full half latches one for four cycles,
        // the low-full half latches zero again: 42 bits total, the last
        // two flushed low-aligned.
        // checksum = 0x55 + 0xf0 + 0x2a + 0x50 = 0xbf
        assert_eq!(b.serial.take_output(), "MM:00000000F000#2A!50*BF\n");
    }

    #[test]
    fn failed_ask_lockin_with_symmetric_cycles_falls_back_to_manchester() {
        // A train that classified as ASK but carried one near-symmetric
        // cycle: when its lock-in dies, the same window is retried as
        // Manchester before the searcher gives up on it. The good train
        // that follows then emits as Manchester, and only once.
        let mut b = bridge();
        let wide = Pulse {
            low: 0x10,
            high: 0x40,
        };
        let mut pulses = vec![wide; 3];
        pulses.push(FLAT); // the one symmetric cycle
        pulses.extend([wide; 5]);
        pulses.push(Pulse {
            low: 0x05,
            high: 0x03,
        }); // noise kills both lock-ins
        pulses.extend([FLAT; 41]);
        pulses.push(Pulse {
            low: SATURATED_TICKS,
            high: 0x20,
        });
        load_ring(&mut b, &pulses);
        run_polls(&mut b, 16);
        let out = b.serial.take_output();
        assert!(!out.contains("MA:"));
        // checksum = 0x55 + 0x29 + 0x50 = 0xce
        assert_eq!(out, "MM:000000000000#29!50*CE\n");
    }

    #[test]
    fn bit_budget_guards_against_runaway_trains() {
        let mut b = bridge();
        // A full ring of flat cycles and no sentinel: the budget stops it.
        load_ring(&mut b, &vec![FLAT; 250]);
        run_polls(&mut b, 8);
        let out = b.serial.take_output();
        assert!(out.starts_with("MM:"));
        assert!(out.contains("#D0"));
    }
}

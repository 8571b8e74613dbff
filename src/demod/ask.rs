//! ASK demodulation: one bit per cycle, wide high means one.

use crate::consts::{ASK_LOCKIN_PULSES, SYNC_TOLERANCE};
use crate::driver::Bridge;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal_nb::serial::{Read, Write};

/// Resumable state of the ASK decoder task.
#[derive(Clone, Copy, Default, Debug)]
pub(crate) struct AskDecode {
    pi: u8,
    matched: u8,
    committed: bool,
}

impl AskDecode {
    pub(crate) fn reset(&mut self, start: u8) {
        self.pi = start;
        self.matched = 0;
        self.committed = false;
    }
}

impl<TX, RX, ANT, SER> Bridge<TX, RX, ANT, SER>
where
    TX: OutputPin,
    RX: InputPin,
    ANT: OutputPin,
    SER: Read + Write,
{
    /// One scheduler step of the ASK decoder.
    ///
    /// Phase one re-checks the cycle duration over a full lock-in window
    /// before anything reaches the serial line; phase two re-walks the same
    /// window emitting `high > low` per pulse until the saturated-low
    /// sentinel. The sentinel slot itself contributes no bit.
    pub(crate) fn ask_step(&mut self) {
        loop {
            let pi = self.ask.pi;
            let pulse = self.ring.get(pi);
            if pi == self.ring.current && !pulse.is_end_marker() {
                // A saturated low under the write head is frozen and safe
                // to act on; anything else means the slot is still being
                // measured.
                return;
            }
            if !self.ask.committed {
                if pulse.is_end_marker() {
                    self.decode_failed(pi);
                    return;
                }
                if pulse
                    .duration()
                    .abs_diff(self.frame.sync_duration as u16)
                    > SYNC_TOLERANCE
                {
                    self.decode_failed(pi);
                    return;
                }
                self.ask.matched += 1;
                self.ask.pi = pi.wrapping_add(1);
                if self.ask.matched == ASK_LOCKIN_PULSES {
                    self.ask.committed = true;
                    self.frame.decoded = true;
                    self.ask.pi = self.ring.msg_start;
                    self.emit_header();
                }
            } else {
                if pulse.is_end_marker() {
                    self.decode_done(pi);
                    return;
                }
                self.stuff_bit(pulse.high > pulse.low);
                self.ask.pi = pi.wrapping_add(1);
            }
        }
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use crate::consts::SATURATED_TICKS;
    use crate::driver::{Bridge, RunningState};
    use crate::ring::Pulse;
    use crate::testutil::{SimPin, SimSerial, ask_pulses, load_ring, run_polls};

    fn bridge() -> Bridge<SimPin, SimPin, SimPin, SimSerial> {
        Bridge::new(SimPin::new(), SimPin::new(), None, SimSerial::new())
    }

    #[test]
    fn decodes_msb_first_with_wide_high_as_one() {
        let mut b = bridge();
        let mut pulses = ask_pulses(&[0xa5, 0x3c, 0x0f], 0x30);
        pulses.push(Pulse {
            low: SATURATED_TICKS,
            high: 0x20,
        });
        load_ring(&mut b, &pulses);
        run_polls(&mut b, 8);
        assert_eq!(b.serial.take_output(), "MA:A53C0F#18!30*8D\n");
        assert_eq!(b.running, RunningState::SyncSearch);
        assert_eq!(b.frames_out, 1);
    }

    #[test]
    fn saturation_terminates_after_partial_byte() {
        // 20 one-bits then the sentinel: the four trailing bits flush as
        // one low-aligned byte.
        let mut b = bridge();
        let mut pulses = vec![
            Pulse {
                low: 0x0c,
                high: 0x24
            };
            20
        ];
        pulses.push(Pulse {
            low: SATURATED_TICKS,
            high: 0x20,
        });
        load_ring(&mut b, &pulses);
        run_polls(&mut b, 8);
        // 20 bits: FF FF then 0b1111 low-aligned.
        // checksum = 0x55 + 0xff + 0xff + 0x0f + 0x14 + 0x30 = 0xa6
        assert_eq!(b.serial.take_output(), "MA:FFFF0F#14!30*A6\n");
    }

    #[test]
    fn lockin_failure_is_silent_and_resumes_search() {
        let mut b = bridge();
        // Sync locks, but the lock-in window runs into noise at pulse 12.
        let mut pulses = vec![
            Pulse {
                low: 0x0c,
                high: 0x24
            };
            12
        ];
        pulses.extend([Pulse { low: 0x05, high: 0x03 }; 4]);
        load_ring(&mut b, &pulses);
        run_polls(&mut b, 8);
        assert_eq!(b.serial.take_output(), "");
        assert_eq!(b.running, RunningState::SyncSearch);
        assert_eq!(b.ring.msg_start, 12);
    }

    #[test]
    fn frame_after_noise_emits_once_with_true_bit_count() {
        // 15 valid cycles, noise, then 30 valid cycles and the sentinel:
        // exactly one emission, 30 bits.
        let mut b = bridge();
        let mut pulses = Vec::new();
        pulses.extend(ask_pulses(&[0x00], 0x30)[..8].iter().copied());
        pulses.extend(std::iter::repeat(Pulse { low: 0x24, high: 0x0c }).take(7)); // 15 valid
        pulses.extend([Pulse { low: 0x05, high: 0x03 }; 10]);
        pulses.extend(std::iter::repeat(Pulse { low: 0x24, high: 0x0c }).take(30));
        pulses.push(Pulse {
            low: SATURATED_TICKS,
            high: 0x20,
        });
        load_ring(&mut b, &pulses);
        run_polls(&mut b, 16);
        let out = b.serial.take_output();
        assert_eq!(out.matches("MA:").count(), 1);
        // 30 zero bits -> three zero bytes plus a low-aligned partial.
        // checksum = 0x55 + 0x1e + 0x30 = 0xa3
        assert_eq!(out, "MA:00000000#1E!30*A3\n");
    }
}

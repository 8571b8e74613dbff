//! Raw pulse dump: the learning mode behind the `PULSE` command.
//!
//! No demodulation at all: every captured cycle goes out as two hex bytes,
//! high phase first, exactly the format the command parser accepts back for
//! replay. The bit counter counts pulses here, so a replayed `MP` line
//! places its end sentinel right past the last pulse.

use crate::driver::Bridge;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal_nb::serial::{Read, Write};

/// Resumable state of the raw dump task.
#[derive(Clone, Copy, Default, Debug)]
pub(crate) struct PulseDump {
    pi: u8,
}

impl PulseDump {
    pub(crate) fn reset(&mut self, start: u8) {
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
    /// One scheduler step of the raw dump.
    pub(crate) fn pulses_step(&mut self) {
        loop {
            let pi = self.raw.pi;
            let pulse = self.ring.get(pi);
            if pi == self.ring.current && !pulse.is_end_marker() {
                return;
            }
            if pulse.is_end_marker() {
                self.decode_done(pi);
                return;
            }
            self.put_hex(pulse.high);
            self.put_hex(pulse.low);
            self.frame.checksum = self
                .frame
                .checksum
                .wrapping_add(pulse.high)
                .wrapping_add(pulse.low);
            self.frame.bit_count = self.frame.bit_count.wrapping_add(1);
            self.raw.pi = pi.wrapping_add(1);
        }
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use crate::consts::SATURATED_TICKS;
    use crate::driver::Bridge;
    use crate::ring::Pulse;
    use crate::testutil::{SimPin, SimSerial, load_ring, run_polls};

    #[test]
    fn dumps_pulse_pairs_high_phase_first() {
        let mut b = Bridge::new(SimPin::new(), SimPin::new(), None::<SimPin>, SimSerial::new());
        b.display_pulses = true;
        let mut pulses = vec![
            Pulse {
                low: 0x24,
                high: 0x0c
            };
            12
        ];
        pulses.push(Pulse {
            low: SATURATED_TICKS,
            high: 0x20,
        });
        load_ring(&mut b, &pulses);
        run_polls(&mut b, 8);
        let out = b.serial.take_output();
        // Twelve pulses, each "0C24"; the counter counts pulses.
        // checksum = 0x55 + 12 * 0x30 + 0x0c + 0x30 = 0xd1
        assert_eq!(
            out,
            format!("MP:{}#0C!30*D1\n", "0C24".repeat(12))
        );
    }
}

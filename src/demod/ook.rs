//! OOK demodulation: a phase one full cycle wide carries the bit.
//!
//! OOK trains keep the carrier off for one or two cycle widths, so the
//! cycle duration alone cannot gate lock-in the way it does for ASK.
//! Instead each phase is compared against the nominal duration and its
//! half, with a proportional margin.

use crate::consts::OOK_LOCKIN_PULSES;
use crate::driver::Bridge;
use crate::ring::Pulse;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal_nb::serial::{Read, Write};

/// Resumable state of the OOK decoder task.
#[derive(Clone, Copy, Default, Debug)]
pub(crate) struct OokDecode {
    pi: u8,
    matched: u8,
    committed: bool,
}

impl OokDecode {
    pub(crate) fn reset(&mut self, start: u8) {
        self.pi = start;
        self.matched = 0;
        self.committed = false;
    }
}

fn within(value: u8, target: u8, margin: u8) -> bool {
    value.abs_diff(target) <= margin
}

/// Lock-in shape test: either phase near the nominal duration or its half.
fn plausible(pulse: Pulse, nominal: u8, margin: u8) -> bool {
    let half = nominal / 2;
    within(pulse.low, nominal, margin)
        || within(pulse.low, half, margin)
        || within(pulse.high, nominal, margin)
        || within(pulse.high, half, margin)
}

impl<TX, RX, ANT, SER> Bridge<TX, RX, ANT, SER>
where
    TX: OutputPin,
    RX: InputPin,
    ANT: OutputPin,
    SER: Read + Write,
{
    /// One scheduler step of the OOK decoder.
    ///
    /// After lock-in, a low phase a full nominal duration wide stuffs a
    /// zero and a high phase a full duration wide stuffs a one; a cycle
    /// where both hold stuffs both, zero first.
    pub(crate) fn ook_step(&mut self) {
        loop {
            let pi = self.ook.pi;
            let pulse = self.ring.get(pi);
            if pi == self.ring.current && !pulse.is_end_marker() {
                return;
            }
            let margin = self.frame.sync_duration / 8;
            if !self.ook.committed {
                if pulse.is_end_marker() || !plausible(pulse, self.frame.sync_duration, margin) {
                    self.decode_failed(pi);
                    return;
                }
                self.ook.matched += 1;
                self.ook.pi = pi.wrapping_add(1);
                if self.ook.matched == OOK_LOCKIN_PULSES {
                    self.ook.committed = true;
                    self.frame.decoded = true;
                    self.ook.pi = self.ring.msg_start;
                    self.emit_header();
                }
            } else {
                if pulse.is_end_marker() {
                    self.decode_done(pi);
                    return;
                }
                if within(pulse.low, self.frame.sync_duration, margin) {
                    self.stuff_bit(false);
                }
                if within(pulse.high, self.frame.sync_duration, margin) {
                    self.stuff_bit(true);
                }
                self.ook.pi = pi.wrapping_add(1);
            }
        }
    }
}

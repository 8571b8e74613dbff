//! Line emitter: hex framing, MSB-first bit packing and the additive
//! checksum.
//!
//! Every outbound frame is one ASCII line: `M<type>:<hex payload>` followed
//! by the trailer `#<bit count>!<nominal duration>*<checksum>`. The checksum
//! is additive: a `0x55` seed plus every payload byte plus the two trailer
//! values, modulo 256. A line that fails it is dropped, never repaired.

use crate::consts::SATURATED_TICKS;
use crate::demod::Modulation;
use crate::driver::{Bridge, RunningState};
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal_nb::serial::{Read, Write};
use nb::block;

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

impl<TX, RX, ANT, SER> Bridge<TX, RX, ANT, SER>
where
    TX: OutputPin,
    RX: InputPin,
    ANT: OutputPin,
    SER: Read + Write,
{
    /// Blocking write of one byte to the host link.
    pub(crate) fn put_byte(&mut self, byte: u8) {
        let _ = block!(self.serial.write(byte));
    }

    pub(crate) fn put_str(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.put_byte(byte);
        }
    }

    /// Two uppercase hex digits. Pure output; checksum folding stays at the
    /// call sites so headers and trailers can opt out.
    pub(crate) fn put_hex(&mut self, value: u8) {
        self.put_byte(HEX_DIGITS[(value >> 4) as usize]);
        self.put_byte(HEX_DIGITS[(value & 0x0f) as usize]);
    }

    /// Emits the `M<type>:` frame header. Header bytes are not part of the
    /// checksum.
    pub(crate) fn emit_header(&mut self) {
        self.put_byte(b'M');
        self.put_byte(self.frame.msg_type.code());
        self.put_byte(b':');
    }

    /// Shifts one decoded bit into the accumulator, MSB first; every eighth
    /// bit flushes a payload byte to the line and into the checksum.
    pub(crate) fn stuff_bit(&mut self, bit: bool) {
        self.frame.byte = (self.frame.byte << 1) | bit as u8;
        self.frame.bit_count = self.frame.bit_count.wrapping_add(1);
        if self.frame.bit_count & 7 == 0 {
            let byte = self.frame.byte;
            self.put_hex(byte);
            self.frame.checksum = self.frame.checksum.wrapping_add(byte);
            self.frame.byte = 0;
        }
    }

    /// The `DecodeDone` step: flush any partial byte, emit the trailer and
    /// hand the ring back to sync search.
    ///
    /// The trailer folds the bit count and the nominal duration into the
    /// checksum before printing it, which is what lets a receiver verify
    /// the whole line with one running sum.
    pub(crate) fn finish_frame(&mut self) {
        if self.frame.msg_type != Modulation::Pulses && self.frame.bit_count & 7 != 0 {
            // Trailing bits, low-aligned, as one final payload byte.
            let byte = self.frame.byte;
            self.put_hex(byte);
            self.frame.checksum = self.frame.checksum.wrapping_add(byte);
            self.frame.byte = 0;
        }
        let bits = self.frame.bit_count;
        let nominal = self.frame.sync_duration;
        self.put_byte(b'#');
        self.put_hex(bits);
        self.put_byte(b'!');
        self.put_hex(nominal);
        self.frame.checksum = self.frame.checksum.wrapping_add(bits).wrapping_add(nominal);
        let checksum = self.frame.checksum;
        self.put_byte(b'*');
        self.put_hex(checksum);
        self.put_byte(b'\n');
        self.frames_out += 1;
        debug_log!("frame out: {} bits at {} ticks", bits, nominal);
        // Resume scanning right at the slot that terminated the frame; it
        // reseeds the next candidate once the sampler moves past it.
        self.sync.restart(self.ring.msg_end);
        self.frame.sync_duration = 0;
        self.running = RunningState::SyncSearch;
    }

    /// `STACK` report: one hex byte per task naming its resumable-state
    /// footprint, the state-machine analogue of stack headroom.
    pub(crate) fn emit_stack_report(&mut self) {
        use crate::command::CommandTask;
        use crate::demod::ask::AskDecode;
        use crate::demod::manchester::ManchesterDecode;
        use crate::demod::ook::OokDecode;
        use crate::demod::pulses::PulseDump;
        use crate::sync::SyncSearch;
        use core::mem::size_of;

        let sizes = [
            size_of::<SyncSearch>(),
            size_of::<AskDecode>(),
            size_of::<OokDecode>(),
            size_of::<ManchesterDecode>(),
            size_of::<PulseDump>(),
            size_of::<CommandTask>(),
        ];
        self.put_str(b"S:");
        for size in sizes {
            self.put_hex(size.min(SATURATED_TICKS as usize) as u8);
        }
        self.put_byte(b'\n');
    }
}

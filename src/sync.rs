//! Sync search: find the start of a coherent pulse train and classify it.
//!
//! The searcher walks the ring behind the sampler looking for eight
//! consecutive cycles of roughly equal duration. The nominal duration is a
//! running low-pass average rather than the first cycle seen, because many
//! transmitters start slow and settle over the first few cycles. Long
//! cycles are shape-normalized first so trains that alternate full-clock
//! and half-clock pulses (Manchester, and OOK with two-width off phases)
//! still read as one consistent train.

use crate::consts::{
    LONG_CYCLE_TICKS, MANCHESTER_MIN_HITS, MIN_CYCLE_TICKS, OOK_MIN_SYNC, SYNC_PULSES,
    SYNC_TOLERANCE,
};
use crate::demod::Modulation;
use crate::driver::{Bridge, RunningState};
use crate::ring::Pulse;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal_nb::serial::{Read, Write};

/// Resumable state of the sync-search task.
#[derive(Clone, Copy, Default, Debug)]
pub(crate) struct SyncSearch {
    /// Private read cursor, always at or behind the sampler.
    pub(crate) pi: u8,
    /// Slot where the candidate train began.
    pub(crate) start: u8,
    /// Consecutive matching cycles so far, capped at [`SYNC_PULSES`].
    pub(crate) len: u8,
    /// How many of those cycles had near-equal halves.
    pub(crate) hits: u8,
}

impl SyncSearch {
    /// Drops the candidate train and resumes scanning at `at`.
    pub(crate) fn restart(&mut self, at: u8) {
        self.pi = at;
        self.start = at;
        self.len = 0;
        self.hits = 0;
    }
}

/// Halves the phases of long cycles so alternating pulse shapes compare as
/// one duration.
///
/// Applied before the acceptance test in sync search and in the Manchester
/// lock-in, never during bit decoding: the decoders need the raw halves.
pub(crate) fn normalize(pulse: Pulse, sync_duration: u8) -> (u16, u16) {
    let mut p0 = pulse.low as u16;
    let mut p1 = pulse.high as u16;
    let d = p0 + p1;
    if d > LONG_CYCLE_TICKS {
        let near = d / 8;
        if (p0 / 2).abs_diff(p1) < near {
            p0 /= 2;
        } else if (p1 / 2).abs_diff(p0) < near {
            p1 /= 2;
        } else if (d / 2).abs_diff(sync_duration as u16) < near {
            p0 /= 2;
            p1 /= 2;
        }
    }
    (p0, p1)
}

impl<TX, RX, ANT, SER> Bridge<TX, RX, ANT, SER>
where
    TX: OutputPin,
    RX: InputPin,
    ANT: OutputPin,
    SER: Read + Write,
{
    /// One scheduler step of the sync searcher.
    ///
    /// Consumes every pulse the sampler has finished, then yields. Each
    /// mismatch reseeds the candidate with the offending cycle, so a train
    /// preceded by noise locks at its true start.
    pub(crate) fn sync_step(&mut self) {
        loop {
            if self.sync.pi == self.ring.current {
                return;
            }
            let pulse = self.ring.get(self.sync.pi);
            let (p0, p1) = normalize(pulse, self.frame.sync_duration);
            let d = p0 + p1;
            let nominal = self.frame.sync_duration as u16;
            if d >= MIN_CYCLE_TICKS && d.abs_diff(nominal) <= SYNC_TOLERANCE {
                if p1.abs_diff(p0) < d / 8 {
                    self.sync.hits += 1;
                }
                // Low-pass toward the observed duration; transmitters often
                // start slow.
                let adjusted = nominal as i16 + (d as i16 - nominal as i16) / 2;
                self.frame.sync_duration = adjusted.clamp(0, 255) as u8;
                if self.sync.len < SYNC_PULSES {
                    self.sync.len += 1;
                }
            } else {
                self.sync.start = self.sync.pi;
                self.frame.sync_duration = d.min(255) as u8;
                self.sync.len = 0;
                self.sync.hits = 0;
            }
            self.sync.pi = self.sync.pi.wrapping_add(1);
            if self.sync.len == SYNC_PULSES {
                self.commit_sync();
                return;
            }
        }
    }

    /// Locks onto the candidate train: pick a demodulator and seed the
    /// frame state.
    fn commit_sync(&mut self) {
        let start = self.sync.start;
        self.ring.msg_start = start;
        self.ring.msg_end = 0;
        let choice = if self.display_pulses {
            Modulation::Pulses
        } else if self.frame.sync_duration > OOK_MIN_SYNC {
            Modulation::Ook
        } else if self.sync.hits > MANCHESTER_MIN_HITS {
            Modulation::Manchester
        } else {
            Modulation::Ask
        };
        self.frame.begin(choice);
        debug_log!(
            "sync locked at {} ticks, {} symmetric cycles",
            self.frame.sync_duration,
            self.sync.hits
        );
        match choice {
            Modulation::Ask => {
                self.ask.reset(start);
                self.running = RunningState::DecodeAsk;
            }
            Modulation::Ook => {
                self.ook.reset(start);
                self.running = RunningState::DecodeOok;
            }
            Modulation::Manchester => {
                self.manchester.reset(start);
                self.running = RunningState::DecodeManchester;
            }
            Modulation::Pulses => {
                // No lock-in for the raw dump: commit immediately.
                self.raw.reset(start);
                self.frame.decoded = true;
                self.emit_header();
                self.running = RunningState::DecodePulses;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_leaves_short_cycles_alone() {
        let p = Pulse {
            low: 0x24,
            high: 0x0c,
        };
        assert_eq!(normalize(p, 0x30), (0x24, 0x0c));
    }

    #[test]
    fn normalize_halves_double_length_low_phase() {
        // A full-clock low against a half-clock high.
        let p = Pulse {
            low: 0x50,
            high: 0x28,
        };
        assert_eq!(normalize(p, 0x50), (0x28, 0x28));
    }

    #[test]
    fn normalize_halves_double_length_high_phase() {
        let p = Pulse {
            low: 0x28,
            high: 0x50,
        };
        assert_eq!(normalize(p, 0x50), (0x28, 0x28));
    }

    #[test]
    fn normalize_halves_double_length_cycle() {
        // Both phases doubled: only the nominal-duration rule catches it.
        let p = Pulse {
            low: 0x50,
            high: 0x50,
        };
        assert_eq!(normalize(p, 0x50), (0x28, 0x28));
    }

    #[cfg(feature = "std")]
    mod classify {
        use crate::driver::{Bridge, RunningState};
        use crate::ring::Pulse;
        use crate::testutil::{SimPin, SimSerial, load_ring};

        fn bridge() -> Bridge<SimPin, SimPin, SimPin, SimSerial> {
            Bridge::new(SimPin::new(), SimPin::new(), None, SimSerial::new())
        }

        #[test]
        fn uniform_asymmetric_train_classifies_ask() {
            let mut b = bridge();
            load_ring(&mut b, &[Pulse { low: 0x10, high: 0x40 }; 9]);
            b.poll();
            assert_eq!(b.running, RunningState::DecodeAsk);
            assert_eq!(b.ring.msg_start, 0);
            assert_eq!(b.frame.sync_duration, 0x50);
        }

        #[test]
        fn symmetric_train_classifies_manchester() {
            let mut b = bridge();
            load_ring(&mut b, &[Pulse { low: 0x28, high: 0x28 }; 9]);
            b.poll();
            assert_eq!(b.running, RunningState::DecodeManchester);
        }

        #[test]
        fn long_cycle_train_classifies_ook() {
            let mut b = bridge();
            load_ring(&mut b, &[Pulse { low: 0x50, high: 0x48 }; 9]);
            b.poll();
            assert_eq!(b.running, RunningState::DecodeOok);
        }

        #[test]
        fn display_flag_routes_to_raw_dump() {
            let mut b = bridge();
            b.display_pulses = true;
            load_ring(&mut b, &[Pulse { low: 0x10, high: 0x40 }; 9]);
            b.poll();
            assert_eq!(b.running, RunningState::DecodePulses);
        }

        #[test]
        fn drifting_train_still_locks() {
            // Cycle duration shrinking from 0x90 toward 0x60: the low-pass
            // nominal must track and lock-in must still happen.
            let mut b = bridge();
            let mut pulses = Vec::new();
            for i in 0..20u16 {
                let d = 0x90 - i * 2;
                let half = (d / 2) as u8;
                pulses.push(Pulse {
                    low: half,
                    high: (d - half as u16) as u8,
                });
            }
            load_ring(&mut b, &pulses);
            b.poll();
            assert_ne!(b.running, RunningState::SyncSearch);
        }

        #[test]
        fn noise_reseeds_candidate() {
            let mut b = bridge();
            let mut pulses = vec![Pulse { low: 0x05, high: 0x03 }; 6];
            pulses.extend([Pulse { low: 0x10, high: 0x40 }; 9]);
            load_ring(&mut b, &pulses);
            b.poll();
            assert_eq!(b.running, RunningState::DecodeAsk);
            assert_eq!(b.ring.msg_start, 6);
        }
    }
}

//! Shared test fixtures: scripted level pins, a captured serial port and
//! pulse/ring helpers.
//!
//! The transaction mocks from `embedded-hal-mock` are a poor fit for
//! simulation-style tests that tick the driver thousands of times, so these
//! fakes share their state behind `Arc<Mutex<_>>` clones instead: the test
//! keeps one handle while the bridge owns the other.

use crate::driver::Bridge;
use crate::ring::Pulse;
use core::convert::Infallible;
use embedded_hal::digital::{self, InputPin, OutputPin};
use embedded_hal_nb::serial::{self, Read, Write};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct PinShared {
    queue: VecDeque<bool>,
    level: bool,
    trace: Vec<bool>,
    saw_high: bool,
}

/// A pin fake that replays queued input levels and records output levels.
#[derive(Clone, Debug, Default)]
pub(crate) struct SimPin {
    shared: Arc<Mutex<PinShared>>,
}

impl SimPin {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queues input samples; once drained the pin holds its last level.
    pub(crate) fn queue_levels(&self, levels: &[bool]) {
        self.shared.lock().unwrap().queue.extend(levels.iter().copied());
    }

    pub(crate) fn queued(&self) -> usize {
        self.shared.lock().unwrap().queue.len()
    }

    /// Current driven or sampled level.
    pub(crate) fn level(&self) -> bool {
        self.shared.lock().unwrap().level
    }

    /// Whether the pin was ever driven high.
    pub(crate) fn saw_high(&self) -> bool {
        self.shared.lock().unwrap().saw_high
    }

    /// Drains the per-write level trace.
    pub(crate) fn take_trace(&self) -> Vec<bool> {
        core::mem::take(&mut self.shared.lock().unwrap().trace)
    }
}

impl digital::ErrorType for SimPin {
    type Error = Infallible;
}

impl InputPin for SimPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        let mut shared = self.shared.lock().unwrap();
        if let Some(level) = shared.queue.pop_front() {
            shared.level = level;
        }
        Ok(shared.level)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|level| !level)
    }
}

impl OutputPin for SimPin {
    fn set_high(&mut self) -> Result<(), Self::Error> {
        let mut shared = self.shared.lock().unwrap();
        shared.level = true;
        shared.saw_high = true;
        shared.trace.push(true);
        Ok(())
    }

    fn set_low(&mut self) -> Result<(), Self::Error> {
        let mut shared = self.shared.lock().unwrap();
        shared.level = false;
        shared.trace.push(false);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct SerialShared {
    input: VecDeque<u8>,
    output: Vec<u8>,
}

/// A serial fake: queued input bytes, captured output bytes.
#[derive(Clone, Debug, Default)]
pub(crate) struct SimSerial {
    shared: Arc<Mutex<SerialShared>>,
}

impl SimSerial {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn queue_input(&self, bytes: &[u8]) {
        self.shared.lock().unwrap().input.extend(bytes.iter().copied());
    }

    /// Drains everything the bridge wrote, as text.
    pub(crate) fn take_output(&self) -> String {
        let bytes = core::mem::take(&mut self.shared.lock().unwrap().output);
        String::from_utf8(bytes).expect("bridge output is ASCII")
    }
}

impl serial::ErrorType for SimSerial {
    type Error = Infallible;
}

impl Read for SimSerial {
    fn read(&mut self) -> nb::Result<u8, Self::Error> {
        self.shared
            .lock()
            .unwrap()
            .input
            .pop_front()
            .ok_or(nb::Error::WouldBlock)
    }
}

impl Write for SimSerial {
    fn write(&mut self, word: u8) -> nb::Result<(), Self::Error> {
        self.shared.lock().unwrap().output.push(word);
        Ok(())
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        Ok(())
    }
}

/// Writes `pulses` into the ring starting at slot 0 and parks the write
/// head one past them, as if the sampler had just finished the last one.
pub(crate) fn load_ring<TX, RX, ANT, SER>(bridge: &mut Bridge<TX, RX, ANT, SER>, pulses: &[Pulse])
where
    TX: OutputPin,
    RX: InputPin,
    ANT: OutputPin,
    SER: Read + Write,
{
    for (index, pulse) in pulses.iter().enumerate() {
        bridge.ring.set(index as u8, *pulse);
    }
    bridge.ring.current = pulses.len() as u8;
}

/// Runs `n` scheduler steps with no timer activity.
pub(crate) fn run_polls<TX, RX, ANT, SER>(bridge: &mut Bridge<TX, RX, ANT, SER>, n: usize)
where
    TX: OutputPin,
    RX: InputPin,
    ANT: OutputPin,
    SER: Read + Write,
{
    for _ in 0..n {
        bridge.poll();
    }
}

/// Runs `n` simulated timer periods, one tick and one poll each.
pub(crate) fn run_cycles<TX, RX, ANT, SER>(bridge: &mut Bridge<TX, RX, ANT, SER>, n: usize)
where
    TX: OutputPin,
    RX: InputPin,
    ANT: OutputPin,
    SER: Read + Write,
{
    for _ in 0..n {
        bridge.tick();
        bridge.poll();
    }
}

/// Expands bytes to ASK pulses the way the command parser does: MSB first,
/// a one bit long-high/short-low.
pub(crate) fn ask_pulses(bytes: &[u8], nominal: u8) -> Vec<Pulse> {
    let short = nominal / 4;
    let long = nominal - short;
    let mut pulses = Vec::with_capacity(bytes.len() * 8);
    for &byte in bytes {
        for bit in (0..8).rev() {
            pulses.push(if byte & (1 << bit) != 0 {
                Pulse {
                    low: short,
                    high: long,
                }
            } else {
                Pulse {
                    low: long,
                    high: short,
                }
            });
        }
    }
    pulses
}

/// Receiver-pin level script for a pulse train: a low lead-in, each pulse
/// high-then-low, and one closing edge so the final pulse gets measured.
pub(crate) fn levels_for(pulses: &[(u8, u8)], lead_low: usize) -> Vec<bool> {
    let mut levels = vec![false; lead_low];
    for &(low, high) in pulses {
        levels.extend(std::iter::repeat(true).take(high as usize));
        levels.extend(std::iter::repeat(false).take(low as usize));
    }
    levels.push(true);
    levels
}

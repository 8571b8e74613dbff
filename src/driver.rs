//! Pulse-level RF bridge driver for 433 MHz ASK/OOK transceivers.
//!
//! This module provides the [`Bridge`] struct: a software pulse engine that
//! measures the receiver pin into a circular buffer from a timer tick,
//! demodulates captured trains into serial frames, and replays ring ranges
//! through the transmitter pin on command.
//!
//! The driver is split across two execution contexts:
//!
//! - [`tick()`](Bridge::tick) is the timer interrupt path. Depending on the
//!   transceiver mode it either samples the receiver pin into the pulse ring
//!   or replays the staged ring range to the transmitter pin. It is short,
//!   bounded, and must be called at a fixed rate.
//! - [`poll()`](Bridge::poll) is the main-loop path. It dispatches exactly
//!   one cooperative task per call (sync search, a decoder, the trailer
//!   emission, or the command parser) based on the current
//!   [`RunningState`]. Tasks suspend themselves whenever they catch up with
//!   the sampler or run out of serial input, so `poll()` never blocks.
//!
//! A third entry point, [`on_serial_interrupt()`](Bridge::on_serial_interrupt),
//! drains the UART into a fixed-size byte queue from the receive interrupt.
//!
//! ## Example
//!
//! ```rust
//! # use embedded_hal_mock::eh1::digital::{Mock as Pin, State as PinState, Transaction as PinTransaction};
//! # use embedded_hal_mock::eh1::serial::Mock as Serial;
//! use bridge433::driver::Bridge;
//!
//! fn main() {
//!     # let tx_pin = Pin::new(&[PinTransaction::set(PinState::Low)]);
//!     # let rx_pin = Pin::new(&[PinTransaction::get(PinState::Low)]);
//!     # let serial: Serial<u8> = Serial::new(&[]);
//!     let mut bridge: Bridge<Pin, Pin, Pin, Serial<u8>> =
//!         Bridge::new(tx_pin, rx_pin, None, serial);
//!
//!     loop {
//!         bridge.tick(); // from the timer ISR, at the sampling rate
//!         bridge.poll(); // from the main loop, after any interrupt
//!         # break; // For testing purposes
//!     }
//!     # bridge.tx.done();
//!     # bridge.rx.done();
//!     # bridge.serial.done();
//! }
//! ```
//!
//! ## Design Notes
//!
//! The pulse ring is the only sampler-to-decoder channel. The sampler owns
//! the write head; decoders hold private cursors and suspend while caught
//! up, so every cross-context access is a single-byte read of a slot the
//! sampler has already left behind (or of a saturated, hence frozen, low
//! phase). A decoder that falls a full ring behind silently loses data; the
//! next sync re-acquires within eight pulses.

use crate::consts::{CMD_TIMEOUT_TICKS, GLITCH_TICKS, UART_RING_LEN};
use crate::demod::Frame;
use crate::demod::ask::AskDecode;
use crate::demod::manchester::ManchesterDecode;
use crate::demod::ook::OokDecode;
use crate::demod::pulses::PulseDump;
use crate::ring::{Pulse, PulseRing};
use crate::sync::SyncSearch;
use crate::command::CommandTask;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal_nb::serial::{Read, Write};
use heapless::Deque;

/// Half-duplex transceiver mode, gating which timer compare path does work.
///
/// The transmit driver reverts to [`Idle`](TransceiverMode::Idle) on its own
/// once the staged ring range is exhausted; every other transition goes
/// through [`Bridge::enable_receiver`], [`Bridge::enable_transmitter`] or
/// [`Bridge::disable_transceiver`].
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum TransceiverMode {
    /// Neither path armed; the antenna relay is released.
    #[default]
    Idle,
    /// The sampler measures the receiver pin into the pulse ring.
    Receiving,
    /// Transmission requested; the next tick latches the first pulse.
    StartTransmit,
    /// The replay driver is clocking pulses out of the ring.
    Transmitting,
}

/// Which cooperative task owns the next [`Bridge::poll`] step.
///
/// Decoders move themselves back to [`SyncSearch`](RunningState::SyncSearch)
/// on lock-in failure and to [`DecodeDone`](RunningState::DecodeDone) on
/// message end; pending serial input preempts any of the receive states into
/// [`ReceivingCommand`](RunningState::ReceivingCommand).
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum RunningState {
    /// Scanning for eight consecutive matching cycles.
    #[default]
    SyncSearch,
    /// Wide-vs-narrow pulse decoding.
    DecodeAsk,
    /// Full/half cycle-width decoding.
    DecodeOok,
    /// Demi-clock transition decoding.
    DecodeManchester,
    /// Raw pulse-pair dump (learning mode).
    DecodePulses,
    /// Transient: flush the partial byte, emit the trailer, resume sync.
    DecodeDone,
    /// Parsing an inbound serial line.
    ReceivingCommand,
}

/// Software image of the two timer compare interrupt enables.
///
/// On hardware these map to the RX and TX compare channel mask bits; at most
/// one is ever set, which is the half-duplex contract the tests pin down.
#[derive(Clone, Copy, Default, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub(crate) struct CompareMask {
    pub(crate) rx_armed: bool,
    pub(crate) tx_armed: bool,
}

/// Replay bookkeeping local to the transmit tick path.
#[derive(Clone, Copy, Default, Debug)]
pub(crate) struct Replay {
    /// Remaining ticks of the current slot, indexed by phase (0 = low).
    rem: [u8; 2],
    /// Phase currently driven onto the transmitter pin.
    bit: bool,
}

/// A software pulse-capture and replay engine for 433 MHz ASK/OOK
/// transceivers.
///
/// `Bridge` owns the receiver, transmitter and optional antenna-select pins
/// plus the serial port, and runs the whole receive pipeline (sampler →
/// sync search → demodulator → line emitter) and the transmit pipeline
/// (command parser → ring → replay driver) over them.
///
/// ## Type Parameters
///
/// - `TX`: transmitter data pin, [`embedded_hal::digital::OutputPin`]
/// - `RX`: receiver data pin, [`embedded_hal::digital::InputPin`]
/// - `ANT`: optional RF path select pin (receive = low, transmit = high)
/// - `SER`: serial port implementing the `embedded-hal-nb` serial traits
///
/// ## Notes
///
/// - Only one `Bridge` should be active per radio; the `timer-isr` feature
///   provides a `critical-section` global for interrupt-driven use.
/// - Pin and serial errors are ignored at the call sites: the supported
///   HALs are infallible on plain GPIO writes, and there is no useful
///   recovery inside an interrupt handler anyway.
#[derive(Debug)]
pub struct Bridge<TX, RX, ANT, SER>
where
    TX: OutputPin,
    RX: InputPin,
    ANT: OutputPin,
    SER: Read + Write,
{
    /// Current transceiver mode.
    pub mode: TransceiverMode,
    /// Task owning the next `poll()` step.
    pub running: RunningState,
    /// Transmitter data pin.
    pub tx: TX,
    /// Receiver data pin.
    pub rx: RX,
    /// Optional antenna/RF-path select pin.
    pub antenna: Option<ANT>,
    /// Serial port carrying the line protocol.
    pub serial: SER,
    /// The shared pulse ring.
    pub ring: PulseRing,
    /// When set, captured trains are dumped as raw pulse pairs (`MP:`)
    /// instead of being demodulated. Toggled by `PULSE`/`DEMOD` commands.
    pub display_pulses: bool,
    /// Frames emitted since power-on.
    pub frames_out: u16,
    /// Command lines accepted with `*OK`.
    pub cmd_ok: u16,
    /// Command lines rejected or timed out.
    pub cmd_err: u16,
    /// Serial bytes dropped because the receive queue was full.
    pub uart_overruns: u16,
    pub(crate) masks: CompareMask,
    pub(crate) replay: Replay,
    pub(crate) frame: Frame,
    pub(crate) sync: SyncSearch,
    pub(crate) ask: AskDecode,
    pub(crate) ook: OokDecode,
    pub(crate) manchester: ManchesterDecode,
    pub(crate) raw: PulseDump,
    pub(crate) cmd: CommandTask,
    pub(crate) uart: Deque<u8, UART_RING_LEN>,
    pub(crate) tickcount: u16,
    last_level: bool,
}

impl<TX, RX, ANT, SER> Bridge<TX, RX, ANT, SER>
where
    TX: OutputPin,
    RX: InputPin,
    ANT: OutputPin,
    SER: Read + Write,
{
    /// Creates a new `Bridge` over the given pins and serial port and arms
    /// the receiver.
    ///
    /// # Arguments
    /// - `tx`: transmitter data pin, driven low immediately (carrier off)
    /// - `rx`: receiver data pin
    /// - `antenna`: optional RF path select; cleared for receive
    /// - `serial`: the host link, 115200 8N1 on the reference board
    ///
    /// # Returns
    /// A bridge in [`TransceiverMode::Receiving`] with all cursors and
    /// counters zeroed, ready for scheduled `tick()`/`poll()` calls.
    pub fn new(tx: TX, rx: RX, antenna: Option<ANT>, serial: SER) -> Self {
        let mut tx = tx;
        let _ = tx.set_low(); // Ensure carrier off
        let mut bridge = Self {
            mode: TransceiverMode::Idle,
            running: RunningState::SyncSearch,
            tx,
            rx,
            antenna,
            serial,
            ring: PulseRing::new(),
            display_pulses: false,
            frames_out: 0,
            cmd_ok: 0,
            cmd_err: 0,
            uart_overruns: 0,
            masks: CompareMask::default(),
            replay: Replay::default(),
            frame: Frame::default(),
            sync: SyncSearch::default(),
            ask: AskDecode::default(),
            ook: OokDecode::default(),
            manchester: ManchesterDecode::default(),
            raw: PulseDump::default(),
            cmd: CommandTask::default(),
            uart: Deque::new(),
            tickcount: 0,
            last_level: false,
        };
        bridge.enable_receiver();
        bridge
    }

    fn write_tx(&mut self, level: bool) {
        if level {
            let _ = self.tx.set_high();
        } else {
            let _ = self.tx.set_low();
        }
    }

    fn write_antenna(&mut self, level: bool) {
        if let Some(ref mut antenna) = self.antenna {
            if level {
                let _ = antenna.set_high();
            } else {
                let _ = antenna.set_low();
            }
        }
    }

    /// Switches the RF path to receive and arms the sampler compare path.
    ///
    /// Both compare paths are cleared first so that no instant exists with
    /// both armed.
    pub fn enable_receiver(&mut self) {
        self.masks = CompareMask::default();
        self.write_antenna(false);
        self.mode = TransceiverMode::Receiving;
        self.last_level = false;
        self.masks.rx_armed = true;
    }

    /// Switches the RF path to transmit and arms the replay compare path.
    ///
    /// The first replay tick latches `ring[msg_start]`; the driver reverts
    /// to [`TransceiverMode::Idle`] by itself when `current` reaches
    /// `msg_end`.
    pub fn enable_transmitter(&mut self) {
        self.masks = CompareMask::default();
        self.write_antenna(true);
        self.mode = TransceiverMode::StartTransmit;
        self.masks.tx_armed = true;
    }

    /// Disarms both compare paths and releases the antenna.
    pub fn disable_transceiver(&mut self) {
        self.masks = CompareMask::default();
        self.write_antenna(false);
        self.mode = TransceiverMode::Idle;
    }

    /// Advances the bridge by one timer tick.
    ///
    /// Call this from the timer compare interrupt at the sampling rate (see
    /// [`crate::timer`] for tuning). In receive mode it measures the
    /// receiver pin into the ring; in transmit mode it clocks the staged
    /// range out of the ring. The global tick counter advances regardless
    /// of mode, which is what the command parser's idle timeout counts.
    pub fn tick(&mut self) {
        self.tickcount = self.tickcount.wrapping_add(1);
        if self.masks.rx_armed && self.mode == TransceiverMode::Receiving {
            self.sample();
        } else if self.masks.tx_armed {
            match self.mode {
                TransceiverMode::StartTransmit => self.replay_start(),
                TransceiverMode::Transmitting => self.replay_step(),
                _ => {}
            }
        }
    }

    /// One sampler tick: measure the receiver level into the write slot.
    ///
    /// Both phases of every cycle are counted so the decoders can inspect
    /// pulse shape without a second pass. A rising edge finishes the slot;
    /// slots where neither phase cleared the glitch threshold are reused in
    /// place, which drops sub-threshold spikes before they reach the ring.
    fn sample(&mut self) {
        let level = self.rx.is_high().unwrap_or(false);
        let head = self.ring.current;
        self.ring.bump(head, level);
        if level && !self.last_level {
            let finished = self.ring.get(head);
            if finished.low > GLITCH_TICKS || finished.high > GLITCH_TICKS {
                self.ring.current = head.wrapping_add(1);
            }
            let head = self.ring.current;
            self.ring.clear(head);
        }
        self.last_level = level;
    }

    /// First transmit tick: latch the pulse at `msg_start` and raise the
    /// carrier.
    fn replay_start(&mut self) {
        self.write_tx(true);
        self.ring.current = self.ring.msg_start;
        let pulse = self.ring.get(self.ring.current);
        self.replay.rem = [pulse.low, pulse.high];
        self.replay.bit = true;
        self.mode = TransceiverMode::Transmitting;
    }

    /// Replay tick: burn one tick off the current phase, advancing through
    /// the ring until `msg_end`.
    fn replay_step(&mut self) {
        let phase = self.replay.bit as usize;
        self.replay.rem[phase] = self.replay.rem[phase].wrapping_sub(1);
        if self.replay.rem[phase] == 0 {
            if self.replay.bit {
                self.replay.bit = false;
            } else {
                // Cycle complete
                self.ring.current = self.ring.current.wrapping_add(1);
                if self.ring.current == self.ring.msg_end {
                    self.write_tx(false);
                    self.mode = TransceiverMode::Idle;
                    return;
                }
                let pulse = self.ring.get(self.ring.current);
                self.replay.rem = [pulse.low, pulse.high];
                // A zero high phase is skipped outright
                self.replay.bit = self.replay.rem[1] != 0;
            }
        }
        let bit = self.replay.bit;
        self.write_tx(bit);
    }

    /// Drains the serial port into the receive byte queue.
    ///
    /// Call from the UART receive interrupt. Bytes that do not fit are
    /// dropped and counted in [`uart_overruns`](Bridge::uart_overruns).
    pub fn on_serial_interrupt(&mut self) {
        while let Ok(byte) = self.serial.read() {
            self.push_serial_byte(byte);
        }
    }

    /// Queues one inbound serial byte, bypassing the port.
    ///
    /// Hosted runtimes and tests use this to inject command bytes directly.
    pub fn push_serial_byte(&mut self, byte: u8) {
        if self.uart.push_back(byte).is_err() {
            self.uart_overruns += 1;
        }
    }

    /// Runs one cooperative scheduler step.
    ///
    /// Call from the main loop whenever an interrupt may have produced work
    /// (the reference firmware sleeps the CPU and polls once per wake-up).
    /// Pending serial input cancels any in-flight decode first: the
    /// transceiver is disabled and the command parser takes over until the
    /// line is resolved.
    pub fn poll(&mut self) {
        if !self.uart.is_empty() && self.running != RunningState::ReceivingCommand {
            debug_log!("serial input pending, aborting receive");
            self.disable_transceiver();
            self.cmd.begin(self.tickcount);
            self.running = RunningState::ReceivingCommand;
        }
        match self.running {
            RunningState::SyncSearch => self.sync_step(),
            RunningState::DecodeAsk => self.ask_step(),
            RunningState::DecodeOok => self.ook_step(),
            RunningState::DecodeManchester => self.manchester_step(),
            RunningState::DecodePulses => self.pulses_step(),
            RunningState::DecodeDone => self.finish_frame(),
            RunningState::ReceivingCommand => self.command_step(),
        }
    }

    /// Routes a decoder lock-in failure.
    ///
    /// A train that was classified ASK but shows any near-symmetric cycles
    /// gets one retry as Manchester over the same window; everything else
    /// drops the window and resumes sync search at the offending pulse.
    pub(crate) fn decode_failed(&mut self, at: u8) {
        use crate::demod::Modulation;
        if self.frame.msg_type == Modulation::Ask && self.sync.hits > 0 && !self.frame.decoded {
            self.sync.hits = 0;
            let start = self.ring.msg_start;
            self.frame.begin(Modulation::Manchester);
            self.manchester.reset(start);
            self.running = RunningState::DecodeManchester;
            return;
        }
        self.ring.msg_start = at;
        self.sync.restart(at);
        self.frame.sync_duration = 0;
        self.running = RunningState::SyncSearch;
    }

    /// Marks the frame complete at `at` and hands off to the trailer
    /// emission step.
    pub(crate) fn decode_done(&mut self, at: u8) {
        self.ring.msg_end = at;
        self.running = RunningState::DecodeDone;
    }

    /// `tickcount` elapsed since `since`, wrap-aware. Feeds the command
    /// parser's idle timeout.
    pub(crate) fn ticks_since(&self, since: u16) -> u16 {
        self.tickcount.wrapping_sub(since)
    }

    /// Whether the command parser's inactivity budget is spent.
    pub(crate) fn serial_timed_out(&self, since: u16) -> bool {
        self.ticks_since(since) > CMD_TIMEOUT_TICKS
    }

    /// Stages a sentinel pulse so replay halts after `last + 1` slots.
    pub(crate) fn stage_end_marker(&mut self, at: u8) {
        self.ring.set(
            at,
            Pulse {
                low: crate::consts::SATURATED_TICKS,
                high: 0,
            },
        );
        self.ring.msg_end = at.wrapping_add(1);
        self.ring.msg_start = 0;
    }
}

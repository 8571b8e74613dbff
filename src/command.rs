//! Inbound command parser: the serial-to-antenna half of the bridge.
//!
//! Commands are single `\n`-terminated ASCII lines. A frame line mirrors
//! the emitter's output: an `M<type>` header, then `:` payload, `!` duration,
//! `#` bit count and `*` checksum tokens in any order. A matching checksum
//! stages the pulses in the ring and replays them three times.
//! Three bare keywords (`PULSE`, `DEMOD`, `STACK`) toggle the raw dump mode
//! and report task footprints.
//!
//! The parser is one of the cooperative tasks: it consumes whatever bytes
//! the UART interrupt has queued and yields when the queue runs dry,
//! counting ticks toward an inactivity timeout. While a triggered
//! transmission is on air it yields until the replay driver falls back to
//! idle on its own.

use crate::consts::{
    CMD_ASK_SYNC_SEED, CMD_MANCHESTER_SYNC_SEED, CMD_PAYLOAD_MAX, MIN_TX_BITS, TX_REPEATS,
};
use crate::demod::Modulation;
use crate::driver::{Bridge, RunningState, TransceiverMode};
use crate::ring::Pulse;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal_nb::serial::{Read, Write};
use heapless::Vec;

/// Why an inbound line was thrown away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum CommandError {
    /// A byte that does not fit the line grammar at this position. Echoed
    /// back as `!<byte>`.
    #[error("unexpected byte {0:#04x}")]
    Unexpected(u8),
    /// The `*` token did not match the accumulated checksum. Echoed back
    /// as `!*`.
    #[error("checksum mismatch")]
    Checksum,
    /// Serial input stalled mid-line; the line is dropped silently.
    #[error("serial idle timeout")]
    Timeout,
}

/// Which keyword command is being matched.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Keyword {
    DisplayPulses,
    Demod,
    Stack,
}

impl Keyword {
    /// Remainder of the keyword after its dispatch byte, newline included.
    fn tail(self) -> &'static [u8] {
        match self {
            Keyword::DisplayPulses => b"ULSE\n",
            Keyword::Demod => b"EMOD\n",
            Keyword::Stack => b"TACK\n",
        }
    }
}

/// Resumable state of the command parser task.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub(crate) enum CmdState {
    /// Expecting the first byte of a line.
    #[default]
    Dispatch,
    /// Matching the tail of a keyword command.
    KeywordTail { word: Keyword, at: u8 },
    /// Expecting the modulation letter after `M`.
    MsgType,
    /// Expecting a token introducer.
    Token,
    /// Reading hex payload after `:`.
    Payload { hi: Option<u8> },
    /// Reading the two-digit value of a `!`, `#` or `*` token.
    Hex2 { token: u8, hi: Option<u8> },
    /// Kick off one on-air repetition.
    StartRep { reps: u8 },
    /// Wait for the replay driver to go idle.
    WaitIdle { reps: u8 },
    /// Line accepted, expecting the terminating newline.
    ExpectEol,
    /// Discarding a rejected line up to its newline.
    Flush,
}

/// Task state plus the line-scoped scratch the tokens accumulate into.
#[derive(Debug, Default)]
pub(crate) struct CommandTask {
    pub(crate) state: CmdState,
    /// Tick of the most recent byte, for the inactivity timeout.
    last_rx_tick: u16,
    /// Buffered `:` payload for type-A lines; expanded only at transmit
    /// time so a later `!` token still applies.
    payload: Vec<u8, CMD_PAYLOAD_MAX>,
    /// First byte of a type-P pulse pair (the high phase).
    pending_high: Option<u8>,
    /// Ring write head for type-P pulse pairs.
    pulse_idx: u8,
}

impl CommandTask {
    /// Arms the parser for a fresh line.
    pub(crate) fn begin(&mut self, now: u16) {
        self.state = CmdState::Dispatch;
        self.last_rx_tick = now;
        self.payload.clear();
        self.pending_high = None;
        self.pulse_idx = 0;
    }
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

impl<TX, RX, ANT, SER> Bridge<TX, RX, ANT, SER>
where
    TX: OutputPin,
    RX: InputPin,
    ANT: OutputPin,
    SER: Read + Write,
{
    /// One scheduler step of the command parser.
    pub(crate) fn command_step(&mut self) {
        loop {
            if self.running != RunningState::ReceivingCommand {
                return;
            }
            match self.cmd.state {
                CmdState::StartRep { reps } => {
                    self.enable_transmitter();
                    self.cmd.state = CmdState::WaitIdle { reps };
                    return;
                }
                CmdState::WaitIdle { reps } => {
                    if self.mode != TransceiverMode::Idle {
                        return;
                    }
                    self.disable_transceiver();
                    if reps > 1 {
                        self.cmd.state = CmdState::StartRep { reps: reps - 1 };
                        continue;
                    }
                    self.cmd.state = CmdState::ExpectEol;
                    continue;
                }
                _ => {}
            }
            let Some(byte) = self.uart.pop_front() else {
                // Mid-line starvation: the host went away, give the radio
                // back to the sampler.
                if self.cmd.state != CmdState::Dispatch
                    && self.serial_timed_out(self.cmd.last_rx_tick)
                {
                    self.command_reject(CommandError::Timeout);
                }
                return;
            };
            self.cmd.last_rx_tick = self.tickcount;
            if let Err(err) = self.command_feed(byte) {
                self.command_reject(err);
            }
        }
    }

    /// Consumes one inbound byte in the current parser state.
    fn command_feed(&mut self, byte: u8) -> Result<(), CommandError> {
        match self.cmd.state {
            CmdState::Dispatch => match byte {
                b'M' => self.cmd.state = CmdState::MsgType,
                b'P' => {
                    self.cmd.state = CmdState::KeywordTail {
                        word: Keyword::DisplayPulses,
                        at: 0,
                    }
                }
                b'D' => {
                    self.cmd.state = CmdState::KeywordTail {
                        word: Keyword::Demod,
                        at: 0,
                    }
                }
                b'S' => {
                    self.cmd.state = CmdState::KeywordTail {
                        word: Keyword::Stack,
                        at: 0,
                    }
                }
                // A stray blank line costs nothing.
                b'\n' => self.command_exit(),
                _ => return Err(CommandError::Unexpected(byte)),
            },
            CmdState::KeywordTail { word, at } => {
                let tail = word.tail();
                if byte != tail[at as usize] {
                    return Err(CommandError::Unexpected(byte));
                }
                if at as usize + 1 == tail.len() {
                    self.keyword_done(word);
                } else {
                    self.cmd.state = CmdState::KeywordTail { word, at: at + 1 };
                }
            }
            CmdState::MsgType => {
                let msg_type = match byte {
                    b'A' => Modulation::Ask,
                    b'M' => Modulation::Manchester,
                    b'P' => Modulation::Pulses,
                    _ => return Err(CommandError::Unexpected(byte)),
                };
                self.frame.begin(msg_type);
                match msg_type {
                    Modulation::Ask => self.frame.sync_duration = CMD_ASK_SYNC_SEED,
                    Modulation::Manchester => {
                        self.frame.sync_duration = CMD_MANCHESTER_SYNC_SEED
                    }
                    // Type P keeps whatever a later `!` token sets.
                    _ => {}
                }
                self.cmd.state = CmdState::Token;
            }
            CmdState::Token => self.command_token(byte)?,
            CmdState::Payload { hi } => {
                if let Some(nibble) = hex_value(byte) {
                    match hi {
                        None => self.cmd.state = CmdState::Payload { hi: Some(nibble) },
                        Some(high) => {
                            self.payload_byte((high << 4) | nibble);
                            self.cmd.state = CmdState::Payload { hi: None };
                        }
                    }
                } else if hi.is_some() {
                    // A token introducer splitting a byte in half is noise.
                    return Err(CommandError::Unexpected(byte));
                } else {
                    self.cmd.state = CmdState::Token;
                    self.command_token(byte)?;
                }
            }
            CmdState::Hex2 { token, hi } => {
                let Some(nibble) = hex_value(byte) else {
                    return Err(CommandError::Unexpected(byte));
                };
                match hi {
                    None => {
                        self.cmd.state = CmdState::Hex2 {
                            token,
                            hi: Some(nibble),
                        }
                    }
                    Some(high) => {
                        self.cmd.state = CmdState::Token;
                        self.token_value(token, (high << 4) | nibble)?;
                    }
                }
            }
            CmdState::ExpectEol => {
                if byte != b'\n' {
                    return Err(CommandError::Unexpected(byte));
                }
                self.command_accept();
            }
            CmdState::Flush => {
                if byte == b'\n' {
                    self.command_exit();
                }
            }
            CmdState::StartRep { .. } | CmdState::WaitIdle { .. } => {}
        }
        Ok(())
    }

    fn command_token(&mut self, byte: u8) -> Result<(), CommandError> {
        match byte {
            b':' => self.cmd.state = CmdState::Payload { hi: None },
            b'!' | b'#' | b'*' => {
                self.cmd.state = CmdState::Hex2 {
                    token: byte,
                    hi: None,
                }
            }
            // A line that never claimed a checksum did nothing; accept it.
            b'\n' => self.command_accept(),
            _ => return Err(CommandError::Unexpected(byte)),
        }
        Ok(())
    }

    fn token_value(&mut self, token: u8, value: u8) -> Result<(), CommandError> {
        match token {
            b'!' => {
                self.frame.sync_duration = value;
                self.frame.checksum = self.frame.checksum.wrapping_add(value);
            }
            b'#' => {
                self.frame.bit_count = value;
                self.frame.checksum = self.frame.checksum.wrapping_add(value);
            }
            _ => {
                if value != self.frame.checksum {
                    return Err(CommandError::Checksum);
                }
                self.trigger_transmit();
            }
        }
        Ok(())
    }

    /// One `:` payload byte, checksummed and routed by message type.
    fn payload_byte(&mut self, byte: u8) {
        self.frame.checksum = self.frame.checksum.wrapping_add(byte);
        match self.frame.msg_type {
            Modulation::Pulses => match self.cmd.pending_high.take() {
                None => self.cmd.pending_high = Some(byte),
                Some(high) => {
                    let at = self.cmd.pulse_idx;
                    self.ring.set(at, Pulse { low: byte, high });
                    self.cmd.pulse_idx = at.wrapping_add(1);
                }
            },
            // Type A buffers for deferred expansion; type M is reserved
            // and only checksummed.
            _ => {
                let _ = self.cmd.payload.push(byte);
            }
        }
    }

    /// Checksum matched: stage the ring and start the on-air repetitions.
    fn trigger_transmit(&mut self) {
        let bits = self.frame.bit_count;
        if bits <= MIN_TX_BITS || self.frame.msg_type == Modulation::Manchester {
            // Too short to be a frame, or a reserved encoding: accept the
            // line but keep the transmitter cold.
            self.cmd.state = CmdState::ExpectEol;
            return;
        }
        if self.frame.msg_type == Modulation::Ask {
            self.expand_ask_payload();
        }
        self.stage_end_marker(bits);
        debug_log!("transmit staged: {} pulses", bits);
        self.cmd.state = CmdState::StartRep { reps: TX_REPEATS };
    }

    /// Expands buffered payload bytes into ring pulses, MSB first: a one
    /// bit is long-high/short-low, a zero bit the converse.
    fn expand_ask_payload(&mut self) {
        let nominal = self.frame.sync_duration;
        let short = nominal / 4;
        let long = nominal - short;
        let mut at: u8 = 0;
        for index in 0..self.cmd.payload.len() {
            let byte = self.cmd.payload[index];
            for bit in (0..8).rev() {
                let pulse = if byte & (1 << bit) != 0 {
                    Pulse {
                        low: short,
                        high: long,
                    }
                } else {
                    Pulse {
                        low: long,
                        high: short,
                    }
                };
                self.ring.set(at, pulse);
                at = at.wrapping_add(1);
            }
        }
    }

    fn keyword_done(&mut self, word: Keyword) {
        match word {
            Keyword::DisplayPulses => self.display_pulses = true,
            Keyword::Demod => self.display_pulses = false,
            Keyword::Stack => self.emit_stack_report(),
        }
        self.command_accept();
    }

    /// Successful line: acknowledge and hand the radio back.
    fn command_accept(&mut self) {
        self.put_str(b"*OK\n");
        self.cmd_ok += 1;
        self.command_exit();
    }

    /// Failed line: echo the reason and discard up to the newline.
    fn command_reject(&mut self, err: CommandError) {
        self.cmd_err += 1;
        debug_log!("command rejected: {}", err);
        match err {
            CommandError::Unexpected(byte) => {
                self.put_byte(b'!');
                self.put_byte(byte);
                self.put_byte(b'\n');
                if byte == b'\n' {
                    self.command_exit();
                } else {
                    self.cmd.state = CmdState::Flush;
                }
            }
            CommandError::Checksum => {
                self.put_str(b"!*\n");
                self.cmd.state = CmdState::Flush;
            }
            CommandError::Timeout => self.command_exit(),
        }
    }

    /// Clears line state, resets the ring cursors and resumes receiving.
    fn command_exit(&mut self) {
        self.cmd.begin(self.tickcount);
        self.ring.reset();
        self.frame.sync_duration = 0;
        self.sync.restart(0);
        self.enable_receiver();
        self.running = RunningState::SyncSearch;
    }
}

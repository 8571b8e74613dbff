//! Constants governing pulse capture, demodulation and the serial protocol.
//!
//! The tick values here assume the sampling timer is tuned so that the cycle
//! duration of a typical 433 MHz remote (~1 ms) lands in the `0x40..0x80`
//! tick range; see [`crate::timer`] for the compare-value math.
//!
//! ## Key Concepts
//!
//! - **Saturation**: a phase counter stuck at [`SATURATED_TICKS`] marks a
//!   pulse that stretched to the measurable maximum. A saturated *low* phase
//!   doubles as the end-of-message sentinel on both the receive and the
//!   transmit path.
//! - **Lock-in**: the number of consecutive shape-matching cycles a decoder
//!   requires before it commits and starts emitting.
//! - **Sync tolerance**: how far a cycle may drift from the adaptively
//!   averaged nominal duration and still count as part of the same train.

/// Number of slots in the pulse ring.
///
/// Exactly 256 so that `u8` cursor arithmetic wraps for free and distances
/// reduce to a wrapping subtract.
pub const PULSE_RING_SLOTS: usize = 256;

/// Phase counter ceiling and end-of-message sentinel.
///
/// A phase that reaches this value stops counting; a *low* phase at this
/// value terminates decoding. Genuine pulses this long collide with the
/// sentinel by design.
pub const SATURATED_TICKS: u8 = 0xff;

/// Pulses with both phases at or below this are dropped as spikes:
/// the sampler reuses the write slot instead of advancing.
pub const GLITCH_TICKS: u8 = 20;

/// Minimum cycle duration the sync searcher will consider.
pub const MIN_CYCLE_TICKS: u16 = 0x20;

/// Cycles longer than this get shape-normalized before the sync test,
/// so trains alternating full-clock and half-clock pulses still register
/// as one consistent train.
pub const LONG_CYCLE_TICKS: u16 = 0x70;

/// Maximum drift (in ticks) between a cycle and the running nominal
/// duration for the cycle to count as part of the train.
pub const SYNC_TOLERANCE: u16 = 8;

/// Consecutive matching cycles required to declare sync.
pub const SYNC_PULSES: u8 = 8;

/// Nominal durations above this classify the train as OOK.
pub const OOK_MIN_SYNC: u8 = 0x80;

/// More near-symmetric cycles than this among the sync window classify
/// the train as Manchester.
pub const MANCHESTER_MIN_HITS: u8 = 4;

/// ASK lock-in length, in pulses.
pub const ASK_LOCKIN_PULSES: u8 = 20;

/// OOK lock-in length, in pulses.
pub const OOK_LOCKIN_PULSES: u8 = 20;

/// Manchester lock-in length, in pulses. Stricter than ASK because
/// Manchester carries twice the edge density.
pub const MANCHESTER_LOCKIN_PULSES: u8 = 32;

/// Overrun guard for the Manchester decoder: stop emitting once this many
/// bits have been stuffed.
pub const MANCHESTER_MAX_BITS: u8 = 0xd0;

/// Seed value of the additive frame checksum.
pub const CHECKSUM_SEED: u8 = 0x55;

/// Nominal pulse duration seeded by an inbound `MA` command, overridable
/// with a `!` token.
pub const CMD_ASK_SYNC_SEED: u8 = 0x63;

/// Nominal pulse duration seeded by an inbound `MM` command.
pub const CMD_MANCHESTER_SYNC_SEED: u8 = 0x40;

/// Transmit requests at or below this many pulses are accepted but not
/// sent; anything this short is noise, not a frame.
pub const MIN_TX_BITS: u8 = 0x10;

/// How many times a triggered transmission is repeated on air.
pub const TX_REPEATS: u8 = 3;

/// Ticks of serial inactivity inside a command line before the parser
/// gives up and re-enables the receiver.
pub const CMD_TIMEOUT_TICKS: u16 = 1000;

/// Capacity of the serial receive byte queue filled from the UART
/// interrupt. Overflowing bytes are dropped and counted.
pub const UART_RING_LEN: usize = 64;

/// Capacity of the buffered command payload, in bytes. 32 bytes expand to
/// 256 pulses, a full ring.
pub const CMD_PAYLOAD_MAX: usize = 32;

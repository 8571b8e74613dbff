//! # bridge433
//!
//! A portable, `no_std` pulse-capture and replay engine for 433 MHz ASK/OOK
//! RF bridges built from cheap transceiver modules (FS1000A, XY-MK-5V,
//! SYN480R and friends).
//!
//! Unlike a packet modem, this crate works at the pulse level: a timer tick
//! measures every low/high phase pair on the receiver pin into a 256-slot
//! ring, cooperative decoder tasks classify and demodulate the captured
//! train on the fly (ASK, OOK, Manchester, or a raw pulse dump), and each
//! frame goes to the host as one checksummed ASCII line. The same line
//! format fed back over serial reloads the ring with synthetic pulses and
//! replays them through the transmitter, making the device a bidirectional
//! bridge for remote-control and sensor protocols it has never seen before.
//!
//! The engine is built from:
//! - `embedded-hal` traits for digital I/O, `embedded-hal-nb` for serial
//! - a circular pulse buffer with wrap-around 8-bit cursors
//! - resumable state-machine tasks dispatched from a single `poll()` loop
//! - interrupt glue via `critical-section` for the global-driver pattern
//!
//! ## Crate features
//! | Feature               | Description |
//! |-----------------------|-------------|
//! | `std`                 | Disables `#![no_std]`; used by the hosted test suite |
//! | `delay-loop`          | Blocking tick loop over `embedded_hal::delay::DelayNs` |
//! | `timer-isr` (default) | `critical_section`-guarded global bridge helpers |
//! | `defmt-0-3`           | `defmt` logging |
//! | `log`                 | `log` logging |
//!
//! ## Serial protocol
//!
//! One line per frame, both directions:
//!
//! ```text
//! MA:40553300#20!30*6D
//! ```
//!
//! `M` plus a modulation letter (`A`sk, `M`anchester, `O`ok, raw `P`ulses),
//! `:` hex payload, `#` bit count, `!` nominal pulse duration in timer
//! ticks, `*` additive checksum over payload, count, duration and a `0x55`
//! seed. Inbound extras: `PULSE`/`DEMOD` toggle raw dumping, `STACK`
//! reports task footprints; errors echo `!<byte>`, success echoes `*OK`.
//!
//! ## Usage
//!
//! ```rust
//! use bridge433::driver::Bridge;
//! # use embedded_hal_mock::eh1::digital::{Mock as Pin, Transaction as PinTransaction, State as PinState};
//! # use embedded_hal_mock::eh1::serial::Mock as Serial;
//! fn main() {
//!     // ...
//!     # let tx_pin = Pin::new(&[PinTransaction::set(PinState::Low)]);
//!     # let rx_pin = Pin::new(&[PinTransaction::get(PinState::Low)]);
//!     # let serial: Serial<u8> = Serial::new(&[]);
//!     let mut bridge: Bridge<Pin, Pin, Pin, Serial<u8>> =
//!         Bridge::new(tx_pin, rx_pin, None, serial);
//!     loop {
//!         bridge.tick(); // from the sampling timer ISR
//!         bridge.poll(); // from the main loop
//!         # break; // For testing purposes
//!     }
//!     # bridge.tx.done();
//!     # bridge.rx.done();
//!     # bridge.serial.done();
//! }
//! ```
//!
//! ## Integration Notes
//!
//! - Tune the timer so a typical remote's ~1 ms cycle lands in the
//!   `0x40..0x80` tick range; see [`timer`] for the arithmetic.
//! - Only one bridge instance should be active in interrupt-driven mode.
//! - Capture is lossy by design once a decoder falls a full ring behind
//!   the sampler; the next sync re-acquires within eight pulses.
//!
//! --
//! Designed for `#![no_std]` use in resource-constrained embedded
//! environments.

#![deny(
    bad_style,
    dead_code,
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    unused,
    while_true,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_results
)]
#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "timer-isr")]
pub use critical_section;

macro_rules! debug_log {
    ($($arg:tt)*) => {{
        #[cfg(feature = "log")]
        ::log::debug!($($arg)*);
        #[cfg(feature = "defmt-0-3")]
        ::defmt::debug!($($arg)*);
        #[cfg(not(any(feature = "log", feature = "defmt-0-3")))]
        {
            let _ = ::core::format_args!($($arg)*);
        }
    }};
}

pub mod command;
pub mod consts;
pub(crate) mod demod;
pub mod driver;
pub(crate) mod emit;
pub mod ring;
pub(crate) mod sync;
pub mod timer;

#[cfg(all(test, feature = "std"))]
pub(crate) mod testutil;

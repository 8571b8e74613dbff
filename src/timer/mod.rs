//! Timer math and scheduling helpers for the bridge tick.
//!
//! The whole engine is calibrated in sampling ticks, so the one number that
//! matters is the tick period: pick it so the cycle duration of the signals
//! you care about lands in the `0x40..0x80` tick range. For the common
//! 433 MHz remotes with ~1 ms cycles that means a tick of roughly 10 µs.
//!
//! Contains helpers for polling- and ISR-based scheduling, including:
//! - `compute_compare_value`: runtime compare-register calculator
//! - `const_compare_value`: compile-time compare-register calculator
//! - `ticks_per_cycle`: expected nominal duration for a known protocol
//! - `run_bridge_tick_loop` (feature `delay-loop`): blocking tick loop
//! - `global_bridge_tick` and friends (feature `timer-isr`): interrupt
//!   glue around a `critical_section` global bridge
//!
//! Common prescalers on a 16 MHz part (for `compute_compare_value`):
//!
//! | PRESCALER | COMPARE | Tick period |
//! |-----------|---------|-------------|
//! |         1 |     160 |       10 µs |
//! |         8 |      20 |       10 µs |
//! |         8 |      40 |       20 µs |
//! |        64 |      10 |       40 µs |

use libm::round;

#[cfg(feature = "delay-loop")]
mod delay;
#[cfg_attr(feature = "delay-loop", allow(unused_imports))]
#[cfg(feature = "delay-loop")]
pub use delay::*;

#[cfg(feature = "timer-isr")]
mod isr;
#[cfg_attr(feature = "timer-isr", allow(unused_imports))]
#[cfg(feature = "timer-isr")]
pub use isr::*;

#[cfg(feature = "timer-isr")]
mod macros;

/// Default sampling tick period, in microseconds.
pub const DEFAULT_TICK_US: f32 = 10.0;

/// Cycle duration of a typical 433 MHz remote, in microseconds.
pub const TYPICAL_CYCLE_US: f32 = 1_000.0;

/// 1,000,000 picoseconds = 1 microsecond
pub const PICOSECONDS_PER_MICROSECOND: u32 = 1_000_000;

/// Computes the compare value for a CTC-mode timer driving `tick()`.
///
/// # Arguments
/// - `f_cpu`: CPU frequency in Hz
/// - `prescaler`: timer prescaler (e.g., 8, 64, 256)
/// - `tick_us`: desired tick interval in microseconds (e.g., 10.0)
///
/// # Returns
/// Compare value for the timer's compare register (rounds to nearest
/// integer).
pub fn compute_compare_value(f_cpu: u32, prescaler: u32, tick_us: f32) -> u16 {
    let ticks_per_second = f_cpu as f32 / prescaler as f32;
    let counts_per_tick = ticks_per_second * (tick_us / 1_000_000.0);
    round(counts_per_tick as f64) as u16
}

/// Compile-time compare value calculator.
///
/// Works in picoseconds to keep precision without floating point at const
/// evaluation time; see [`compute_compare_value`] for the arguments.
pub const fn const_compare_value(f_cpu: u32, prescaler: u32, tick_us: f32) -> u16 {
    let tick_ps = ((tick_us as f64) * (PICOSECONDS_PER_MICROSECOND as f64)) as u64;
    let counts = (f_cpu / prescaler) as u64 * tick_ps / (PICOSECONDS_PER_MICROSECOND as u64 * 1_000);
    (counts / 1_000) as u16
}

/// Expected nominal cycle duration, in sampling ticks, for a protocol with
/// a known cycle period.
///
/// Useful on the host side to pre-compute the `!` token of synthetic
/// commands, and to sanity-check that a chosen tick keeps the protocols of
/// interest inside the sweet spot.
pub fn ticks_per_cycle(tick_us: f32, cycle_us: f32) -> u8 {
    let ticks = round((cycle_us / tick_us) as f64);
    if ticks > 255.0 { 255 } else { ticks as u8 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compare_value_for_16mhz_prescale8() {
        assert_eq!(compute_compare_value(16_000_000, 8, 10.0), 20);
        assert_eq!(compute_compare_value(16_000_000, 1, 10.0), 160);
    }

    #[test]
    fn const_compare_value_matches_runtime() {
        const COMPARE: u16 = const_compare_value(16_000_000, 8, 10.0);
        assert_eq!(COMPARE, compute_compare_value(16_000_000, 8, 10.0));
    }

    #[test]
    fn default_tick_keeps_remotes_in_the_sweet_spot() {
        let nominal = ticks_per_cycle(DEFAULT_TICK_US, TYPICAL_CYCLE_US);
        assert!((0x40..0x80).contains(&nominal));
    }

    #[test]
    fn ticks_per_cycle_saturates() {
        assert_eq!(ticks_per_cycle(1.0, 1_000_000.0), 255);
    }
}

//! Blocking tick scheduling over `embedded_hal::delay::DelayNs`.
//!
//! For boards where a spare timer interrupt is not available the bridge
//! can be driven from a plain delay loop. Timing jitter from the loop body
//! eats directly into the pulse measurements, so this is best reserved for
//! bring-up and receive-only experiments; use the `timer-isr` glue for
//! anything that transmits.

use crate::driver::Bridge;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal_nb::serial::{Read, Write};

/// One blocking scheduler period: tick, poll, then wait out the remainder.
///
/// # Arguments
/// - `bridge`: the bridge to advance
/// - `delay`: a delay provider from the HAL
/// - `tick_us`: tick period in microseconds (e.g. 10)
pub fn run_bridge_step<D, TX, RX, ANT, SER>(
    bridge: &mut Bridge<TX, RX, ANT, SER>,
    delay: &mut D,
    tick_us: u32,
) where
    D: DelayNs,
    TX: OutputPin,
    RX: InputPin,
    ANT: OutputPin,
    SER: Read + Write,
{
    bridge.tick();
    bridge.poll();
    delay.delay_us(tick_us);
}

/// Runs the bridge forever from a blocking delay loop.
///
/// # Notes
/// - Never returns; intended for single-purpose polling firmware.
pub fn run_bridge_tick_loop<D, TX, RX, ANT, SER>(
    bridge: &mut Bridge<TX, RX, ANT, SER>,
    delay: &mut D,
    tick_us: u32,
) -> !
where
    D: DelayNs,
    TX: OutputPin,
    RX: InputPin,
    ANT: OutputPin,
    SER: Read + Write,
{
    loop {
        run_bridge_step(bridge, delay, tick_us);
    }
}

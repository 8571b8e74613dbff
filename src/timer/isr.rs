//! `critical_section` glue for driving one global bridge from interrupts.
//!
//! The reference integration wires three interrupt sources to one static
//! bridge: the timer compare interrupt calls [`global_bridge_tick`], the
//! UART receive interrupt calls [`global_bridge_serial_rx`], and the main
//! loop sleeps on WFI and calls [`global_bridge_poll`] after every wake-up.
//! All three enter through `critical_section::with`, which is what makes
//! the shared pulse ring sound on single-core targets.

use crate::driver::Bridge;
use core::cell::RefCell;
use critical_section::Mutex;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal_nb::serial::{Read, Write};

/// Initializes the global static bridge holder.
///
/// # Example
/// ```rust
/// use bridge433::driver::Bridge;
/// use bridge433::timer::global_bridge_init;
/// use core::cell::RefCell;
/// use critical_section::Mutex;
/// # use embedded_hal_mock::eh1::digital::Mock as Pin;
/// # use embedded_hal_mock::eh1::serial::Mock as Serial;
///
/// static BRIDGE: Mutex<RefCell<Option<Bridge<Pin, Pin, Pin, Serial<u8>>>>> =
///     global_bridge_init::<Pin, Pin, Pin, Serial<u8>>();
/// ```
pub const fn global_bridge_init<TX, RX, ANT, SER>()
-> Mutex<RefCell<Option<Bridge<TX, RX, ANT, SER>>>>
where
    TX: OutputPin,
    RX: InputPin,
    ANT: OutputPin,
    SER: Read + Write,
{
    Mutex::new(RefCell::new(None))
}

/// Builds the bridge into its global holder.
///
/// Call once from `main()` before enabling the timer and UART interrupts.
pub fn global_bridge_setup<TX, RX, ANT, SER>(
    global_bridge: &'static Mutex<RefCell<Option<Bridge<TX, RX, ANT, SER>>>>,
    tx: TX,
    rx: RX,
    antenna: Option<ANT>,
    serial: SER,
) where
    TX: OutputPin,
    RX: InputPin,
    ANT: OutputPin,
    SER: Read + Write,
{
    critical_section::with(|cs| {
        let _ = global_bridge
            .borrow(cs)
            .replace(Some(Bridge::new(tx, rx, antenna, serial)));
    });
}

/// Runs one sampling/replay tick; call from the timer compare interrupt.
pub fn global_bridge_tick<TX, RX, ANT, SER>(
    global_bridge: &'static Mutex<RefCell<Option<Bridge<TX, RX, ANT, SER>>>>,
) where
    TX: OutputPin,
    RX: InputPin,
    ANT: OutputPin,
    SER: Read + Write,
{
    critical_section::with(|cs| {
        if let Some(bridge) = global_bridge.borrow(cs).borrow_mut().as_mut() {
            bridge.tick();
        }
    });
}

/// Runs one cooperative scheduler step; call from the main loop after any
/// interrupt.
pub fn global_bridge_poll<TX, RX, ANT, SER>(
    global_bridge: &'static Mutex<RefCell<Option<Bridge<TX, RX, ANT, SER>>>>,
) where
    TX: OutputPin,
    RX: InputPin,
    ANT: OutputPin,
    SER: Read + Write,
{
    critical_section::with(|cs| {
        if let Some(bridge) = global_bridge.borrow(cs).borrow_mut().as_mut() {
            bridge.poll();
        }
    });
}

/// Drains the UART into the bridge's byte queue; call from the serial
/// receive interrupt.
pub fn global_bridge_serial_rx<TX, RX, ANT, SER>(
    global_bridge: &'static Mutex<RefCell<Option<Bridge<TX, RX, ANT, SER>>>>,
) where
    TX: OutputPin,
    RX: InputPin,
    ANT: OutputPin,
    SER: Read + Write,
{
    critical_section::with(|cs| {
        if let Some(bridge) = global_bridge.borrow(cs).borrow_mut().as_mut() {
            bridge.on_serial_interrupt();
        }
    });
}

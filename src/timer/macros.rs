/// Declares the static global `BRIDGE` singleton protected by a
/// `critical_section` mutex.
///
/// # Arguments
/// - `$tx`, `$rx`, `$ant`, `$ser`: the concrete pin and serial types
///
/// # Example
/// ```rust
/// # use embedded_hal_mock::eh1::digital::Mock as Pin;
/// # use embedded_hal_mock::eh1::serial::Mock as Serial;
/// use bridge433::init_bridge;
///
/// init_bridge!(Pin, Pin, Pin, Serial<u8>);
/// ```
#[macro_export]
macro_rules! init_bridge {
    ( $tx:ty, $rx:ty, $ant:ty, $ser:ty ) => {
        pub static BRIDGE: $crate::critical_section::Mutex<
            core::cell::RefCell<Option<$crate::driver::Bridge<$tx, $rx, $ant, $ser>>>,
        > = $crate::critical_section::Mutex::new(core::cell::RefCell::new(None));
    };
}

/// Builds the bridge into the `BRIDGE` singleton declared by
/// [`init_bridge!`]. Call once from `main()` before enabling interrupts.
#[macro_export]
macro_rules! setup_bridge {
    ( $tx:expr, $rx:expr, $ant:expr, $ser:expr ) => {
        $crate::critical_section::with(|cs| {
            let _ = BRIDGE
                .borrow(cs)
                .replace(Some($crate::driver::Bridge::new($tx, $rx, $ant, $ser)));
        });
    };
}

/// Runs one bridge tick; invoke from the timer compare interrupt.
///
/// Safe to call before setup; it silently does nothing until the bridge
/// exists.
#[macro_export]
macro_rules! tick_bridge {
    () => {
        $crate::critical_section::with(|cs| {
            if let Some(bridge) = BRIDGE.borrow(cs).borrow_mut().as_mut() {
                bridge.tick();
            }
        });
    };
}

/// Runs one scheduler step; invoke from the main loop after any interrupt.
#[macro_export]
macro_rules! poll_bridge {
    () => {
        $crate::critical_section::with(|cs| {
            if let Some(bridge) = BRIDGE.borrow(cs).borrow_mut().as_mut() {
                bridge.poll();
            }
        });
    };
}

/// Drains the UART into the bridge; invoke from the serial receive
/// interrupt.
#[macro_export]
macro_rules! serial_rx_bridge {
    () => {
        $crate::critical_section::with(|cs| {
            if let Some(bridge) = BRIDGE.borrow(cs).borrow_mut().as_mut() {
                bridge.on_serial_interrupt();
            }
        });
    };
}

#[cfg(test)]
mod tests {
    use embedded_hal_mock::eh1::digital::{
        Mock as PinMock, State as PinState, Transaction as PinTransaction,
    };
    use embedded_hal_mock::eh1::serial::Mock as SerialMock;

    #[test]
    fn macros_declare_setup_and_drive_the_singleton() {
        init_bridge!(PinMock, PinMock, PinMock, SerialMock<u8>);

        let tx = PinMock::new(&[PinTransaction::set(PinState::Low)]);
        let rx = PinMock::new(&[PinTransaction::get(PinState::Low)]);
        let serial: SerialMock<u8> = SerialMock::new(&[]);

        setup_bridge!(tx, rx, None, serial);
        tick_bridge!();
        poll_bridge!();

        critical_section::with(|cs| {
            let mut bridge = BRIDGE.borrow(cs).take().expect("bridge was set up");
            assert_eq!(bridge.tickcount, 1);
            bridge.tx.done();
            bridge.rx.done();
            bridge.serial.done();
        });
    }
}

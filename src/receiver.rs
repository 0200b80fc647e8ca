//! Power and serial control of the positioning receiver.

use embedded_hal::{blocking::delay::DelayMs, digital::v2::OutputPin, serial};

/// Reset is held for this long before the receiver is enabled.
const RESET_HOLD_MS: u32 = 5;
/// Settling time between enable and reset release.
const ENABLE_SETTLE_MS: u32 = 50;

pub trait Receiver {
    type Serial: serial::Read<u8>;

    fn power_on(&mut self);
    fn power_off(&mut self);
    fn is_powered(&self) -> bool;

    fn open_serial(&mut self, baud_rate: u32);
    fn serial(&mut self) -> &mut Self::Serial;
    fn close_serial(&mut self);
}

/// A serial channel that can be opened at a rate and closed again.
pub trait SerialPort: serial::Read<u8> {
    fn open(&mut self, baud_rate: u32);
    fn close(&mut self);
}

/// Serial channel held open for one decode attempt. Closes on drop.
pub struct SerialSession<'a, R: Receiver + ?Sized> {
    receiver: &'a mut R,
}

impl<'a, R: Receiver + ?Sized> SerialSession<'a, R> {
    pub fn open(receiver: &'a mut R, baud_rate: u32) -> Self {
        receiver.open_serial(baud_rate);
        Self { receiver }
    }

    pub fn serial(&mut self) -> &mut R::Serial {
        self.receiver.serial()
    }
}

impl<R: Receiver + ?Sized> Drop for SerialSession<'_, R> {
    fn drop(&mut self) {
        self.receiver.close_serial();
    }
}

/// Receiver wired to an active-low enable and an active-low reset line.
pub struct GpsReceiver<EN, RST, S, D> {
    enable: EN,
    reset: RST,
    serial: S,
    delay: D,
    powered: bool,
}

impl<EN, RST, S, D> GpsReceiver<EN, RST, S, D>
where
    EN: OutputPin,
    RST: OutputPin,
    S: SerialPort,
    D: DelayMs<u32>,
{
    /// Takes the pins and leaves the receiver disabled and out of reset.
    pub fn new(enable: EN, reset: RST, serial: S, delay: D) -> Self {
        let mut receiver = Self {
            enable,
            reset,
            serial,
            delay,
            powered: false,
        };
        drive(&mut receiver.enable, true);
        drive(&mut receiver.reset, true);
        receiver
    }
}

impl<EN, RST, S, D> Receiver for GpsReceiver<EN, RST, S, D>
where
    EN: OutputPin,
    RST: OutputPin,
    S: SerialPort,
    D: DelayMs<u32>,
{
    type Serial = S;

    fn power_on(&mut self) {
        drive(&mut self.reset, false);
        self.delay.delay_ms(RESET_HOLD_MS);
        drive(&mut self.enable, false);
        self.delay.delay_ms(ENABLE_SETTLE_MS);
        drive(&mut self.reset, true);
        self.powered = true;
    }

    fn power_off(&mut self) {
        drive(&mut self.enable, true);
        self.powered = false;
    }

    fn is_powered(&self) -> bool {
        self.powered
    }

    fn open_serial(&mut self, baud_rate: u32) {
        self.serial.open(baud_rate);
    }

    fn serial(&mut self) -> &mut S {
        &mut self.serial
    }

    fn close_serial(&mut self) {
        self.serial.close();
    }
}

// Pin writes are best effort
fn drive<P: OutputPin>(pin: &mut P, high: bool) {
    let result = if high { pin.set_high() } else { pin.set_low() };
    if result.is_err() {
        warn!("gps: control pin write failed");
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::mock::{MockReceiver, ScriptedSerial};

    #[derive(Debug, PartialEq, Eq)]
    enum Event {
        Pin(&'static str, bool),
        Delay(u32),
    }

    type Log = Rc<RefCell<Vec<Event>>>;

    struct Pin(&'static str, Log);

    impl OutputPin for Pin {
        type Error = ();

        fn set_low(&mut self) -> Result<(), ()> {
            self.1.borrow_mut().push(Event::Pin(self.0, false));
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), ()> {
            self.1.borrow_mut().push(Event::Pin(self.0, true));
            Ok(())
        }
    }

    struct Delay(Log);

    impl DelayMs<u32> for Delay {
        fn delay_ms(&mut self, ms: u32) {
            self.0.borrow_mut().push(Event::Delay(ms));
        }
    }

    fn receiver(log: &Log) -> GpsReceiver<Pin, Pin, ScriptedSerial, Delay> {
        GpsReceiver::new(
            Pin("en", log.clone()),
            Pin("rst", log.clone()),
            ScriptedSerial::new(),
            Delay(log.clone()),
        )
    }

    #[test]
    fn test_power_sequence() {
        let log = Log::default();
        let mut gps = receiver(&log);
        assert_eq!(
            log.take(),
            vec![Event::Pin("en", true), Event::Pin("rst", true)]
        );
        assert!(!gps.is_powered());

        gps.power_on();
        assert!(gps.is_powered());
        assert_eq!(
            log.take(),
            vec![
                Event::Pin("rst", false),
                Event::Delay(5),
                Event::Pin("en", false),
                Event::Delay(50),
                Event::Pin("rst", true),
            ]
        );

        gps.power_off();
        assert!(!gps.is_powered());
        assert_eq!(log.take(), vec![Event::Pin("en", true)]);
    }

    #[test]
    fn test_serial_session_closes_on_drop() {
        let mut receiver = MockReceiver::new();
        {
            let mut session = SerialSession::open(&mut receiver, 9600);
            assert!(session.serial().is_open());
        }
        assert!(!receiver.serial.is_open());
        assert_eq!(receiver.serial.baud_rate, Some(9600));
        assert_eq!(receiver.serial.opens, 1);
        assert_eq!(receiver.serial.closes, 1);
    }
}

#![no_main]
#![no_std]

use defmt_brtt as _;
use panic_probe as _;

use defmt::{debug, error, info, trace, warn};
use embedded_hal::{
    blocking::delay::DelayMs,
    serial::{Read, Write},
};
use gps_acquire::{
    clock::{SoftClock, Uptime, WallClock},
    receiver::{GpsReceiver, SerialPort},
    AcquisitionConfig, DateTimeFix, Gps, TrackStatus,
};
use rtic_monotonics::{create_systick_token, systick::Systick, Monotonic};
use stm32l4xx_hal::{
    gpio::{Alternate, Output, PushPull, PA10, PA9, PB6, PB7},
    pac::USART1,
    prelude::*,
    serial::{self, Config, Serial},
};

const GPS_BAUD_RATE: u32 = 9600;
/// Both fixes are requested again this often.
const REQUEST_PERIOD_SECONDS: u32 = 60 * 60;

type SysTickDuration = <Systick as Monotonic>::Duration;

type Usart1 = Serial<USART1, (PA9<Alternate<PushPull, 7>>, PA10<Alternate<PushPull, 7>>)>;

type Receiver = GpsReceiver<PB6<Output<PushPull>>, PB7<Output<PushPull>>, GpsUart, SpinDelay>;

type FirmwareGps = Gps<Receiver, SoftClock<SysTickUptime>, SysTickUptime>;

defmt::timestamp!("{=u32}", Systick::now().ticks());

/// Seconds since boot, from the SysTick monotonic.
#[derive(Clone, Copy)]
pub struct SysTickUptime;

impl Uptime for SysTickUptime {
    fn uptime_seconds(&self) -> u32 {
        Systick::now().duration_since_epoch().to_secs()
    }
}

// SysTick belongs to the monotonic, so power sequencing spins instead
pub struct SpinDelay {
    cycles_per_ms: u32,
}

impl DelayMs<u32> for SpinDelay {
    fn delay_ms(&mut self, ms: u32) {
        cortex_m::asm::delay(self.cycles_per_ms.saturating_mul(ms));
    }
}

/// USART1 to the receiver. The rate is fixed at init; reads while closed
/// see nothing.
pub struct GpsUart {
    usart: Usart1,
    baud_rate: u32,
    open: bool,
}

impl GpsUart {
    fn new(usart: Usart1, baud_rate: u32) -> Self {
        Self {
            usart,
            baud_rate,
            open: false,
        }
    }
}

impl Read<u8> for GpsUart {
    type Error = serial::Error;

    fn read(&mut self) -> nb::Result<u8, serial::Error> {
        if !self.open {
            return Err(nb::Error::WouldBlock);
        }
        self.usart.read()
    }
}

impl Write<u8> for GpsUart {
    type Error = serial::Error;

    fn write(&mut self, word: u8) -> nb::Result<(), serial::Error> {
        self.usart.write(word)
    }

    fn flush(&mut self) -> nb::Result<(), serial::Error> {
        self.usart.flush()
    }
}

impl SerialPort for GpsUart {
    fn open(&mut self, baud_rate: u32) {
        if baud_rate != self.baud_rate {
            warn!(
                "gps uart runs at {} baud, {} requested",
                self.baud_rate, baud_rate
            );
        }
        // Discard whatever arrived while closed, and any overrun with it
        let _ = self.usart.read();
        self.open = true;
    }

    fn close(&mut self) {
        self.open = false;
    }
}

fn report(gps: &FirmwareGps, last: &mut [TrackStatus; 2]) {
    let statuses = [gps.date_time_status(), gps.lat_long_status()];
    if statuses == *last {
        return;
    }
    if statuses[0] != last[0] {
        match statuses[0] {
            TrackStatus::Succeeded => info!("date/time: {}", gps.date_time()),
            status => debug!("date/time: {}", status),
        }
    }
    if statuses[1] != last[1] {
        match statuses[1] {
            TrackStatus::Succeeded => info!(
                "position: {} ({})",
                gps.lat_long_text(),
                gps.lat_long_position()
            ),
            status => debug!("position: {}", status),
        }
    }
    *last = statuses;
}

#[rtic::app(
    device = stm32l4xx_hal::pac,
    dispatchers = [EXTI2],
)]
mod app {
    use super::*;

    #[shared]
    struct Shared {
        gps: FirmwareGps,
    }

    #[local]
    struct Local {}

    #[init]
    fn init(cx: init::Context) -> (Shared, Local) {
        trace!("init enter");

        let mut flash = cx.device.FLASH.constrain();
        let mut rcc = cx.device.RCC.constrain();
        let mut pwr = cx.device.PWR.constrain(&mut rcc.apb1r1);
        let clocks = rcc.cfgr.freeze(&mut flash.acr, &mut pwr);
        let sysclk_hz = clocks.sysclk().0;

        let mut gpioa = cx.device.GPIOA.split(&mut rcc.ahb2);
        let mut gpiob = cx.device.GPIOB.split(&mut rcc.ahb2);

        // Create SysTick monotonic for task scheduling
        Systick::start(cx.core.SYST, sysclk_hz, create_systick_token!());

        // Initialize UART for GPS
        let tx = gpioa
            .pa9
            .into_alternate(&mut gpioa.moder, &mut gpioa.otyper, &mut gpioa.afrh);
        let rx = gpioa
            .pa10
            .into_alternate(&mut gpioa.moder, &mut gpioa.otyper, &mut gpioa.afrh);
        let usart = Serial::usart1(
            cx.device.USART1,
            (tx, rx),
            Config::default().baudrate(GPS_BAUD_RATE.bps()),
            clocks,
            &mut rcc.apb2,
        );

        // Active-low enable and reset
        let enable = gpiob
            .pb6
            .into_push_pull_output(&mut gpiob.moder, &mut gpiob.otyper);
        let reset = gpiob
            .pb7
            .into_push_pull_output(&mut gpiob.moder, &mut gpiob.otyper);

        let receiver = GpsReceiver::new(
            enable,
            reset,
            GpsUart::new(usart, GPS_BAUD_RATE),
            SpinDelay {
                cycles_per_ms: sysclk_hz / 1000,
            },
        );
        let config = AcquisitionConfig::default().with_baud_rate(GPS_BAUD_RATE);
        let gps = defmt::unwrap!(Gps::new(
            receiver,
            SoftClock::new(SysTickUptime),
            SysTickUptime,
            config,
        ));

        if acquire_task::spawn().is_err() {
            error!("acquire_task already running");
        }

        info!("done initializing!");
        trace!("init exit");
        (Shared { gps }, Local {})
    }

    #[idle]
    fn idle(_: idle::Context) -> ! {
        trace!("idle enter");

        loop {
            // Only sleep in release mode, since the debugger doesn't interact with sleep very nicely
            #[cfg(debug_assertions)]
            cortex_m::asm::nop();
            #[cfg(not(debug_assertions))]
            cortex_m::asm::wfi();
        }
    }

    // Drive acquisition: one update per second, new requests every hour
    #[task(priority = 1, shared = [gps])]
    async fn acquire_task(mut cx: acquire_task::Context) {
        trace!("acquire_task enter");

        let mut next_request = SysTickUptime.uptime_seconds();
        let mut reported = [TrackStatus::Idle; 2];

        loop {
            let now = SysTickUptime.uptime_seconds();
            cx.shared.gps.lock(|gps| {
                if now >= next_request {
                    next_request = now.saturating_add(REQUEST_PERIOD_SECONDS);
                    gps.initiate_date_time(true);
                    gps.initiate_lat_long();
                    if gps.clock().is_synced() && gps.send_time_assistance() {
                        let now = DateTimeFix::from_naive(&gps.clock().now());
                        info!("sent time assistance for {}", now);
                    }
                }
                gps.update();
                report(gps, &mut reported);
            });

            Systick::delay(SysTickDuration::secs(1)).await;
        }
    }
}

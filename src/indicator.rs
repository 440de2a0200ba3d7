use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// Physical output behind the indicator (LED, buzzer relay, ...)
pub trait IndicatorPin {
    fn set(&mut self, on: bool) -> io::Result<()>;
}

impl<P: IndicatorPin + ?Sized> IndicatorPin for Box<P> {
    fn set(&mut self, on: bool) -> io::Result<()> {
        (**self).set(on)
    }
}

/// Pin that only reports transitions to the log
#[derive(Debug, Default)]
pub struct LogPin;

impl IndicatorPin for LogPin {
    fn set(&mut self, on: bool) -> io::Result<()> {
        log::info!("Indicator {}", if on { "ON" } else { "OFF" });
        Ok(())
    }
}

/// Linux LED class device (`/sys/class/leds/<name>/brightness`)
#[derive(Debug)]
pub struct SysfsLed {
    brightness: PathBuf,
}

impl SysfsLed {
    pub fn new(name: &str) -> Self {
        Self {
            brightness: PathBuf::from("/sys/class/leds").join(name).join("brightness"),
        }
    }

    pub fn at(brightness: PathBuf) -> Self {
        Self { brightness }
    }
}

impl IndicatorPin for SysfsLed {
    fn set(&mut self, on: bool) -> io::Result<()> {
        fs::write(&self.brightness, if on { "1" } else { "0" })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndicatorState {
    Off,
    On { activated_at: Duration },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndicatorTick {
    /// Already off
    Idle,
    StaysOn,
    TurnsOff,
}

/// Two-state indicator with a fixed dwell. Only `activate` turns it on.
pub struct IndicatorController<P: IndicatorPin> {
    pin: P,
    dwell: Duration,
    state: IndicatorState,
}

impl<P: IndicatorPin> IndicatorController<P> {
    /// Drives the pin low immediately; the indicator starts Off.
    pub fn new(mut pin: P, dwell: Duration) -> Self {
        if let Err(e) = pin.set(false) {
            log::warn!("Failed to reset indicator pin: {}", e);
        }
        Self {
            pin,
            dwell,
            state: IndicatorState::Off,
        }
    }

    pub fn activate(&mut self, now: Duration) {
        self.state = IndicatorState::On { activated_at: now };
        self.drive(true);
    }

    pub fn tick(&mut self, now: Duration) -> IndicatorTick {
        match self.state {
            IndicatorState::Off => IndicatorTick::Idle,
            IndicatorState::On { activated_at } => {
                if now.saturating_sub(activated_at) >= self.dwell {
                    self.state = IndicatorState::Off;
                    self.drive(false);
                    log::info!("Indicator turned off after {} ms", self.dwell.as_millis());
                    IndicatorTick::TurnsOff
                } else {
                    IndicatorTick::StaysOn
                }
            }
        }
    }

    pub fn state(&self) -> IndicatorState {
        self.state
    }

    pub fn is_on(&self) -> bool {
        matches!(self.state, IndicatorState::On { .. })
    }

    pub fn pin(&self) -> &P {
        &self.pin
    }

    // Pin faults are reported, never fatal
    fn drive(&mut self, on: bool) {
        if let Err(e) = self.pin.set(on) {
            log::warn!("Failed to drive indicator pin {}: {}", if on { "high" } else { "low" }, e);
        }
    }
}

//! Polling loop tying the barometer and the distance sensor to a text display.
//!
//! All state lives in [`Monitor`], which the caller owns.

use core::fmt::Write;

use embassy_time::Duration;
use embedded_hal::delay::DelayNs;
use heapless::String;

use crate::sensor::{Barometer, RangeSensor, vl53l1x::Measurement};

pub const LINE_LEN: usize = 48;

pub type Line = String<LINE_LEN>;

#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MonitorConfig {
    pub poll_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Lowest and highest temperature seen so far.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TemperatureExtremes {
    pub min: f32,
    pub max: f32,
}

impl TemperatureExtremes {
    pub fn track(&mut self, temperature: f32) {
        if temperature > self.max {
            self.max = temperature;
        }
        if temperature < self.min {
            self.min = temperature;
        }
    }
}

impl Default for TemperatureExtremes {
    fn default() -> Self {
        // inverted on purpose, the first reading sets both
        Self { min: 50.0, max: -50.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Readout {
    pub temperature: f32,
    pub pressure: f32,
    pub measurement: Measurement,
}

impl Readout {
    pub fn render(&self, extremes: &TemperatureExtremes) -> Result<Screen, core::fmt::Error> {
        let mut screen = Screen::default();
        write!(screen.temperature, "temp = {:.2} C", self.temperature)?;
        write!(screen.extremes, "max:{:.2}/min:{:.2}", extremes.max, extremes.min)?;
        write!(screen.pressure, "pres = {:.2} hPa", self.pressure)?;
        write!(
            screen.distance,
            "d = {} mm ({})",
            self.measurement.distance_mm,
            self.measurement.status.as_str()
        )?;
        Ok(screen)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Screen {
    pub temperature: Line,
    pub extremes: Line,
    pub pressure: Line,
    pub distance: Line,
}

impl Screen {
    pub fn lines(&self) -> [&str; 4] {
        [
            self.temperature.as_str(),
            self.extremes.as_str(),
            self.pressure.as_str(),
            self.distance.as_str(),
        ]
    }
}

pub trait Display {
    type Error;

    fn show(&mut self, screen: &Screen) -> Result<(), Self::Error>;
}

#[derive(Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MonitorError<B, R, D> {
    Barometer(B),
    Range(R),
    Display(D),
    /// A rendered line did not fit into [`LINE_LEN`].
    Format,
}

impl<B: core::fmt::Debug, R: core::fmt::Debug, D: core::fmt::Debug> core::fmt::Display for MonitorError<B, R, D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{self:?}")
    }
}

pub struct Monitor<B, R, S> {
    barometer: B,
    ranger: R,
    display: S,
    extremes: TemperatureExtremes,
    config: MonitorConfig,
}

impl<B: Barometer, R: RangeSensor, S: Display> Monitor<B, R, S> {
    pub fn new(barometer: B, ranger: R, display: S, config: MonitorConfig) -> Self {
        Self {
            barometer,
            ranger,
            display,
            extremes: TemperatureExtremes::default(),
            config,
        }
    }

    /// One pass: sample everything, update the extremes, redraw.
    pub fn poll_once(&mut self) -> Result<Readout, MonitorError<B::Error, R::Error, S::Error>> {
        let temperature = self.barometer.temperature().map_err(MonitorError::Barometer)?;
        self.extremes.track(temperature);
        let pressure = self.barometer.pressure().map_err(MonitorError::Barometer)?;
        let measurement = self.ranger.measure().map_err(MonitorError::Range)?;

        let readout = Readout {
            temperature,
            pressure,
            measurement,
        };
        let screen = readout.render(&self.extremes).map_err(|_| MonitorError::Format)?;
        self.display.show(&screen).map_err(MonitorError::Display)?;
        trace!("Monitor> {:?}", readout);
        Ok(readout)
    }

    /// Polls until the first failure and returns it.
    pub fn run(&mut self, delay: &mut impl DelayNs) -> MonitorError<B::Error, R::Error, S::Error> {
        let interval_ms = u32::try_from(self.config.poll_interval.as_millis()).unwrap_or(u32::MAX);
        info!("Monitor> polling every {} ms", interval_ms);
        loop {
            if let Err(e) = self.poll_once() {
                error!("Monitor> poll failed, stopping");
                return e;
            }
            delay.delay_ms(interval_ms);
        }
    }

    pub fn extremes(&self) -> &TemperatureExtremes {
        &self.extremes
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn release(self) -> (B, R, S) {
        (self.barometer, self.ranger, self.display)
    }
}

pub mod vl53l1x;

use vl53l1x::Measurement;

/// Anything that can hand out the latest distance measurement.
pub trait RangeSensor {
    type Error;

    fn measure(&mut self) -> Result<Measurement, Self::Error>;
}

/// Temperature (°C) and pressure (hPa) source, e.g. a BMP280 driver.
pub trait Barometer {
    type Error;

    fn temperature(&mut self) -> Result<f32, Self::Error>;

    fn pressure(&mut self) -> Result<f32, Self::Error>;
}

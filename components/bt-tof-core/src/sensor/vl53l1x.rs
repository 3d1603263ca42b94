//! VL53L1X time-of-flight distance sensor.
//!
//! The sensor is brought up with ST's "ultra lite" default configuration,
//! whose last byte starts continuous ranging. After construction, [`Vl53l1x::read`]
//! returns whatever the sensor holds in its result registers.

mod measurement;

use embedded_hal::{delay::DelayNs, i2c::I2c, i2c::SevenBitAddress};

pub use measurement::{Diagnostics, Measurement, RESULT_BLOCK_LEN, RangeStatus, decode};

use crate::{
    register::{BusError, MAX_PAYLOAD_LEN, RegisterBus},
    sensor::RangeSensor,
};

pub const DEFAULT_ADDRESS: SevenBitAddress = 0x29;

/// Value of `Register::IdentificationModelId` on a VL53L1X.
pub const MODEL_ID: u16 = 0xEACC;

const RESET_PULSE_MS: u32 = 100;
const BOOT_SETTLE_MS: u32 = 10;
const FIRST_RANGE_SETTLE_MS: u32 = 200;

/// Written to `Register::DefaultConfiguration` (0x2D..=0x87) in one burst.
pub const DEFAULT_CONFIGURATION: [u8; 91] = [
    0x00, /* 0x2d : bits 2 and 5 set for fast plus mode (1MHz I2C) */
    0x00, /* 0x2e : bit 0 set if I2C pulled up at AVDD instead of 1.8V */
    0x00, /* 0x2f : bit 0 set if GPIO pulled up at AVDD instead of 1.8V */
    0x01, /* 0x30 : bit 4 set for active low interrupt (bits 3:0 must be 0x1) */
    0x02, /* 0x31 : bit 1 = interrupt depending on the polarity */
    0x00, /* 0x32 */
    0x02, /* 0x33 */
    0x08, /* 0x34 */
    0x00, /* 0x35 */
    0x08, /* 0x36 */
    0x10, /* 0x37 */
    0x01, /* 0x38 */
    0x01, /* 0x39 */
    0x00, /* 0x3a */
    0x00, /* 0x3b */
    0x00, /* 0x3c */
    0x00, /* 0x3d */
    0xff, /* 0x3e */
    0x00, /* 0x3f */
    0x0F, /* 0x40 */
    0x00, /* 0x41 */
    0x00, /* 0x42 */
    0x00, /* 0x43 */
    0x00, /* 0x44 */
    0x00, /* 0x45 */
    0x20, /* 0x46 : interrupt on new sample ready */
    0x0b, /* 0x47 */
    0x00, /* 0x48 */
    0x00, /* 0x49 */
    0x02, /* 0x4a */
    0x0a, /* 0x4b */
    0x21, /* 0x4c */
    0x00, /* 0x4d */
    0x00, /* 0x4e */
    0x05, /* 0x4f */
    0x00, /* 0x50 */
    0x00, /* 0x51 */
    0x00, /* 0x52 */
    0x00, /* 0x53 */
    0xc8, /* 0x54 */
    0x00, /* 0x55 */
    0x00, /* 0x56 */
    0x38, /* 0x57 */
    0xff, /* 0x58 */
    0x01, /* 0x59 */
    0x00, /* 0x5a */
    0x08, /* 0x5b */
    0x00, /* 0x5c */
    0x00, /* 0x5d */
    0x01, /* 0x5e */
    0xdb, /* 0x5f */
    0x0f, /* 0x60 */
    0x01, /* 0x61 */
    0xf1, /* 0x62 */
    0x0d, /* 0x63 */
    0x01, /* 0x64 : sigma threshold MSB (14.2 mm), default 90 mm */
    0x68, /* 0x65 : sigma threshold LSB */
    0x00, /* 0x66 : min count rate MSB (9.7 MCPS) */
    0x80, /* 0x67 : min count rate LSB */
    0x08, /* 0x68 */
    0xb8, /* 0x69 */
    0x00, /* 0x6a */
    0x00, /* 0x6b */
    0x00, /* 0x6c : inter-measurement period MSB (32 bit) */
    0x00, /* 0x6d */
    0x0f, /* 0x6e */
    0x89, /* 0x6f : inter-measurement period LSB */
    0x00, /* 0x70 */
    0x00, /* 0x71 */
    0x00, /* 0x72 : distance threshold high MSB (mm) */
    0x00, /* 0x73 : distance threshold high LSB */
    0x00, /* 0x74 : distance threshold low MSB (mm) */
    0x00, /* 0x75 : distance threshold low LSB */
    0x00, /* 0x76 */
    0x01, /* 0x77 */
    0x0f, /* 0x78 */
    0x0d, /* 0x79 */
    0x0e, /* 0x7a */
    0x0e, /* 0x7b */
    0x00, /* 0x7c */
    0x00, /* 0x7d */
    0x02, /* 0x7e */
    0xc7, /* 0x7f : ROI center */
    0xff, /* 0x80 : XY ROI (X=width, Y=height) */
    0x9B, /* 0x81 */
    0x00, /* 0x82 */
    0x00, /* 0x83 */
    0x00, /* 0x84 */
    0x01, /* 0x85 */
    0x01, /* 0x86 : clear interrupt */
    0x40, /* 0x87 : start ranging */
];

const _: () = assert!(DEFAULT_CONFIGURATION.len() <= MAX_PAYLOAD_LEN);

#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register {
    SoftReset = 0x0000,
    /// Written with `OscCalibrateVal << 2` once ranging starts.
    RangeConfigTimeoutMacropA = 0x001E,
    OscCalibrateVal = 0x0022,
    DefaultConfiguration = 0x002D,
    ResultRangeStatus = 0x0089,
    IdentificationModelId = 0x010F,
}

impl From<Register> for u16 {
    fn from(r: Register) -> Self {
        r as u16
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InitError {
    /// Something answered on the address, but it is not a VL53L1X.
    UnexpectedModelId(u16),
}

#[derive(Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Vl53l1xError<E> {
    Bus(BusError<E>),
    Init(InitError),
}

impl<E: core::fmt::Debug> core::fmt::Display for Vl53l1xError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl<E> From<BusError<E>> for Vl53l1xError<E> {
    fn from(err: BusError<E>) -> Self {
        Vl53l1xError::Bus(err)
    }
}

impl<E> From<InitError> for Vl53l1xError<E> {
    fn from(err: InitError) -> Self {
        Vl53l1xError::Init(err)
    }
}

pub struct Vl53l1x<I2C, D> {
    registers: RegisterBus<I2C>,
    delay: D,
}

impl<I2C, E, D> Vl53l1x<I2C, D>
where
    I2C: I2c<Error = E>,
    D: DelayNs,
{
    /// Resets and configures the sensor at `address`; it is ranging
    /// continuously once this returns.
    ///
    /// # Errors
    ///
    /// * `Vl53l1xError::Bus` - a transfer failed; later steps were not attempted
    /// * `Vl53l1xError::Init` - the device did not identify as a VL53L1X
    pub fn new(i2c: I2C, delay: D, address: SevenBitAddress) -> Result<Self, Vl53l1xError<E>> {
        let mut sensor = Self {
            registers: RegisterBus::new(i2c, address),
            delay,
        };
        sensor.init()?;
        Ok(sensor)
    }

    fn init(&mut self) -> Result<(), Vl53l1xError<E>> {
        info!("VL53L1X[{:02X}]> reset", self.address());
        self.reset()?;
        self.delay.delay_ms(BOOT_SETTLE_MS);

        let model_id = self.read_model_id()?;
        if model_id != MODEL_ID {
            error!("VL53L1X[{:02X}]> unexpected model id {:04X}, check wiring", self.address(), model_id);
            return Err(InitError::UnexpectedModelId(model_id).into());
        }

        info!("VL53L1X[{:02X}]> loading default configuration", self.address());
        self.registers
            .write_bytes(Register::DefaultConfiguration, &DEFAULT_CONFIGURATION)?;

        // Done by ST's API when ranging starts; the configuration above starts
        // ranging itself, so it has to be replayed here.
        let osc_calibrate_val = self.registers.read_u16(Register::OscCalibrateVal)?;
        self.registers
            .write_u16(Register::RangeConfigTimeoutMacropA, osc_calibrate_val << 2)?;
        debug!("VL53L1X[{:02X}]> timeout macrop A = {:04X}", self.address(), osc_calibrate_val << 2);

        self.delay.delay_ms(FIRST_RANGE_SETTLE_MS);
        info!("VL53L1X[{:02X}]> ranging", self.address());
        Ok(())
    }

    /// Pulses the soft reset register.
    pub fn reset(&mut self) -> Result<(), BusError<E>> {
        self.registers.write_u8(Register::SoftReset, 0x00)?;
        self.delay.delay_ms(RESET_PULSE_MS);
        self.registers.write_u8(Register::SoftReset, 0x01)
    }

    pub fn read_model_id(&mut self) -> Result<u16, BusError<E>> {
        self.registers.read_u16(Register::IdentificationModelId)
    }

    /// Reads and decodes the current result block.
    pub fn read(&mut self) -> Result<Measurement, BusError<E>> {
        let block = self
            .registers
            .read_array::<RESULT_BLOCK_LEN, _>(Register::ResultRangeStatus)?;
        let measurement = decode(&block);
        if measurement.status == RangeStatus::Unknown {
            warn!("VL53L1X[{:02X}]> unknown range status {}", self.address(), measurement.raw_status);
        }
        trace!(
            "VL53L1X[{:02X}]> {} mm ({})",
            self.address(),
            measurement.distance_mm,
            measurement.status.as_str()
        );
        Ok(measurement)
    }

    pub fn address(&self) -> SevenBitAddress {
        self.registers.address()
    }

    pub fn release(self) -> (I2C, D) {
        (self.registers.release(), self.delay)
    }
}

impl<I2C, E, D> RangeSensor for Vl53l1x<I2C, D>
where
    I2C: I2c<Error = E>,
    D: DelayNs,
{
    type Error = BusError<E>;

    fn measure(&mut self) -> Result<Measurement, Self::Error> {
        self.read()
    }
}

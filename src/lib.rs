//! This crate provides a platform agnostic no_std driver for the TSL2581 ambient light sensor.
//! The driver is compatible with the [`embedded-hal`](https://crates.io/crates/embedded-hal) traits.
//!
//! ## Supported features
//! * Powering the sensor on and off
//! * A fixed measurement profile (400 ms integration, interrupt mode) with configurable gain
//! * Single register access for gain, integration time and interrupt thresholds
//! * Manual integration control and interrupt clearing via special function commands
//! * Reading the part number and revision id of the sensor
//! * Converting the raw channel values into the ambient light intensity in lux
//!   (fixed-point, no floating point involved)
//! * Async (feature `async`)
//!
//! ## Usage
//!
//! ### Reading the ambient light intensity
//!
//! ```no_run
//! use embedded_hal::blocking::i2c::{Write, WriteRead};
//! use tsl2581::{Address, Gain, IntegrationTime, TSL2581};
//!
//! fn measure<I2C: Write + WriteRead>(i2c: I2C) -> Result<u32, tsl2581::TSL2581Error> {
//!     let mut sensor = TSL2581::new(i2c, Address::default());
//!
//!     sensor.power_on()?;
//!     // Configures a 400 ms integration time
//!     sensor.configure(Gain::X16)?;
//!
//!     // Wait at least one integration time before reading
//!     sensor.read_lux(Gain::X16, IntegrationTime::T400ms.cycles())
//! }
//! ```
//!
//! ### Converting readings taken elsewhere
//!
//! The conversion is a pure function. The gain and integration time passed in must
//! be the ones that were active on the sensor when the reading was taken.
//!
//! ```
//! use tsl2581::{calculate_lux, ChannelReading, Gain};
//!
//! let reading = ChannelReading { ch0: 1000, ch1: 200 };
//! assert_eq!(calculate_lux(reading, Gain::X16, 148), Ok(5));
//! ```

#![cfg_attr(not(test), no_std)]

#[cfg(feature = "async")]
pub mod r#async;
mod lux;

pub use lux::{
    calculate_lux, channel_scales, coefficients_for, Coefficients, COEFFICIENTS,
    NOMINAL_INTEGRATION_CYCLES,
};

use embedded_hal::blocking::i2c::{Write, WriteRead};

/// Command bit, set on every command byte sent to the sensor.
const COMMAND_CMD: u8 = 0x80;

const CONTROL_POWER_OFF: u8 = 0x00;
const CONTROL_POWER_ON: u8 = 0x01;
const CONTROL_ADC_EN: u8 = 0x02;

/// Interrupt register value used by the measurement profile.
pub const INTERRUPT_MODE: u8 = 0x1F;

/// Interrupt register value that forces an interrupt for testing.
pub const INTERRUPT_TEST_MODE: u8 = 0x30;

/// Possible I2C addresses of the sensor, selected by the ADDR SEL pin.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum Address {
    /// ADDR SEL tied to ground
    Low = 0x29,
    /// ADDR SEL left floating
    #[default]
    Float = 0x39,
    /// ADDR SEL tied to VDD
    High = 0x49,
}

/// Represents an I2C-connected TSL2581 sensor.
///
/// The driver owns the bus handle. Register accesses are not atomic across the
/// low and high byte of a channel, so sharing a physical sensor between threads
/// must be serialized by the caller.
#[derive(Debug)]
pub struct TSL2581<I2C> {
    /// I2C Interface for communcating with the sensor.
    i2c: I2C,

    /// The address the sensor is strapped to.
    address: Address,
}

impl<I2C> TSL2581<I2C>
where
    I2C: Write + WriteRead,
{
    /// Creates a driver for a TSL2581 sensor at the given address.
    ///
    /// No bus traffic happens until the first operation.
    pub fn new(i2c: I2C, address: Address) -> Self {
        Self { i2c, address }
    }

    /// Destroys the driver and returns the I2C bus.
    pub fn release(self) -> I2C {
        self.i2c
    }

    /// The address this driver talks to.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Powers the sensor on.
    pub fn power_on(&mut self) -> Result<()> {
        self.write_register(Register::Control, CONTROL_POWER_ON)
    }

    /// Powers the sensor off.
    pub fn power_off(&mut self) -> Result<()> {
        self.write_register(Register::Control, CONTROL_POWER_OFF)
    }

    /// Applies the measurement profile: 400 ms integration time, ADC enabled,
    /// interrupt mode and the given gain.
    ///
    /// Stops at the first failed write, in which case the sensor configuration is undefined.
    pub fn configure(&mut self, gain: Gain) -> Result<()> {
        log::debug!("Configuring sensor with gain {:?}", gain);

        self.set_integration_time(IntegrationTime::T400ms)?;
        self.write_register(Register::Control, CONTROL_ADC_EN | CONTROL_POWER_ON)?;
        self.write_register(Register::Interrupt, INTERRUPT_MODE)?;
        self.set_gain(gain)
    }

    /// Reads the raw values of both channels.
    pub fn read_channels(&mut self) -> Result<ChannelReading> {
        let ch0 = self.read_word(Register::Data0Low, Register::Data0High)?;
        let ch1 = self.read_word(Register::Data1Low, Register::Data1High)?;

        log::debug!("Read raw values: ch0={} ch1={}", ch0, ch1);

        Ok(ChannelReading { ch0, ch1 })
    }

    /// Reads both channels and converts them into lux.
    ///
    /// `gain` and `cycles` must match the settings currently active on the sensor.
    pub fn read_lux(&mut self, gain: Gain, cycles: u16) -> Result<u32> {
        let reading = self.read_channels()?;
        calculate_lux(reading, gain, cycles)
    }

    /// Clears a pending interrupt and re-enables the ADC.
    pub fn reload_register(&mut self) -> Result<()> {
        self.special_function(SpecialFunction::InterruptClear)?;
        self.write_register(Register::Control, CONTROL_ADC_EN | CONTROL_POWER_ON)
    }

    /// Set the gain of the sensor.
    pub fn set_gain(&mut self, gain: Gain) -> Result<()> {
        self.write_register(Register::Analog, gain.into_reg_value())
    }

    /// Read the gain of the sensor.
    pub fn read_gain(&mut self) -> Result<Gain> {
        let gain = self.read_register(Register::Analog)?;
        Ok(Gain::from_reg_value(gain))
    }

    /// Write the integration time to the sensor.
    pub fn set_integration_time(&mut self, time: IntegrationTime) -> Result<()> {
        self.write_register(Register::Timing, time.into_reg_value())
    }

    /// Read the integration time of the sensor in 2.7 ms cycles.
    ///
    /// Returns 0 if the sensor is in manual integration mode.
    pub fn read_integration_cycles(&mut self) -> Result<u16> {
        let itime = self.read_register(Register::Timing)?;
        Ok(timing_to_cycles(itime))
    }

    /// Writes the low and high interrupt thresholds (channel 0 counts).
    pub fn set_interrupt_thresholds(&mut self, low: u16, high: u16) -> Result<()> {
        let [low_low, low_high] = low.to_le_bytes();
        let [high_low, high_high] = high.to_le_bytes();

        self.write_register(Register::ThresholdLowLow, low_low)?;
        self.write_register(Register::ThresholdLowHigh, low_high)?;
        self.write_register(Register::ThresholdHighLow, high_low)?;
        self.write_register(Register::ThresholdHighHigh, high_high)
    }

    /// Starts an integration cycle in manual integration mode.
    pub fn start_manual_integration(&mut self) -> Result<()> {
        self.special_function(SpecialFunction::StartManualIntegration)
    }

    /// Stops an integration cycle in manual integration mode.
    pub fn stop_manual_integration(&mut self) -> Result<()> {
        self.special_function(SpecialFunction::StopManualIntegration)
    }

    /// Reads the part number and the revision id of the sensor.
    pub fn read_id(&mut self) -> Result<(u8, u8)> {
        let id_raw = self.read_register(Register::Id)?;

        Ok((id_raw >> 4, id_raw & 0x0F))
    }

    /// Writes a new value to a specific register
    pub fn write_register(&mut self, register: Register, data: u8) -> Result<()> {
        let command = Command::register(TransactionMode::Byte, register);

        self.i2c
            .write(self.address as u8, &[command.bits(), data])
            .map_err(|_| TSL2581Error::WriteI2CError)
    }

    /// Reads the value of a specific register
    pub fn read_register(&mut self, register: Register) -> Result<u8> {
        let command = Command::register(TransactionMode::Block, register);
        let mut read_data = [0; 1];

        self.i2c
            .write_read(self.address as u8, &[command.bits()], &mut read_data)
            .map_err(|_| TSL2581Error::ReadI2CError)?;

        Ok(read_data[0])
    }

    /// Issues a special function command
    pub fn special_function(&mut self, function: SpecialFunction) -> Result<()> {
        let command = Command::special(function);

        self.i2c
            .write(self.address as u8, &[command.bits(), function as u8])
            .map_err(|_| TSL2581Error::WriteI2CError)
    }

    fn read_word(&mut self, low: Register, high: Register) -> Result<u16> {
        let low = self.read_register(low)?;
        let high = self.read_register(high)?;

        Ok(u16::from_le_bytes([low, high]))
    }
}

/// Converts a timing register value into 2.7 ms integration cycles.
pub(crate) fn timing_to_cycles(itime: u8) -> u16 {
    match itime {
        0 => 0,
        itime => 256 - u16::from(itime),
    }
}

/// Shorthand for all functions returning an error in this module.
pub type Result<T> = core::result::Result<T, TSL2581Error>;

/// Represents any error that may happen during communication or conversion.
#[derive(Copy, Clone, Debug, Ord, PartialOrd, Eq, PartialEq)]
pub enum TSL2581Error {
    /// An error occurred while reading from the sensor.
    ReadI2CError,
    /// An error occurred while writing to the sensor.
    WriteI2CError,
    /// Channel 0 is zero after scaling, so the channel ratio and thus the lux value
    /// cannot be determined. Usually too little light for the gain and integration time.
    IndeterminateRatio,
    /// The integration time is zero cycles (manual mode has no fixed cycle count).
    InvalidIntegrationTime,
}

// All registers of the TSL2581 sensor.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Register {
    /// Control of power on and ADC enable
    Control = 0x00,

    /// Integration time control
    Timing = 0x01,

    /// Interrupt control
    Interrupt = 0x02,

    /// Low interrupt threshold (Low byte)
    ThresholdLowLow = 0x03,

    /// Low interrupt threshold (High byte)
    ThresholdLowHigh = 0x04,

    /// High interrupt threshold (Low byte)
    ThresholdHighLow = 0x05,

    /// High interrupt threshold (High byte)
    ThresholdHighHigh = 0x06,

    /// Gain control
    Analog = 0x07,

    /// Part number and revision id
    Id = 0x12,

    /// Channel 0 value (Low byte)
    Data0Low = 0x14,

    /// Channel 0 value (High byte)
    Data0High = 0x15,

    /// Channel 1 value (Low byte)
    Data1Low = 0x16,

    /// Channel 1 value (High byte)
    Data1High = 0x17,
}

/// Selects how the sensor interprets the address bits of a command byte.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum TransactionMode {
    /// Single byte register access
    Byte = 0x00,
    /// Block read/write protocol
    Block = 0x40,
    /// Special function, the address bits select a [`SpecialFunction`]
    Special = 0x60,
}

/// Commands issued through a special function transaction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SpecialFunction {
    Reserved1 = 0x00,
    InterruptClear = 0x01,
    StopManualIntegration = 0x02,
    StartManualIntegration = 0x03,
    Reserved2 = 0x0F,
}

/// A command byte: command bit, transaction mode and register or special function.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Command(u8);

impl Command {
    /// Addresses a register with the given transaction mode.
    pub const fn register(mode: TransactionMode, register: Register) -> Self {
        Self(COMMAND_CMD | mode as u8 | register as u8)
    }

    /// Selects a special function.
    pub const fn special(function: SpecialFunction) -> Self {
        Self(COMMAND_CMD | TransactionMode::Special as u8 | function as u8)
    }

    /// The raw byte sent on the bus.
    pub const fn bits(self) -> u8 {
        self.0
    }
}

/// The gain of the TSL2581 sensor.
///
/// The highest setting is specified as 111x, the lux calibration treats it as 128x.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Gain {
    X1 = 0x0,
    X8 = 0x1,
    X16 = 0x2,
    X128 = 0x3,
}

impl Gain {
    /// Converts Gain value into the corresponding register value
    pub fn into_reg_value(self) -> u8 {
        self as u8
    }

    /// Converts the Analog register value into a Gain, ignoring the unused bits
    pub fn from_reg_value(value: u8) -> Self {
        match value & 0x03 {
            0x0 => Gain::X1,
            0x1 => Gain::X8,
            0x2 => Gain::X16,
            _ => Gain::X128,
        }
    }
}

/// Integration time presets of the Timing register.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum IntegrationTime {
    /// Integration is controlled by the start/stop special functions
    Manual = 0x00,
    T2_7ms = 0xFF,
    T5_4ms = 0xFE,
    T51_3ms = 0xED,
    T100ms = 0xDB,
    T200ms = 0xB6,
    T400ms = 0x6C,
    T688ms = 0x01,
}

impl IntegrationTime {
    /// Converts IntegrationTime value into the corresponding register value
    pub fn into_reg_value(self) -> u8 {
        self as u8
    }

    /// The integration time in 2.7 ms cycles, 0 for manual integration.
    pub fn cycles(self) -> u16 {
        timing_to_cycles(self.into_reg_value())
    }

    /// The nominal integration time in milliseconds.
    pub fn millis(self) -> f32 {
        f32::from(self.cycles()) * 2.7
    }
}

/// Raw values of both channels, taken in a single read.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelReading {
    /// Visible and infrared photodiode
    pub ch0: u16,
    /// Infrared photodiode
    pub ch1: u16,
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::i2c::Mock as I2cMock;
    use embedded_hal_mock::i2c::Transaction as I2cTransaction;
    use embedded_hal_mock::MockError;

    const ADDR: u8 = 0x39;

    fn channel_reads(ch0: u16, ch1: u16) -> Vec<I2cTransaction> {
        let [ch0_low, ch0_high] = ch0.to_le_bytes();
        let [ch1_low, ch1_high] = ch1.to_le_bytes();

        vec![
            I2cTransaction::write_read(ADDR, [0xD4].to_vec(), [ch0_low].to_vec()),
            I2cTransaction::write_read(ADDR, [0xD5].to_vec(), [ch0_high].to_vec()),
            I2cTransaction::write_read(ADDR, [0xD6].to_vec(), [ch1_low].to_vec()),
            I2cTransaction::write_read(ADDR, [0xD7].to_vec(), [ch1_high].to_vec()),
        ]
    }

    #[test]
    fn test_command_encoding() {
        assert_eq!(
            Command::register(TransactionMode::Byte, Register::Control).bits(),
            0x80
        );
        assert_eq!(
            Command::register(TransactionMode::Byte, Register::Analog).bits(),
            0x87
        );
        assert_eq!(
            Command::register(TransactionMode::Block, Register::Data0Low).bits(),
            0xD4
        );
        assert_eq!(
            Command::register(TransactionMode::Block, Register::Id).bits(),
            0xD2
        );
        assert_eq!(Command::special(SpecialFunction::Reserved1).bits(), 0xE0);
        assert_eq!(Command::special(SpecialFunction::InterruptClear).bits(), 0xE1);
        assert_eq!(Command::special(SpecialFunction::Reserved2).bits(), 0xEF);
    }

    #[test]
    fn test_power_on_off() {
        let expectations = [
            I2cTransaction::write(ADDR, [0x80, 0x01].to_vec()),
            I2cTransaction::write(ADDR, [0x80, 0x00].to_vec()),
        ];

        let mut sensor = TSL2581::new(I2cMock::new(&expectations), Address::default());
        sensor.power_on().unwrap();
        sensor.power_off().unwrap();

        sensor.release().done();
    }

    #[test]
    fn test_configure() {
        let expectations = [
            I2cTransaction::write(ADDR, [0x81, 0x6C].to_vec()),
            I2cTransaction::write(ADDR, [0x80, 0x03].to_vec()),
            I2cTransaction::write(ADDR, [0x82, 0x1F].to_vec()),
            I2cTransaction::write(ADDR, [0x87, 0x02].to_vec()),
        ];

        let mut sensor = TSL2581::new(I2cMock::new(&expectations), Address::Float);
        assert_eq!(sensor.configure(Gain::X16), Ok(()));

        sensor.release().done();
    }

    #[test]
    fn test_configure_stops_at_first_error() {
        let expectations = [
            I2cTransaction::write(ADDR, [0x81, 0x6C].to_vec()),
            I2cTransaction::write(ADDR, [0x80, 0x03].to_vec())
                .with_error(MockError::Io(std::io::ErrorKind::Other)),
        ];

        let mut sensor = TSL2581::new(I2cMock::new(&expectations), Address::Float);
        assert_eq!(
            sensor.configure(Gain::X1),
            Err(TSL2581Error::WriteI2CError)
        );

        sensor.release().done();
    }

    #[test]
    fn test_read_channels() {
        let expectations = channel_reads(1000, 200);

        let mut sensor = TSL2581::new(I2cMock::new(&expectations), Address::Float);
        let reading = sensor.read_channels().unwrap();
        assert_eq!(reading, ChannelReading { ch0: 1000, ch1: 200 });

        sensor.release().done();
    }

    #[test]
    fn test_read_lux() {
        let expectations = channel_reads(1000, 200);

        let mut sensor = TSL2581::new(I2cMock::new(&expectations), Address::Float);
        let lux = sensor.read_lux(Gain::X16, IntegrationTime::T400ms.cycles());
        assert_eq!(lux, Ok(5));

        sensor.release().done();
    }

    #[test]
    fn test_read_lux_in_darkness() {
        let expectations = channel_reads(0, 0);

        let mut sensor = TSL2581::new(I2cMock::new(&expectations), Address::Float);
        let lux = sensor.read_lux(Gain::X1, IntegrationTime::T400ms.cycles());
        assert_eq!(lux, Err(TSL2581Error::IndeterminateRatio));

        sensor.release().done();
    }

    #[test]
    fn test_reload_register() {
        let expectations = [
            I2cTransaction::write(ADDR, [0xE1, 0x01].to_vec()),
            I2cTransaction::write(ADDR, [0x80, 0x03].to_vec()),
        ];

        let mut sensor = TSL2581::new(I2cMock::new(&expectations), Address::Float);
        assert_eq!(sensor.reload_register(), Ok(()));

        sensor.release().done();
    }

    #[test]
    fn test_manual_integration() {
        let expectations = [
            I2cTransaction::write(ADDR, [0x81, 0x00].to_vec()),
            I2cTransaction::write(ADDR, [0xE3, 0x03].to_vec()),
            I2cTransaction::write(ADDR, [0xE2, 0x02].to_vec()),
        ];

        let mut sensor = TSL2581::new(I2cMock::new(&expectations), Address::Float);
        sensor
            .set_integration_time(IntegrationTime::Manual)
            .unwrap();
        sensor.start_manual_integration().unwrap();
        sensor.stop_manual_integration().unwrap();

        sensor.release().done();
    }

    #[test]
    fn test_set_interrupt_thresholds() {
        let expectations = [
            I2cTransaction::write(ADDR, [0x83, 0x34].to_vec()),
            I2cTransaction::write(ADDR, [0x84, 0x12].to_vec()),
            I2cTransaction::write(ADDR, [0x85, 0xCD].to_vec()),
            I2cTransaction::write(ADDR, [0x86, 0xAB].to_vec()),
        ];

        let mut sensor = TSL2581::new(I2cMock::new(&expectations), Address::Float);
        assert_eq!(sensor.set_interrupt_thresholds(0x1234, 0xABCD), Ok(()));

        sensor.release().done();
    }

    #[test]
    fn test_write_error() {
        let expectations = [
            I2cTransaction::write(ADDR, [0x80, 0x00].to_vec()),
            I2cTransaction::write(ADDR, [0x80, 0x00].to_vec())
                .with_error(MockError::Io(std::io::ErrorKind::Other)),
        ];

        let mut sensor = TSL2581::new(I2cMock::new(&expectations), Address::Float);
        let result = sensor.write_register(Register::Control, 0x00);
        assert_eq!(result, Ok(()));

        let result = sensor.write_register(Register::Control, 0x00);
        assert_eq!(result, Err(TSL2581Error::WriteI2CError));

        sensor.release().done();
    }

    #[test]
    fn test_read_error() {
        let expectations = [I2cTransaction::write_read(
            ADDR,
            [0xD4].to_vec(),
            [0x00].to_vec(),
        )
        .with_error(MockError::Io(std::io::ErrorKind::Other))];

        let mut sensor = TSL2581::new(I2cMock::new(&expectations), Address::Float);
        let result = sensor.read_channels();
        assert_eq!(result, Err(TSL2581Error::ReadI2CError));

        sensor.release().done();
    }

    #[test]
    fn test_read_id() {
        let expectations = [I2cTransaction::write_read(
            0x29,
            [0xD2].to_vec(),
            [0x90].to_vec(),
        )];

        let mut sensor = TSL2581::new(I2cMock::new(&expectations), Address::Low);
        let result = sensor.read_id();
        assert_eq!(result, Ok((0x9, 0x0)));

        sensor.release().done();
    }

    #[test]
    fn test_set_gain() {
        let expectations = [I2cTransaction::write(0x49, [0x87, 0x03].to_vec())];

        let mut sensor = TSL2581::new(I2cMock::new(&expectations), Address::High);
        let result = sensor.set_gain(Gain::X128);
        assert_eq!(result, Ok(()));

        sensor.release().done();
    }

    #[test]
    fn test_read_gain() {
        let expectations = [
            I2cTransaction::write_read(ADDR, [0xC7].to_vec(), [0x03].to_vec()),
            I2cTransaction::write_read(ADDR, [0xC7].to_vec(), [0xFD].to_vec()),
        ];

        let mut sensor = TSL2581::new(I2cMock::new(&expectations), Address::Float);
        assert_eq!(sensor.read_gain(), Ok(Gain::X128));
        assert_eq!(sensor.read_gain(), Ok(Gain::X8));

        sensor.release().done();
    }

    #[test]
    fn test_integration_time() {
        let expectations = [
            I2cTransaction::write(ADDR, [0x81, 0xDB].to_vec()),
            I2cTransaction::write_read(ADDR, [0xC1].to_vec(), [0xDB].to_vec()),
            I2cTransaction::write_read(ADDR, [0xC1].to_vec(), [0x00].to_vec()),
        ];

        let mut sensor = TSL2581::new(I2cMock::new(&expectations), Address::Float);
        sensor
            .set_integration_time(IntegrationTime::T100ms)
            .unwrap();
        assert_eq!(sensor.read_integration_cycles(), Ok(37));
        assert_eq!(sensor.read_integration_cycles(), Ok(0));

        sensor.release().done();
    }

    #[test]
    fn test_integration_cycles() {
        assert_eq!(IntegrationTime::Manual.cycles(), 0);
        assert_eq!(IntegrationTime::T2_7ms.cycles(), 1);
        assert_eq!(IntegrationTime::T5_4ms.cycles(), 2);
        assert_eq!(IntegrationTime::T51_3ms.cycles(), 19);
        assert_eq!(IntegrationTime::T100ms.cycles(), 37);
        assert_eq!(IntegrationTime::T200ms.cycles(), 74);
        assert_eq!(IntegrationTime::T400ms.cycles(), 148);
        assert_eq!(IntegrationTime::T688ms.cycles(), 255);

        // check that the nominal time is within 1% of the preset name
        assert!((IntegrationTime::T400ms.millis() - 400.0).abs() < 4.0);
    }
}

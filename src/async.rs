//! Async API
//!
//! This module contains the async API for the TSL2581 sensor, built on the
//! [`embedded-hal-async`](https://crates.io/crates/embedded-hal-async) I2C trait.
//! Command encoding and lux conversion are shared with the blocking driver.

use embedded_hal_async::i2c::{I2c, SevenBitAddress};

use crate::{
    calculate_lux, timing_to_cycles, Address, ChannelReading, Command, Gain, IntegrationTime,
    Register, Result, SpecialFunction, TSL2581Error, TransactionMode, CONTROL_ADC_EN,
    CONTROL_POWER_OFF, CONTROL_POWER_ON, INTERRUPT_MODE,
};

/// Represents an I2C-connected TSL2581 sensor driven through an async bus.
#[derive(Debug)]
pub struct TSL2581Async<I2C> {
    i2c: I2C,
    address: Address,
}

impl<I2C> TSL2581Async<I2C>
where
    I2C: I2c<SevenBitAddress>,
{
    /// Creates a driver for a TSL2581 sensor at the given address.
    pub fn new(i2c: I2C, address: Address) -> Self {
        Self { i2c, address }
    }

    /// Destroys the driver and returns the I2C bus.
    pub fn release(self) -> I2C {
        self.i2c
    }

    /// Powers the sensor on.
    pub async fn power_on(&mut self) -> Result<()> {
        self.write_register(Register::Control, CONTROL_POWER_ON).await
    }

    /// Powers the sensor off.
    pub async fn power_off(&mut self) -> Result<()> {
        self.write_register(Register::Control, CONTROL_POWER_OFF).await
    }

    /// Applies the measurement profile: 400 ms integration time, ADC enabled,
    /// interrupt mode and the given gain.
    pub async fn configure(&mut self, gain: Gain) -> Result<()> {
        log::debug!("Configuring sensor with gain {:?}", gain);

        self.set_integration_time(IntegrationTime::T400ms).await?;
        self.write_register(Register::Control, CONTROL_ADC_EN | CONTROL_POWER_ON).await?;
        self.write_register(Register::Interrupt, INTERRUPT_MODE).await?;
        self.set_gain(gain).await
    }

    /// Reads the raw values of both channels.
    pub async fn read_channels(&mut self) -> Result<ChannelReading> {
        let ch0 = self.read_word(Register::Data0Low, Register::Data0High).await?;
        let ch1 = self.read_word(Register::Data1Low, Register::Data1High).await?;

        log::debug!("Read raw values: ch0={} ch1={}", ch0, ch1);

        Ok(ChannelReading { ch0, ch1 })
    }

    /// Reads both channels and converts them into lux.
    pub async fn read_lux(&mut self, gain: Gain, cycles: u16) -> Result<u32> {
        let reading = self.read_channels().await?;
        calculate_lux(reading, gain, cycles)
    }

    /// Clears a pending interrupt and re-enables the ADC.
    pub async fn reload_register(&mut self) -> Result<()> {
        self.special_function(SpecialFunction::InterruptClear).await?;
        self.write_register(Register::Control, CONTROL_ADC_EN | CONTROL_POWER_ON).await
    }

    /// Set the gain of the sensor.
    pub async fn set_gain(&mut self, gain: Gain) -> Result<()> {
        self.write_register(Register::Analog, gain.into_reg_value()).await
    }

    /// Read the gain of the sensor.
    pub async fn read_gain(&mut self) -> Result<Gain> {
        let gain = self.read_register(Register::Analog).await?;
        Ok(Gain::from_reg_value(gain))
    }

    /// Write the integration time to the sensor.
    pub async fn set_integration_time(&mut self, time: IntegrationTime) -> Result<()> {
        self.write_register(Register::Timing, time.into_reg_value()).await
    }

    /// Read the integration time of the sensor in 2.7 ms cycles.
    pub async fn read_integration_cycles(&mut self) -> Result<u16> {
        let itime = self.read_register(Register::Timing).await?;
        Ok(timing_to_cycles(itime))
    }

    /// Writes the low and high interrupt thresholds (channel 0 counts).
    pub async fn set_interrupt_thresholds(&mut self, low: u16, high: u16) -> Result<()> {
        let [low_low, low_high] = low.to_le_bytes();
        let [high_low, high_high] = high.to_le_bytes();

        self.write_register(Register::ThresholdLowLow, low_low).await?;
        self.write_register(Register::ThresholdLowHigh, low_high).await?;
        self.write_register(Register::ThresholdHighLow, high_low).await?;
        self.write_register(Register::ThresholdHighHigh, high_high).await
    }

    /// Starts an integration cycle in manual integration mode.
    pub async fn start_manual_integration(&mut self) -> Result<()> {
        self.special_function(SpecialFunction::StartManualIntegration).await
    }

    /// Stops an integration cycle in manual integration mode.
    pub async fn stop_manual_integration(&mut self) -> Result<()> {
        self.special_function(SpecialFunction::StopManualIntegration).await
    }

    /// Reads the part number and the revision id of the sensor.
    pub async fn read_id(&mut self) -> Result<(u8, u8)> {
        let id_raw = self.read_register(Register::Id).await?;

        Ok((id_raw >> 4, id_raw & 0x0F))
    }

    /// Writes a new value to a specific register
    pub async fn write_register(&mut self, register: Register, data: u8) -> Result<()> {
        let command = Command::register(TransactionMode::Byte, register);

        self.i2c
            .write(self.address as u8, &[command.bits(), data])
            .await
            .map_err(|_| TSL2581Error::WriteI2CError)
    }

    /// Reads the value of a specific register
    pub async fn read_register(&mut self, register: Register) -> Result<u8> {
        let command = Command::register(TransactionMode::Block, register);
        let mut read_data = [0; 1];

        self.i2c
            .write_read(self.address as u8, &[command.bits()], &mut read_data)
            .await
            .map_err(|_| TSL2581Error::ReadI2CError)?;

        Ok(read_data[0])
    }

    /// Issues a special function command
    pub async fn special_function(&mut self, function: SpecialFunction) -> Result<()> {
        let command = Command::special(function);

        self.i2c
            .write(self.address as u8, &[command.bits(), function as u8])
            .await
            .map_err(|_| TSL2581Error::WriteI2CError)
    }

    async fn read_word(&mut self, low: Register, high: Register) -> Result<u16> {
        let low = self.read_register(low).await?;
        let high = self.read_register(high).await?;

        Ok(u16::from_le_bytes([low, high]))
    }
}

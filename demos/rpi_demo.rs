// This example demonstrates how to use the TSL2581 sensor with a Raspberry Pi.
// It polls the sensor twice a second and logs the ambient light intensity.

use embedded_hal::blocking::delay::DelayMs;
use linux_embedded_hal as hal;
use tsl2581::{Address, Gain, IntegrationTime, TSL2581Error, TSL2581};

const GAIN: Gain = Gain::X1;

fn main() {
    let i2c = hal::I2cdev::new("/dev/i2c-1").unwrap();
    let mut delay = hal::Delay;

    let mut tsl2581 = TSL2581::new(i2c, Address::Float);

    match tsl2581.read_id() {
        Ok((part, revision)) => log::info!(
            "Device ID: (Part Number: 0x{:02X}, Revision ID: 0x{:02X})",
            part,
            revision,
        ),
        Err(e) => log::error!("Error reading device id: {:?}", e),
    }

    tsl2581.power_on().unwrap();
    delay.delay_ms(2000u32);

    // The measurement profile always uses 400 ms integration
    tsl2581.configure(GAIN).unwrap();
    let cycles = IntegrationTime::T400ms.cycles();

    for _ in 0..100 {
        delay.delay_ms(500u32);

        match tsl2581.read_lux(GAIN, cycles) {
            Ok(lux) => log::info!("Lux Value: {}", lux),
            Err(TSL2581Error::IndeterminateRatio) => log::warn!("Too dark to measure"),
            Err(e) => log::error!("Error reading sensor: {:?}", e),
        }
    }

    match tsl2581.power_off() {
        Ok(_) => log::info!("Sensor powered off"),
        Err(e) => log::error!("Error powering off sensor: {:?}", e),
    }
}

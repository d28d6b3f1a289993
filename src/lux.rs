//! Lux conversion
//!
//! Fixed-point piecewise approximation of the illuminance from the two raw channel
//! counts. The calibration table below is specific to the TSL2581 package.
//!
//! The result is only meaningful if `gain` and `cycles` are the settings that were
//! active on the sensor while the reading was taken. The converter has no way to
//! detect a mismatch, it will silently produce a wrong lux value.

use crate::{ChannelReading, Gain, Result, TSL2581Error};

/// Scale of the lux coefficients (2^16)
const LUX_SCALE: u32 = 16;

/// Scale of the channel ratio (2^9)
const RATIO_SCALE: u32 = 9;

/// Scale of the channel values (2^16)
const CH_SCALE: u32 = 16;

/// Nominal 400 ms integration time in 2.7 ms cycles
pub const NOMINAL_INTEGRATION_CYCLES: u16 = 148;

/// 128x gain correction for channel 0
const CH0_GAIN_128X: u32 = 107;

/// 128x gain correction for channel 1
const CH1_GAIN_128X: u32 = 115;

/// One breakpoint of the piecewise approximation.
///
/// `lux = channel0 * b - channel1 * m` for all ratios up to and including `k`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Coefficients {
    /// Upper ratio bound of the band, scaled by 2^9
    pub k: u32,
    /// Channel 0 multiplier, scaled by 2^16
    pub b: u32,
    /// Channel 1 multiplier, scaled by 2^16
    pub m: u32,
}

/// Calibration breakpoints in ascending ratio order.
///
/// The last entry shares its threshold with the fourth and is only selected for
/// ratios above it, where the infrared share is too high for a meaningful reading.
#[rustfmt::skip]
pub const COEFFICIENTS: [Coefficients; 5] = [
    // 0.30, 0.130, 0.240
    Coefficients { k: 0x009a, b: 0x2148, m: 0x3d71 },
    // 0.38, 0.1649, 0.3562
    Coefficients { k: 0x00c3, b: 0x2a37, m: 0x5b30 },
    // 0.45, 0.0974, 0.1786
    Coefficients { k: 0x00e6, b: 0x18ef, m: 0x2db9 },
    // 0.54, 0.062, 0.10
    Coefficients { k: 0x0114, b: 0x0fdf, m: 0x199a },
    Coefficients { k: 0x0114, b: 0x0000, m: 0x0000 },
];

/// Converts a raw channel reading into lux.
///
/// `cycles` is the integration time in 2.7 ms cycles, see [`crate::IntegrationTime::cycles`].
///
/// Returns [`TSL2581Error::IndeterminateRatio`] if channel 0 is zero after scaling
/// (not enough light for the selected gain and integration time) and
/// [`TSL2581Error::InvalidIntegrationTime`] if `cycles` is zero.
pub fn calculate_lux(reading: ChannelReading, gain: Gain, cycles: u16) -> Result<u32> {
    let (scale0, scale1) = channel_scales(gain, cycles)?;

    let channel0 = (u64::from(reading.ch0) * u64::from(scale0)) >> CH_SCALE;
    let channel1 = (u64::from(reading.ch1) * u64::from(scale1)) >> CH_SCALE;

    let ratio = match ratio(channel0, channel1) {
        Some(ratio) => ratio,
        None => {
            log::warn!(
                "Channel 0 is zero after scaling (raw {}), ratio is indeterminate",
                reading.ch0
            );
            return Err(TSL2581Error::IndeterminateRatio);
        }
    };

    Ok(apply_coefficients(channel0, channel1, coefficients_for(ratio)))
}

/// Computes the per-channel scale factors for the given gain and integration time.
///
/// Both factors are scaled by 2^16, so `(65536, 65536)` means no scaling.
pub fn channel_scales(gain: Gain, cycles: u16) -> Result<(u32, u32)> {
    let scale = match cycles {
        0 => return Err(TSL2581Error::InvalidIntegrationTime),
        NOMINAL_INTEGRATION_CYCLES => 1 << CH_SCALE,
        cycles => (u32::from(NOMINAL_INTEGRATION_CYCLES) << CH_SCALE) / u32::from(cycles),
    };

    Ok(match gain {
        Gain::X1 => (scale, scale),
        Gain::X8 => (scale >> 3, scale >> 3),
        Gain::X16 => (scale >> 4, scale >> 4),
        // The channels are not equally non-linear at maximum gain
        Gain::X128 => (scale / CH0_GAIN_128X, scale / CH1_GAIN_128X),
    })
}

/// Returns the rounded channel ratio scaled by 2^9, or `None` if `channel0` is zero.
pub(crate) fn ratio(channel0: u64, channel1: u64) -> Option<u64> {
    if channel0 == 0 {
        return None;
    }

    let ratio = (channel1 << (RATIO_SCALE + 1)) / channel0;
    Some((ratio + 1) >> 1)
}

/// Selects the calibration band for a ratio scaled by 2^9.
pub fn coefficients_for(ratio: u64) -> Coefficients {
    COEFFICIENTS
        .iter()
        .take(COEFFICIENTS.len() - 1)
        .find(|c| ratio <= u64::from(c.k))
        .copied()
        .unwrap_or(COEFFICIENTS[COEFFICIENTS.len() - 1])
}

/// Evaluates one band of the approximation, rounding to the nearest lux and
/// clamping negative results to zero.
pub(crate) fn apply_coefficients(
    channel0: u64,
    channel1: u64,
    coefficients: Coefficients,
) -> u32 {
    let temp = channel0 as i64 * i64::from(coefficients.b)
        - channel1 as i64 * i64::from(coefficients.m);
    let lux = (temp + (1 << (LUX_SCALE - 1))) >> LUX_SCALE;

    u32::try_from(lux.max(0)).unwrap_or(u32::MAX)
}

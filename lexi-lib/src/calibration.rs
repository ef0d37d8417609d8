//! Housekeeping calibration.
//!
//! Housekeeping packets multiplex 16 channels, one sample per packet. Each channel has a
//! fixed conversion from its raw code to a physical value. Current monitor channels depend on
//! the hardware revision of the instrument unit the data came from and use
//! [Coefficients] which may be configured.
use std::fmt::Display;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::packet::VOLTS_PER_COUNT;
use crate::prelude::*;

/// Temperature sensor output at 0 degrees Celsius.
const TEMP_OFFSET_VOLTS: f64 = 2.73;
/// Degrees Celsius per volt.
const TEMP_SCALE: f64 = 100.0;

/// Hardware revision of the instrument unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u8", into = "u8"))]
pub enum Revision {
    #[default]
    One = 1,
    Two = 2,
}

impl TryFrom<u8> for Revision {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Revision::One),
            2 => Ok(Revision::Two),
            _ => Err(Error::Config(format!("unsupported hardware revision {value}"))),
        }
    }
}

impl From<Revision> for u8 {
    fn from(value: Revision) -> Self {
        value as u8
    }
}

impl Display for Revision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

/// Physical unit of a calibrated value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum Unit {
    Celsius,
    Milliamp,
    Volt,
    Count,
    RawFlag,
}

impl Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Unit::Celsius => "degC",
            Unit::Milliamp => "mA",
            Unit::Volt => "V",
            Unit::Count => "count",
            Unit::RawFlag => "flag",
        };
        f.write_str(s)
    }
}

/// The 16 multiplexed housekeeping channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[repr(u8)]
pub enum HkChannel {
    PinPullerTemp = 0,
    OpticsTemp = 1,
    BaseTemp = 2,
    HvSupplyTemp = 3,
    Imon5V2 = 4,
    Imon10V = 5,
    Imon3V3 = 6,
    AnodeVoltMon = 7,
    Imon28V = 8,
    AdcGround = 9,
    CmdCount = 10,
    PinPullerArmed = 11,
    Unused1 = 12,
    Unused2 = 13,
    HvMcpAuto = 14,
    HvMcpMan = 15,
}

impl HkChannel {
    /// Number of multiplexed channels.
    pub const COUNT: usize = 16;

    /// All channels in channel id order.
    pub const ALL: [HkChannel; Self::COUNT] = [
        HkChannel::PinPullerTemp,
        HkChannel::OpticsTemp,
        HkChannel::BaseTemp,
        HkChannel::HvSupplyTemp,
        HkChannel::Imon5V2,
        HkChannel::Imon10V,
        HkChannel::Imon3V3,
        HkChannel::AnodeVoltMon,
        HkChannel::Imon28V,
        HkChannel::AdcGround,
        HkChannel::CmdCount,
        HkChannel::PinPullerArmed,
        HkChannel::Unused1,
        HkChannel::Unused2,
        HkChannel::HvMcpAuto,
        HkChannel::HvMcpMan,
    ];

    /// Look up a channel by id.
    ///
    /// # Errors
    /// [Error::UnknownChannel] if `channel_id` is greater than 15.
    pub fn from_id(channel_id: u8) -> Result<Self> {
        Self::ALL
            .get(usize::from(channel_id))
            .copied()
            .ok_or(Error::UnknownChannel { channel_id })
    }

    #[must_use]
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Column name used by the instrument team.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            HkChannel::PinPullerTemp => "PinPullerTemp",
            HkChannel::OpticsTemp => "OpticsTemp",
            HkChannel::BaseTemp => "LEXIbaseTemp",
            HkChannel::HvSupplyTemp => "HVsupplyTemp",
            HkChannel::Imon5V2 => "+5.2V_Imon",
            HkChannel::Imon10V => "+10V_Imon",
            HkChannel::Imon3V3 => "+3.3V_Imon",
            HkChannel::AnodeVoltMon => "AnodeVoltMon",
            HkChannel::Imon28V => "+28V_Imon",
            HkChannel::AdcGround => "ADC_Ground",
            HkChannel::CmdCount => "Cmd_count",
            HkChannel::PinPullerArmed => "Pinpuller_Armed",
            HkChannel::Unused1 => "Unused1",
            HkChannel::Unused2 => "Unused2",
            HkChannel::HvMcpAuto => "HVmcpAuto",
            HkChannel::HvMcpMan => "HVmcpMan",
        }
    }

    #[must_use]
    pub fn unit(self) -> Unit {
        match self {
            HkChannel::PinPullerTemp
            | HkChannel::OpticsTemp
            | HkChannel::BaseTemp
            | HkChannel::HvSupplyTemp => Unit::Celsius,
            HkChannel::Imon5V2 | HkChannel::Imon3V3 | HkChannel::Imon28V => Unit::Milliamp,
            HkChannel::CmdCount => Unit::Count,
            HkChannel::PinPullerArmed => Unit::RawFlag,
            HkChannel::Imon10V
            | HkChannel::AnodeVoltMon
            | HkChannel::AdcGround
            | HkChannel::Unused1
            | HkChannel::Unused2
            | HkChannel::HvMcpAuto
            | HkChannel::HvMcpMan => Unit::Volt,
        }
    }
}

impl Display for HkChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Linear conversion `(volts - offset) * scale`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Affine {
    pub offset: f64,
    pub scale: f64,
}

impl Affine {
    #[must_use]
    pub const fn new(offset: f64, scale: f64) -> Self {
        Affine { offset, scale }
    }

    #[must_use]
    pub fn apply(&self, volts: f64) -> f64 {
        (volts - self.offset) * self.scale
    }
}

/// Per hardware revision conversions for a single channel.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RevisionPair {
    pub unit1: Affine,
    pub unit2: Affine,
}

impl RevisionPair {
    #[must_use]
    pub fn get(&self, revision: Revision) -> &Affine {
        match revision {
            Revision::One => &self.unit1,
            Revision::Two => &self.unit2,
        }
    }
}

/// Volts to milliamps conversions for the revision dependent current monitors.
///
/// The defaults are nominal sense resistor gains. Coefficients from a unit's calibration
/// report should be provided where available.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Coefficients {
    pub imon_5v2: RevisionPair,
    pub imon_3v3: RevisionPair,
    pub imon_28v: RevisionPair,
}

impl Default for Coefficients {
    fn default() -> Self {
        Coefficients {
            imon_5v2: RevisionPair {
                unit1: Affine::new(0.0, 200.0),
                unit2: Affine::new(0.0, 196.0),
            },
            imon_3v3: RevisionPair {
                unit1: Affine::new(0.0, 100.0),
                unit2: Affine::new(0.0, 98.0),
            },
            imon_28v: RevisionPair {
                unit1: Affine::new(0.0, 50.0),
                unit2: Affine::new(0.0, 40.0),
            },
        }
    }
}

/// A housekeeping sample converted to physical units.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct CalibratedSample {
    pub channel_id: u8,
    pub physical_value: f64,
    pub unit: Unit,
}

/// Converts raw housekeeping codes for one instrument unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Calibrator {
    pub coefficients: Coefficients,
    pub volts_per_count: f64,
    pub revision: Revision,
}

impl Default for Calibrator {
    fn default() -> Self {
        Calibrator::new(Revision::default(), VOLTS_PER_COUNT, Coefficients::default())
    }
}

impl Calibrator {
    #[must_use]
    pub fn new(revision: Revision, volts_per_count: f64, coefficients: Coefficients) -> Self {
        Calibrator {
            coefficients,
            volts_per_count,
            revision,
        }
    }

    /// Convert `raw_code` for `channel_id` to its physical value.
    ///
    /// # Errors
    /// [Error::UnknownChannel] if `channel_id` is not one of the 16 housekeeping channels.
    pub fn calibrate(&self, channel_id: u8, raw_code: u16) -> Result<CalibratedSample> {
        let channel = HkChannel::from_id(channel_id)?;
        let volts = f64::from(raw_code) * self.volts_per_count;
        let current = |pair: &RevisionPair| pair.get(self.revision).apply(volts);

        let physical_value = match channel {
            HkChannel::PinPullerTemp
            | HkChannel::OpticsTemp
            | HkChannel::BaseTemp
            | HkChannel::HvSupplyTemp => (volts - TEMP_OFFSET_VOLTS) * TEMP_SCALE,
            HkChannel::Imon5V2 => current(&self.coefficients.imon_5v2),
            HkChannel::Imon3V3 => current(&self.coefficients.imon_3v3),
            HkChannel::Imon28V => current(&self.coefficients.imon_28v),
            HkChannel::CmdCount | HkChannel::PinPullerArmed => f64::from(raw_code),
            _ => volts,
        };

        Ok(CalibratedSample {
            channel_id,
            physical_value,
            unit: channel.unit(),
        })
    }
}

/// Convert `raw_code` for `channel_id` using the default [Coefficients].
///
/// # Errors
/// [Error::UnknownChannel] if `channel_id` is not one of the 16 housekeeping channels.
///
/// # Example
/// ```
/// use lexi::calibration::{calibrate, Revision, Unit};
/// use lexi::packet::VOLTS_PER_COUNT;
///
/// let sample = calibrate(7, 0x0100, Revision::One, VOLTS_PER_COUNT).unwrap();
/// assert_eq!(sample.unit, Unit::Volt);
/// assert_eq!(sample.physical_value, 256.0 * VOLTS_PER_COUNT);
/// ```
pub fn calibrate(
    channel_id: u8,
    raw_code: u16,
    revision: Revision,
    volts_per_count: f64,
) -> Result<CalibratedSample> {
    Calibrator::new(revision, volts_per_count, Coefficients::default())
        .calibrate(channel_id, raw_code)
}

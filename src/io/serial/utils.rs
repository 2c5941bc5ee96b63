// src/io/serial/utils.rs
//
// Serial framing option types and their conversion to the serialport crate.
// The persisted spelling of each option matches what the settings file has always stored
// ("None", "RTS/CTS", stop bits as 1 / 1.5 / 2).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AcqError, Result};

// ============================================================================
// Types
// ============================================================================

/// Number of data bits per character (5-8)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl Default for DataBits {
    fn default() -> Self {
        DataBits::Eight
    }
}

impl TryFrom<u8> for DataBits {
    type Error = String;

    fn try_from(bits: u8) -> std::result::Result<Self, Self::Error> {
        match bits {
            5 => Ok(DataBits::Five),
            6 => Ok(DataBits::Six),
            7 => Ok(DataBits::Seven),
            8 => Ok(DataBits::Eight),
            other => Err(format!("invalid data bits: {}", other)),
        }
    }
}

impl From<DataBits> for u8 {
    fn from(bits: DataBits) -> u8 {
        match bits {
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        }
    }
}

/// Stop bits (1, 1.5 or 2)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub enum StopBits {
    One,
    OnePointFive,
    Two,
}

impl Default for StopBits {
    fn default() -> Self {
        StopBits::One
    }
}

impl TryFrom<f32> for StopBits {
    type Error = String;

    fn try_from(bits: f32) -> std::result::Result<Self, Self::Error> {
        if bits == 1.0 {
            Ok(StopBits::One)
        } else if bits == 1.5 {
            Ok(StopBits::OnePointFive)
        } else if bits == 2.0 {
            Ok(StopBits::Two)
        } else {
            Err(format!("invalid stop bits: {}", bits))
        }
    }
}

impl From<StopBits> for f32 {
    fn from(bits: StopBits) -> f32 {
        match bits {
            StopBits::One => 1.0,
            StopBits::OnePointFive => 1.5,
            StopBits::Two => 2.0,
        }
    }
}

impl fmt::Display for StopBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopBits::One => write!(f, "1"),
            StopBits::OnePointFive => write!(f, "1.5"),
            StopBits::Two => write!(f, "2"),
        }
    }
}

/// Parity setting for serial port configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Parity {
    None,
    Even,
    Odd,
    Mark,
    Space,
}

impl Default for Parity {
    fn default() -> Self {
        Parity::None
    }
}

impl Parity {
    /// Single-letter form used in `8N1`-style summaries
    pub fn letter(&self) -> char {
        match self {
            Parity::None => 'N',
            Parity::Even => 'E',
            Parity::Odd => 'O',
            Parity::Mark => 'M',
            Parity::Space => 'S',
        }
    }
}

/// Flow control setting
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowControl {
    None,
    #[serde(rename = "RTS/CTS")]
    RtsCts,
    #[serde(rename = "XON/XOFF")]
    XonXoff,
}

impl Default for FlowControl {
    fn default() -> Self {
        FlowControl::None
    }
}

/// Compact `8N1` style description of a framing
pub fn framing_summary(data_bits: DataBits, parity: Parity, stop_bits: StopBits) -> String {
    format!("{}{}{}", u8::from(data_bits), parity.letter(), stop_bits)
}

// ============================================================================
// Conversion Functions
// ============================================================================

#[cfg(any(target_os = "windows", target_os = "macos", target_os = "linux"))]
pub(crate) use conversions::*;

#[cfg(any(target_os = "windows", target_os = "macos", target_os = "linux"))]
mod conversions {
    use super::*;

    /// Convert our DataBits to serialport crate's DataBits type
    pub fn to_serialport_data_bits(bits: DataBits) -> serialport::DataBits {
        match bits {
            DataBits::Five => serialport::DataBits::Five,
            DataBits::Six => serialport::DataBits::Six,
            DataBits::Seven => serialport::DataBits::Seven,
            DataBits::Eight => serialport::DataBits::Eight,
        }
    }

    /// Convert our StopBits to serialport crate's StopBits type.
    /// serialport has no 1.5 stop bit setting, so that choice is rejected rather than rounded.
    pub fn to_serialport_stop_bits(identifier: &str, bits: StopBits) -> Result<serialport::StopBits> {
        match bits {
            StopBits::One => Ok(serialport::StopBits::One),
            StopBits::Two => Ok(serialport::StopBits::Two),
            StopBits::OnePointFive => Err(AcqError::unsupported(identifier, "1.5 stop bits")),
        }
    }

    /// Convert our Parity enum to serialport crate's Parity type.
    /// Mark and space parity are not exposed by serialport.
    pub fn to_serialport_parity(identifier: &str, p: Parity) -> Result<serialport::Parity> {
        match p {
            Parity::None => Ok(serialport::Parity::None),
            Parity::Odd => Ok(serialport::Parity::Odd),
            Parity::Even => Ok(serialport::Parity::Even),
            Parity::Mark => Err(AcqError::unsupported(identifier, "mark parity")),
            Parity::Space => Err(AcqError::unsupported(identifier, "space parity")),
        }
    }

    pub fn to_serialport_flow_control(f: FlowControl) -> serialport::FlowControl {
        match f {
            FlowControl::None => serialport::FlowControl::None,
            FlowControl::RtsCts => serialport::FlowControl::Hardware,
            FlowControl::XonXoff => serialport::FlowControl::Software,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

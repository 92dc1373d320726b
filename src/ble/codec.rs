//! Decoding of the remote's notification payloads.
//!
//! Both characteristics carry an unsigned little-endian integer. The
//! firmware may send it as a single byte or as a full 32-bit `int`, so any
//! width from 1 to 4 bytes is accepted. Anything else is treated as a
//! corrupt notification.

use crate::error::DecodeError;

const MAX_PAYLOAD_WIDTH: usize = 4;
const MAX_BATTERY_PERCENT: u32 = 100;

/// A press of one of the remote's buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEvent {
    pub button_id: u32,
}

/// Battery level, always within `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatteryReading {
    pub percent: u8,
}

fn decode_le(bytes: &[u8]) -> Result<u32, DecodeError> {
    if bytes.is_empty() || bytes.len() > MAX_PAYLOAD_WIDTH {
        return Err(DecodeError::Length(bytes.len()));
    }

    Ok(bytes
        .iter()
        .rev()
        .fold(0u32, |value, byte| (value << 8) | u32::from(*byte)))
}

/// Any id is accepted here; unbound ids are filtered by the action mapper.
pub fn decode_button(bytes: &[u8]) -> Result<ButtonEvent, DecodeError> {
    decode_le(bytes).map(|button_id| ButtonEvent { button_id })
}

/// Out-of-range levels are rejected rather than clamped.
pub fn decode_battery(bytes: &[u8]) -> Result<BatteryReading, DecodeError> {
    let value = decode_le(bytes)?;
    if value > MAX_BATTERY_PERCENT {
        return Err(DecodeError::OutOfRange(value));
    }

    Ok(BatteryReading { percent: value as u8 })
}

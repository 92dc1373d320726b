//! # Error handling utilities.
//! The generic anyhow error type is used across the crate; typed failure
//! kinds that callers match on are declared here with thiserror.

use std::time::Duration;

use bluer::Uuid;
use thiserror::Error;

pub type Result<T> = anyhow::Result<T>;

/// Failures raised by a BLE transport implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("{operation} timed out after {limit:?}")]
    Timeout { operation: &'static str, limit: Duration },

    #[error("no peripheral connected")]
    NotConnected,

    #[error("characteristic {0} is not exposed by the peripheral")]
    MissingCharacteristic(Uuid),

    #[error("invalid device address: {0}")]
    InvalidAddress(String),
}

/// Malformed notification payloads.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unexpected payload length {0}")]
    Length(usize),

    #[error("battery level {0} outside 0..=100")]
    OutOfRange(u32),
}

/// Action descriptors that cannot be turned into key chords.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("empty action descriptor")]
    EmptyDescriptor,

    #[error("empty key in chord {0:?}")]
    EmptyKey(String),
}

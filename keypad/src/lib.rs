//! Driver for the SparkFun Qwiic Keypad on an I²C bus.
//!
//! The [bus] module defines the master interface the driver talks through, [keypad] holds the
//! driver itself and the per-channel [registry](keypad::KeypadRegistry), and [sim] provides an
//! in-memory bus for tests and dry runs.

pub mod bus;
pub mod config;
pub mod keypad;
pub mod sim;

use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum I2cError {
    #[error("no acknowledge from the addressed device")]
    Nak,
    #[error("arbitration lost")]
    ArbitrationLost,
    #[error("clock stretch timeout")]
    ClockStretchTimeout,
    #[error("timed out waiting for the bus to become ready")]
    Timeout,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("the feature is not supported on this backend")]
    NotSupported,
    /// The peripheral answered with the all-ones sentinel instead of a key state.
    #[error("unexpected state reported by the peripheral")]
    UnexpectedState,
    #[error("IO error: {0}")]
    Io(std::io::ErrorKind),
    #[error("error: {0}")]
    Other(String),
}

impl From<std::io::Error> for I2cError {
    fn from(err: std::io::Error) -> Self {
        I2cError::Io(err.kind())
    }
}

pub type I2cResult<T> = Result<T, I2cError>;

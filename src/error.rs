//! Unified error type for the peripheral.
//!
//! Construction-time errors ([`Error::DuplicateUuid`]) abort building the GATT
//! tree. Per-call errors are reported back to the BlueZ caller as a D-Bus
//! failure and never terminate the process.

use thiserror::Error;
use uuid::Uuid;

use crate::domain::models::Flag;

#[derive(Debug, Error)]
pub enum Error {
    /// A write payload was not exactly the 4 bytes the value format requires.
    #[error("value must be exactly {expected} bytes, got {actual}")]
    MalformedValue { expected: usize, actual: usize },

    /// Two characteristics with the same UUID were added to one service.
    #[error("characteristic {0} already exists in this service")]
    DuplicateUuid(Uuid),

    /// An inbound call addressed an object path nothing was registered at.
    #[error("no object registered at {0}")]
    UnknownObject(String),

    /// A read or write arrived for a characteristic whose flags forbid it.
    #[error("'{0}' is not permitted by the characteristic flags")]
    OperationNotPermitted(Flag),

    /// The host stack rejected an application or agent registration.
    #[error("registration rejected: {0}")]
    RegistrationFailed(String),

    /// No powered Bluetooth adapter could be supplied.
    #[error("no usable bluetooth adapter: {0}")]
    AdapterUnavailable(String),
}

//! BlueZ Module
//!
//! Everything that talks to the BlueZ daemon over the system bus.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      bluez daemon                        │
//! └───────┬──────────────────┬──────────────────┬────────────┘
//!         │ GetManagedObjects│ ReadValue/       │ Agent1
//!         │ RegisterApp...   │ WriteValue       │ callbacks
//!         ▼                  ▼                  ▼
//! ┌───────────────┐  ┌──────────────┐  ┌──────────────┐
//! │   registrar   │  │   objects    │  │    agent     │
//! │ (state machine│  │ (exported    │  │ (fixed       │
//! │  + export)    │  │  tree)       │  │  credential) │
//! └───────┬───────┘  └──────┬───────┘  └──────────────┘
//!         └─────────────────┴──▶ domain::gatt::Application
//! ```
//!
//! ## Modules
//!
//! - [`proxies`] - client proxies for the daemon's manager interfaces
//! - [`objects`] - the exported object tree (discovery root, services,
//!   characteristics)
//! - [`registrar`] - GATT application registration state machine
//! - [`agent`] - pairing agent and its default-agent handshake
//! - [`advertisement`] - LE advertisement export and registration

pub mod advertisement;
pub mod agent;
pub mod objects;
pub mod proxies;
pub mod registrar;

use crate::error::Error;

/// Errors replied to BlueZ callers, carrying the names the daemon expects.
#[derive(Debug, zbus::DBusError)]
#[zbus(prefix = "org.bluez.Error")]
pub enum BusError {
    #[zbus(error)]
    ZBus(zbus::Error),
    Failed(String),
    InvalidValueLength(String),
    NotPermitted(String),
}

impl From<Error> for BusError {
    fn from(err: Error) -> Self {
        match err {
            Error::MalformedValue { .. } => Self::InvalidValueLength(err.to_string()),
            Error::OperationNotPermitted(_) => Self::NotPermitted(err.to_string()),
            _ => Self::Failed(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Flag;

    #[test]
    fn domain_errors_map_to_bluez_error_names() {
        let err = BusError::from(Error::MalformedValue {
            expected: 4,
            actual: 1,
        });
        assert!(matches!(err, BusError::InvalidValueLength(_)));

        let err = BusError::from(Error::OperationNotPermitted(Flag::Write));
        assert!(matches!(err, BusError::NotPermitted(_)));

        let err = BusError::from(Error::UnknownObject("/service0/char9".into()));
        assert!(matches!(err, BusError::Failed(_)));
    }
}

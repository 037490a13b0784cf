//! GATT application registration.
//!
//! Exporting the tree builds the dispatch table (one exported object per
//! path); `RegisterApplication` then hands the root to the host, which
//! enumerates it through the discovery root and answers asynchronously.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{error, info, warn};
use zbus::zvariant::ObjectPath;
use zbus::Connection;

use super::objects::{CharacteristicInterface, ObjectManagerInterface, ServiceInterface};
use super::proxies::GattManager1Proxy;
use crate::domain::gatt::{Application, APPLICATION_PATH};
use crate::domain::models::GattObject;
use crate::error::Error;

/// Lifecycle of one registration attempt.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RegistrationState {
    #[default]
    Unregistered,
    Registering,
    Registered,
    /// Terminal for this attempt; carries the host-supplied reason.
    Failed(String),
}

impl RegistrationState {
    /// A new attempt is allowed from `Unregistered` and from a previous
    /// `Failed` attempt; a live registration must be torn down first.
    fn begin(&mut self) -> Result<(), Error> {
        match self {
            Self::Unregistered | Self::Failed(_) => {
                *self = Self::Registering;
                Ok(())
            }
            Self::Registering | Self::Registered => Err(Error::RegistrationFailed(
                "an application registration is already active".to_string(),
            )),
        }
    }

    /// Record the host's asynchronous reply.
    fn complete(&mut self, outcome: Result<(), String>) {
        *self = match outcome {
            Ok(()) => Self::Registered,
            Err(reason) => Self::Failed(reason),
        };
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Self::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Registers an [`Application`] with the adapter's GATT manager.
pub struct GattRegistrar {
    connection: Connection,
    adapter_path: String,
    state: RegistrationState,
    exported: Vec<String>,
}

impl GattRegistrar {
    pub fn new(connection: Connection, adapter_path: String) -> Self {
        Self {
            connection,
            adapter_path,
            state: RegistrationState::default(),
            exported: Vec::new(),
        }
    }

    pub fn state(&self) -> &RegistrationState {
        &self.state
    }

    /// Export the tree and submit it to the host GATT manager.
    ///
    /// An error reply moves this attempt to `Failed` and is surfaced to the
    /// caller. There is no implicit retry; calling `register` again with a
    /// (possibly rebuilt) application starts a fresh attempt.
    pub async fn register(&mut self, app: Arc<Application>) -> Result<(), Error> {
        self.state.begin()?;

        if let Err(e) = self.export_tree(app).await {
            let reason = format!("exporting the object tree failed: {e}");
            self.state.complete(Err(reason.clone()));
            return Err(Error::RegistrationFailed(reason));
        }

        info!("Registering GATT application with {}", self.adapter_path);
        match self.register_with_host().await {
            Ok(()) => {
                self.state.complete(Ok(()));
                info!("GATT application registered");
                Ok(())
            }
            Err(e) => {
                let reason = e.to_string();
                error!("GATT registration rejected by host: {reason}");
                self.state.complete(Err(reason.clone()));
                Err(Error::RegistrationFailed(reason))
            }
        }
    }

    /// Withdraw a live registration and the exported objects. Errors are
    /// logged only; the host may already have dropped us.
    pub async fn unregister(&mut self) {
        if matches!(self.state, RegistrationState::Registered) {
            match self.unregister_with_host().await {
                Ok(()) => info!("GATT application unregistered"),
                Err(e) => warn!("UnregisterApplication failed: {e}"),
            }
        }
        self.remove_exported().await;
        self.state = RegistrationState::Unregistered;
    }

    async fn register_with_host(&self) -> zbus::Result<()> {
        let manager = GattManager1Proxy::builder(&self.connection)
            .path(self.adapter_path.clone())?
            .build()
            .await?;
        let root = ObjectPath::try_from(APPLICATION_PATH)?;
        manager.register_application(&root, HashMap::new()).await
    }

    async fn unregister_with_host(&self) -> zbus::Result<()> {
        let manager = GattManager1Proxy::builder(&self.connection)
            .path(self.adapter_path.clone())?
            .build()
            .await?;
        let root = ObjectPath::try_from(APPLICATION_PATH)?;
        manager.unregister_application(&root).await
    }

    async fn export_tree(&mut self, app: Arc<Application>) -> zbus::Result<()> {
        // Leftovers from a failed attempt would shadow the fresh tree.
        self.remove_exported().await;

        let server = self.connection.object_server();
        server
            .at(app.path(), ObjectManagerInterface::new(app.clone()))
            .await?;
        self.exported.push(app.path().to_string());

        for service in app.services() {
            server
                .at(service.object_path(), ServiceInterface::new(service)?)
                .await?;
            self.exported.push(service.object_path().to_string());

            for characteristic in service.characteristics() {
                server
                    .at(
                        characteristic.object_path(),
                        CharacteristicInterface::new(app.clone(), characteristic)?,
                    )
                    .await?;
                self.exported.push(characteristic.object_path().to_string());
            }
        }
        Ok(())
    }

    async fn remove_exported(&mut self) {
        let server = self.connection.object_server();
        for path in self.exported.drain(..) {
            // Each path hosts exactly one of our interface types; removing
            // the other two is a no-op.
            let _ = server
                .remove::<ObjectManagerInterface, _>(path.as_str())
                .await;
            let _ = server.remove::<ServiceInterface, _>(path.as_str()).await;
            let _ = server
                .remove::<CharacteristicInterface, _>(path.as_str())
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_error_reply_moves_the_attempt_to_failed() {
        let mut state = RegistrationState::default();
        state.begin().unwrap();
        assert_eq!(state, RegistrationState::Registering);

        state.complete(Err("org.bluez.Error.Failed: rejected".to_string()));
        assert_eq!(
            state.failure_reason(),
            Some("org.bluez.Error.Failed: rejected")
        );
    }

    #[test]
    fn a_fresh_attempt_is_accepted_after_failure() {
        let mut state = RegistrationState::default();
        state.begin().unwrap();
        state.complete(Err("no adapter".to_string()));

        state.begin().unwrap();
        assert_eq!(state, RegistrationState::Registering);
        state.complete(Ok(()));
        assert_eq!(state, RegistrationState::Registered);
        assert_eq!(state.failure_reason(), None);
    }

    #[test]
    fn a_live_registration_cannot_be_restarted() {
        let mut state = RegistrationState::default();
        state.begin().unwrap();
        state.complete(Ok(()));

        let err = state.begin().unwrap_err();
        assert!(matches!(err, Error::RegistrationFailed(_)));
        assert_eq!(state, RegistrationState::Registered);
    }
}

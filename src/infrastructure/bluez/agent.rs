//! The fixed-credential pairing agent and its default-agent handshake.

use tracing::{info, warn};
use zbus::interface;
use zbus::zvariant::{ObjectPath, OwnedObjectPath};
use zbus::Connection;

use super::proxies::AgentManager1Proxy;
use crate::error::Error;

/// Object path the agent is exported at.
pub const AGENT_PATH: &str = "/agent";

/// We claim no input and no output, so the host never expects us to be able
/// to reject a pairing.
pub const AGENT_CAPABILITY: &str = "NoInputNoOutput";

/// Answers the host's pairing callbacks with a fixed credential. Stateless
/// beyond that credential.
pub struct PairingAgent {
    passkey: String,
}

impl PairingAgent {
    pub fn new(passkey: String) -> Self {
        Self { passkey }
    }
}

#[interface(name = "org.bluez.Agent1")]
impl PairingAgent {
    fn release(&self) {
        info!("Pairing agent released by host");
    }

    fn request_pin_code(&self, device: OwnedObjectPath) -> String {
        info!(
            "Pairing request from {}, providing passkey {}",
            device.as_str(),
            self.passkey
        );
        self.passkey.clone()
    }

    fn display_passkey(&self, device: OwnedObjectPath, passkey: u32, entered: u16) {
        info!(
            "Displaying passkey {passkey:06} to {} ({entered} digits entered)",
            device.as_str()
        );
    }

    fn request_confirmation(&self, device: OwnedObjectPath, passkey: u32) -> bool {
        // NoInputNoOutput: no way to ask anyone, so never block the pairing.
        info!(
            "Confirmation requested by {} for passkey {passkey:06}: accepting",
            device.as_str()
        );
        true
    }

    fn cancel(&self) {
        warn!("Pairing request cancelled by host");
    }
}

/// A live default-agent registration.
pub struct AgentRegistration {
    connection: Connection,
    registered: bool,
}

impl AgentRegistration {
    /// Export the agent and run the two-step handshake: `RegisterAgent`,
    /// then `RequestDefaultAgent`. Both must succeed before any pairing
    /// request can be expected; a failure is reported, not retried.
    pub async fn register(connection: &Connection, passkey: String) -> Result<Self, Error> {
        connection
            .object_server()
            .at(AGENT_PATH, PairingAgent::new(passkey))
            .await
            .map_err(reject)?;

        let manager = AgentManager1Proxy::new(connection).await.map_err(reject)?;
        let path = ObjectPath::try_from(AGENT_PATH).map_err(|e| reject(e.into()))?;
        manager
            .register_agent(&path, AGENT_CAPABILITY)
            .await
            .map_err(reject)?;
        manager.request_default_agent(&path).await.map_err(reject)?;

        info!("Pairing agent registered as default agent ({AGENT_CAPABILITY})");
        Ok(Self {
            connection: connection.clone(),
            registered: true,
        })
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    /// Withdraw the agent. Errors are logged only; the daemon may already
    /// be gone at shutdown.
    pub async fn unregister(mut self) {
        if let Ok(manager) = AgentManager1Proxy::new(&self.connection).await {
            match ObjectPath::try_from(AGENT_PATH) {
                Ok(path) => {
                    if let Err(e) = manager.unregister_agent(&path).await {
                        warn!("UnregisterAgent failed: {e}");
                    }
                }
                Err(e) => warn!("UnregisterAgent skipped: {e}"),
            }
        }
        let _ = self
            .connection
            .object_server()
            .remove::<PairingAgent, _>(AGENT_PATH)
            .await;
        self.registered = false;
        info!("Pairing agent withdrawn");
    }
}

fn reject(err: zbus::Error) -> Error {
    Error::RegistrationFailed(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> OwnedObjectPath {
        OwnedObjectPath::try_from("/org/bluez/hci0/dev_AA_BB_CC_DD_EE_FF").unwrap()
    }

    #[test]
    fn pin_code_is_the_fixed_passkey() {
        let agent = PairingAgent::new("123456".to_string());
        assert_eq!(agent.request_pin_code(device()), "123456");
    }

    #[test]
    fn confirmation_is_always_accepted() {
        let agent = PairingAgent::new("123456".to_string());
        assert!(agent.request_confirmation(device(), 0));
        assert!(agent.request_confirmation(device(), 123_456));
        assert!(agent.request_confirmation(device(), 999_999));
    }
}

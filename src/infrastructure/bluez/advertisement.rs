//! LE advertisement: lets scanning centrals see the service before
//! connecting. The advertisement is a passive object the host reads back
//! over the Properties interface once it is registered.

use std::collections::HashMap;

use tracing::{info, warn};
use zbus::interface;
use zbus::zvariant::ObjectPath;
use zbus::Connection;

use super::proxies::LEAdvertisingManager1Proxy;
use crate::error::Error;

/// Object path the advertisement is exported at.
pub const ADVERTISEMENT_PATH: &str = "/advertisement0";

struct Advertisement {
    service_uuids: Vec<String>,
    local_name: String,
}

#[interface(name = "org.bluez.LEAdvertisement1")]
impl Advertisement {
    #[zbus(property, name = "Type")]
    fn advertisement_type(&self) -> String {
        "peripheral".to_string()
    }

    #[zbus(property, name = "ServiceUUIDs")]
    fn service_uuids(&self) -> Vec<String> {
        self.service_uuids.clone()
    }

    #[zbus(property)]
    fn local_name(&self) -> String {
        self.local_name.clone()
    }

    fn release(&self) {
        info!("Advertisement released by host");
    }
}

/// A live advertisement registration.
pub struct AdvertisementHandle {
    connection: Connection,
    adapter_path: String,
}

impl AdvertisementHandle {
    pub async fn register(
        connection: &Connection,
        adapter_path: &str,
        service_uuid: &str,
        local_name: &str,
    ) -> Result<Self, Error> {
        let advertisement = Advertisement {
            service_uuids: vec![service_uuid.to_string()],
            local_name: local_name.to_string(),
        };
        connection
            .object_server()
            .at(ADVERTISEMENT_PATH, advertisement)
            .await
            .map_err(reject)?;

        let manager = LEAdvertisingManager1Proxy::builder(connection)
            .path(adapter_path.to_string())
            .map_err(reject)?
            .build()
            .await
            .map_err(reject)?;
        let path = ObjectPath::try_from(ADVERTISEMENT_PATH).map_err(|e| reject(e.into()))?;
        manager
            .register_advertisement(&path, HashMap::new())
            .await
            .map_err(reject)?;

        info!("Advertising '{local_name}' with service {service_uuid}");
        Ok(Self {
            connection: connection.clone(),
            adapter_path: adapter_path.to_string(),
        })
    }

    /// Withdraw the advertisement. Errors are logged only.
    pub async fn unregister(self) {
        match LEAdvertisingManager1Proxy::builder(&self.connection).path(self.adapter_path.clone())
        {
            Ok(builder) => match builder.build().await {
                Ok(manager) => {
                    if let Ok(path) = ObjectPath::try_from(ADVERTISEMENT_PATH) {
                        if let Err(e) = manager.unregister_advertisement(&path).await {
                            warn!("UnregisterAdvertisement failed: {e}");
                        }
                    }
                }
                Err(e) => warn!("UnregisterAdvertisement skipped: {e}"),
            },
            Err(e) => warn!("UnregisterAdvertisement skipped: {e}"),
        }
        let _ = self
            .connection
            .object_server()
            .remove::<Advertisement, _>(ADVERTISEMENT_PATH)
            .await;
        info!("Advertisement withdrawn");
    }
}

fn reject(err: zbus::Error) -> Error {
    Error::RegistrationFailed(err.to_string())
}

//! Adapter discovery, selection and preparation.
//!
//! Glue around the core: the GATT tree only needs an adapter path that is
//! powered. Adapters are enumerated through the daemon's own object
//! manager, and when the configuration does not pin one down the choice is
//! asked on stdin.

use std::io::{self, Write as _};

use tracing::{info, warn};
use zbus::zvariant::OwnedValue;
use zbus::Connection;

use crate::domain::settings::Settings;
use crate::error::Error;
use crate::infrastructure::bluez::proxies::{Adapter1Proxy, BluezObjectManagerProxy};

const ADAPTER_IFACE: &str = "org.bluez.Adapter1";

/// One adapter as reported by the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterInfo {
    pub path: String,
    pub address: String,
    pub name: String,
}

pub struct AdapterController {
    connection: Connection,
}

impl AdapterController {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    /// All adapters the daemon currently manages.
    pub async fn list_adapters(&self) -> Result<Vec<AdapterInfo>, Error> {
        let manager = BluezObjectManagerProxy::new(&self.connection)
            .await
            .map_err(unavailable)?;
        let objects = manager.get_managed_objects().await.map_err(unavailable)?;

        let mut adapters = Vec::new();
        for (path, interfaces) in objects {
            let Some(props) = interfaces.get(ADAPTER_IFACE) else {
                continue;
            };
            adapters.push(AdapterInfo {
                path: path.to_string(),
                address: string_prop(props.get("Address")),
                name: string_prop(props.get("Name")),
            });
        }
        adapters.sort_by(|a, b| a.path.cmp(&b.path));

        if adapters.is_empty() {
            return Err(Error::AdapterUnavailable(
                "the daemon reports no adapters".to_string(),
            ));
        }
        info!("Found {} Bluetooth adapter(s)", adapters.len());
        Ok(adapters)
    }

    /// Pick an adapter: the configured one if present, the only one if the
    /// choice is unambiguous, otherwise ask on stdin.
    pub fn select<'a>(
        &self,
        adapters: &'a [AdapterInfo],
        preferred: Option<&str>,
    ) -> Result<&'a AdapterInfo, Error> {
        if let Some(name) = preferred {
            return find_preferred(adapters, name).ok_or_else(|| {
                Error::AdapterUnavailable(format!("configured adapter '{name}' not found"))
            });
        }
        if adapters.len() == 1 {
            info!(
                "Using the only adapter: {} ({})",
                adapters[0].path, adapters[0].address
            );
            return Ok(&adapters[0]);
        }
        prompt_selection(adapters)
    }

    /// Power the adapter and set the flags pairing needs.
    pub async fn prepare(&self, adapter: &AdapterInfo, settings: &Settings) -> Result<(), Error> {
        info!("Configuring adapter {} ({})", adapter.path, adapter.address);
        let proxy = Adapter1Proxy::builder(&self.connection)
            .path(adapter.path.clone())
            .map_err(unavailable)?
            .build()
            .await
            .map_err(unavailable)?;

        proxy.set_powered(true).await.map_err(unavailable)?;
        if let Err(e) = proxy.set_alias(settings.device_name.clone()).await {
            // Cosmetic; some adapters refuse alias changes.
            warn!("Could not set adapter alias: {e}");
        }
        proxy
            .set_discoverable(settings.discoverable)
            .await
            .map_err(unavailable)?;
        proxy
            .set_pairable(settings.pairable)
            .await
            .map_err(unavailable)?;

        info!("Adapter {} powered and ready", adapter.path);
        Ok(())
    }
}

/// Match "hci0" or a full object path against the adapter list.
fn find_preferred<'a>(adapters: &'a [AdapterInfo], name: &str) -> Option<&'a AdapterInfo> {
    adapters
        .iter()
        .find(|a| a.path == name || a.path.ends_with(&format!("/{name}")))
}

fn prompt_selection(adapters: &[AdapterInfo]) -> Result<&AdapterInfo, Error> {
    println!("Available Bluetooth adapters:");
    for (index, adapter) in adapters.iter().enumerate() {
        println!(
            "{}. {} ({}) at {}",
            index + 1,
            adapter.address,
            adapter.name,
            adapter.path
        );
    }

    loop {
        print!("Select the Bluetooth adapter (by number): ");
        io::stdout().flush().map_err(stdin_gone)?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line).map_err(stdin_gone)? == 0 {
            return Err(Error::AdapterUnavailable(
                "stdin closed during adapter selection".to_string(),
            ));
        }
        match line.trim().parse::<usize>() {
            Ok(choice) if (1..=adapters.len()).contains(&choice) => {
                return Ok(&adapters[choice - 1])
            }
            _ => println!("Please enter a number between 1 and {}.", adapters.len()),
        }
    }
}

fn stdin_gone(err: io::Error) -> Error {
    Error::AdapterUnavailable(format!("adapter selection prompt failed: {err}"))
}

fn string_prop(value: Option<&OwnedValue>) -> String {
    value
        .and_then(|v| String::try_from(v.clone()).ok())
        .unwrap_or_else(|| "unknown".to_string())
}

fn unavailable(err: zbus::Error) -> Error {
    Error::AdapterUnavailable(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapters() -> Vec<AdapterInfo> {
        vec![
            AdapterInfo {
                path: "/org/bluez/hci0".to_string(),
                address: "AA:BB:CC:DD:EE:00".to_string(),
                name: "internal".to_string(),
            },
            AdapterInfo {
                path: "/org/bluez/hci1".to_string(),
                address: "AA:BB:CC:DD:EE:01".to_string(),
                name: "dongle".to_string(),
            },
        ]
    }

    #[test]
    fn preferred_adapter_matches_by_short_name_or_path() {
        let adapters = adapters();
        assert_eq!(
            find_preferred(&adapters, "hci1").map(|a| a.path.as_str()),
            Some("/org/bluez/hci1")
        );
        assert_eq!(
            find_preferred(&adapters, "/org/bluez/hci0").map(|a| a.path.as_str()),
            Some("/org/bluez/hci0")
        );
        assert!(find_preferred(&adapters, "hci7").is_none());
    }
}

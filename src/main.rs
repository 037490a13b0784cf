mod domain;
mod error;
mod infrastructure;

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use uuid::Uuid;
use zbus::Connection;

use domain::gatt::{Application, Characteristic, Service};
use domain::models::Flag;
use domain::settings::{Settings, SettingsService};
use domain::store::ValueStore;
use infrastructure::adapter::AdapterController;
use infrastructure::bluez::advertisement::AdvertisementHandle;
use infrastructure::bluez::agent::AgentRegistration;
use infrastructure::bluez::registrar::GattRegistrar;
use infrastructure::logging;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let settings_service = SettingsService::new()?;
    let settings = settings_service.get().clone();
    let _logging = logging::init_logger(&settings.log_settings)?;
    info!("Starting blesquare GATT peripheral");

    let connection = Connection::system()
        .await
        .context("connecting to the system bus")?;

    // An adapter must be up before there is anything to serve against.
    let controller = AdapterController::new(connection.clone());
    let adapters = controller.list_adapters().await?;
    let adapter = controller
        .select(&adapters, settings.adapter.as_deref())?
        .clone();
    controller.prepare(&adapter, &settings).await?;

    // Default agent first, so pairing prompts triggered by the GATT
    // registration already reach us.
    let agent = AgentRegistration::register(&connection, settings.passkey.clone()).await?;

    let application = Arc::new(build_application(&settings)?);

    let advertisement = match AdvertisementHandle::register(
        &connection,
        &adapter.path,
        &settings.service_uuid,
        &settings.device_name,
    )
    .await
    {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Advertising unavailable, continuing without it: {e}");
            None
        }
    };

    let mut registrar = GattRegistrar::new(connection.clone(), adapter.path.clone());
    registrar.register(application).await?;

    info!("GATT server running, press ctrl-c to stop");
    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("Shutting down");

    registrar.unregister().await;
    if let Some(handle) = advertisement {
        handle.unregister().await;
    }
    agent.unregister().await;

    Ok(())
}

/// The demo tree: one primary service holding one read/write characteristic
/// backed by the process-wide value store.
fn build_application(settings: &Settings) -> anyhow::Result<Application> {
    let service_uuid =
        Uuid::parse_str(&settings.service_uuid).context("invalid service UUID in settings")?;
    let characteristic_uuid = Uuid::parse_str(&settings.characteristic_uuid)
        .context("invalid characteristic UUID in settings")?;

    let store = ValueStore::new();
    let mut service = Service::new(service_uuid, true);
    service.add_characteristic(Characteristic::new(
        characteristic_uuid,
        vec![Flag::Read, Flag::Write],
        store,
    ))?;

    let mut application = Application::new();
    application.add_service(service);
    Ok(application)
}

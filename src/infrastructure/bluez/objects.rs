//! The exported object tree: one discovery root plus one D-Bus object per
//! service and characteristic.
//!
//! Property metadata is frozen into each exported object when the tree is
//! exported; read and write calls are routed back through the application
//! by path lookup, so a call for a path we never exported is answered with
//! an error instead of being silently dropped.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error, info, warn};
use zbus::interface;
use zbus::zvariant::{ObjectPath, OwnedObjectPath, OwnedValue, Value};

use super::BusError;
use crate::domain::gatt::{Application, Characteristic, Service};
use crate::domain::models::{GattObject, PropertyValue};

/// Reply shape of `GetManagedObjects`: `a{oa{sa{sv}}}`.
pub type ManagedObjects = HashMap<OwnedObjectPath, HashMap<String, HashMap<String, OwnedValue>>>;

fn to_value(value: &PropertyValue) -> zbus::Result<Value<'static>> {
    Ok(match value {
        PropertyValue::Str(s) => Value::from(s.clone()),
        PropertyValue::Bool(b) => Value::from(*b),
        PropertyValue::ObjectPath(path) => Value::from(ObjectPath::try_from(path.clone())?),
        PropertyValue::ObjectPathList(paths) => {
            let paths = paths
                .iter()
                .map(|p| ObjectPath::try_from(p.clone()))
                .collect::<Result<Vec<_>, _>>()?;
            Value::from(paths)
        }
        PropertyValue::StrList(items) => Value::from(items.clone()),
    })
}

fn to_owned_value(value: &PropertyValue) -> Result<OwnedValue, BusError> {
    let value = to_value(value).map_err(|e| BusError::Failed(e.to_string()))?;
    OwnedValue::try_from(value).map_err(|e| BusError::Failed(e.to_string()))
}

/// Discovery root exported at the application path.
///
/// BlueZ calls `GetManagedObjects` exactly once, synchronously, when the
/// application is registered; the reply is the entire tree.
pub struct ObjectManagerInterface {
    app: Arc<Application>,
}

impl ObjectManagerInterface {
    pub fn new(app: Arc<Application>) -> Self {
        Self { app }
    }
}

#[interface(name = "org.freedesktop.DBus.ObjectManager")]
impl ObjectManagerInterface {
    fn get_managed_objects(&self) -> Result<ManagedObjects, BusError> {
        let records = self.app.enumerate();
        info!("GetManagedObjects: answering with {} objects", records.len());

        let mut reply = ManagedObjects::new();
        for record in records {
            let mut properties = HashMap::new();
            for (name, value) in &record.properties {
                properties.insert((*name).to_string(), to_owned_value(value)?);
            }
            let path = ObjectPath::try_from(record.path.clone())
                .map_err(|e| BusError::Failed(e.to_string()))?;
            reply
                .entry(OwnedObjectPath::from(path))
                .or_default()
                .insert(record.interface.to_string(), properties);
        }
        Ok(reply)
    }
}

/// A service as BlueZ reads it back over the Properties interface.
pub struct ServiceInterface {
    uuid: String,
    primary: bool,
    characteristic_paths: Vec<OwnedObjectPath>,
}

impl ServiceInterface {
    pub fn new(service: &Service) -> zbus::Result<Self> {
        let characteristic_paths = service
            .characteristics()
            .iter()
            .map(|c| Ok(OwnedObjectPath::from(ObjectPath::try_from(c.object_path().to_string())?)))
            .collect::<zbus::Result<Vec<_>>>()?;
        Ok(Self {
            uuid: service.uuid().to_string(),
            primary: service.primary(),
            characteristic_paths,
        })
    }
}

#[interface(name = "org.bluez.GattService1")]
impl ServiceInterface {
    #[zbus(property, name = "UUID")]
    fn uuid(&self) -> String {
        self.uuid.clone()
    }

    #[zbus(property)]
    fn primary(&self) -> bool {
        self.primary
    }

    #[zbus(property)]
    fn characteristics(&self) -> Vec<OwnedObjectPath> {
        self.characteristic_paths.clone()
    }
}

/// A characteristic endpoint; read and write calls dispatch back into the
/// application by path.
pub struct CharacteristicInterface {
    app: Arc<Application>,
    path: String,
    uuid: String,
    service_path: OwnedObjectPath,
    flags: Vec<String>,
}

impl CharacteristicInterface {
    pub fn new(app: Arc<Application>, characteristic: &Characteristic) -> zbus::Result<Self> {
        let service_path = OwnedObjectPath::from(ObjectPath::try_from(
            characteristic.service_path().to_string(),
        )?);
        Ok(Self {
            app,
            path: characteristic.object_path().to_string(),
            uuid: characteristic.uuid().to_string(),
            service_path,
            flags: characteristic
                .flags()
                .iter()
                .map(|f| f.as_str().to_string())
                .collect(),
        })
    }

    fn resolve(&self) -> Result<&Characteristic, BusError> {
        self.app.characteristic_at(&self.path).map_err(|e| {
            // A miss here means the host and our registration desynced.
            error!("Dispatch failed: {e}");
            BusError::from(e)
        })
    }
}

#[interface(name = "org.bluez.GattCharacteristic1")]
impl CharacteristicInterface {
    async fn read_value(&self, options: HashMap<String, OwnedValue>) -> Result<Vec<u8>, BusError> {
        debug!("ReadValue on {} (options: {:?})", self.path, options);
        let value = self.resolve()?.read().map_err(|e| {
            warn!("Read on {} rejected: {e}", self.path);
            BusError::from(e)
        })?;
        info!("Read request on {}: returning {:02X?}", self.path, value);
        Ok(value)
    }

    async fn write_value(
        &self,
        value: Vec<u8>,
        options: HashMap<String, OwnedValue>,
    ) -> Result<(), BusError> {
        debug!("WriteValue on {} (options: {:?})", self.path, options);
        self.resolve()?.write(&value).map_err(|e| {
            warn!("Write on {} rejected: {e}", self.path);
            BusError::from(e)
        })?;
        info!("Write request on {}: accepted {:02X?}", self.path, value);
        Ok(())
    }

    #[zbus(property, name = "UUID")]
    fn uuid(&self) -> String {
        self.uuid.clone()
    }

    #[zbus(property)]
    fn service(&self) -> OwnedObjectPath {
        self.service_path.clone()
    }

    #[zbus(property)]
    fn flags(&self) -> Vec<String> {
        self.flags.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::gatt::{CHARACTERISTIC_IFACE, SERVICE_IFACE};
    use crate::domain::models::Flag;
    use crate::domain::store::ValueStore;
    use uuid::Uuid;

    fn demo_app() -> Arc<Application> {
        let store = ValueStore::new();
        let mut service = Service::new(Uuid::from_u128(1), true);
        service
            .add_characteristic(Characteristic::new(
                Uuid::from_u128(2),
                vec![Flag::Read, Flag::Write],
                store,
            ))
            .unwrap();
        let mut app = Application::new();
        app.add_service(service);
        Arc::new(app)
    }

    #[test]
    fn managed_objects_reply_covers_the_whole_tree() {
        let app = demo_app();
        let reply = ObjectManagerInterface::new(app).get_managed_objects().unwrap();

        assert_eq!(reply.len(), 2);
        let service_path = OwnedObjectPath::try_from("/service0").unwrap();
        let char_path = OwnedObjectPath::try_from("/service0/char0").unwrap();

        let service = &reply[&service_path][SERVICE_IFACE];
        assert_eq!(
            String::try_from(service["UUID"].clone()).unwrap(),
            Uuid::from_u128(1).to_string()
        );
        assert!(bool::try_from(service["Primary"].clone()).unwrap());

        let characteristic = &reply[&char_path][CHARACTERISTIC_IFACE];
        assert_eq!(
            String::try_from(characteristic["UUID"].clone()).unwrap(),
            Uuid::from_u128(2).to_string()
        );
    }

    #[tokio::test]
    async fn reads_and_writes_route_through_the_exported_path() {
        let app = demo_app();
        let characteristic =
            CharacteristicInterface::new(app.clone(), &app.services()[0].characteristics()[0])
                .unwrap();

        characteristic
            .write_value(5u32.to_le_bytes().to_vec(), HashMap::new())
            .await
            .unwrap();
        let value = characteristic.read_value(HashMap::new()).await.unwrap();
        assert_eq!(value, 25u32.to_le_bytes().to_vec());
    }

    #[tokio::test]
    async fn malformed_write_is_answered_with_invalid_value_length() {
        let app = demo_app();
        let characteristic =
            CharacteristicInterface::new(app.clone(), &app.services()[0].characteristics()[0])
                .unwrap();

        let err = characteristic
            .write_value(vec![1, 2, 3], HashMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BusError::InvalidValueLength(_)));
    }
}

//! The GATT object tree: application, services, characteristics.
//!
//! The tree is plain data with no bus attachment. Paths are derived
//! deterministically when an object is attached to its parent
//! (`/serviceN`, `<service>/charN`), which keeps every exported path unique
//! by construction. The bluez layer exports the tree and routes inbound
//! calls back into it by path.

use uuid::Uuid;

use crate::domain::models::{Flag, GattObject, ObjectRecord, PropertyValue};
use crate::domain::store::SharedValueStore;
use crate::error::Error;

/// Root object path the application is registered under.
pub const APPLICATION_PATH: &str = "/";

pub const SERVICE_IFACE: &str = "org.bluez.GattService1";
pub const CHARACTERISTIC_IFACE: &str = "org.bluez.GattCharacteristic1";

/// A leaf GATT node bound to the shared value store.
///
/// Flags are declared once at construction and never change.
#[derive(Debug)]
pub struct Characteristic {
    path: String,
    uuid: Uuid,
    flags: Vec<Flag>,
    service_path: String,
    store: SharedValueStore,
}

impl Characteristic {
    pub fn new(uuid: Uuid, flags: Vec<Flag>, store: SharedValueStore) -> Self {
        Self {
            path: String::new(),
            uuid,
            flags,
            service_path: String::new(),
            store,
        }
    }

    fn attach(&mut self, service_path: &str, index: usize) {
        self.path = format!("{service_path}/char{index}");
        self.service_path = service_path.to_string();
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn flags(&self) -> &[Flag] {
        &self.flags
    }

    /// Path of the service this characteristic belongs to. Non-owning
    /// back-reference, only used for the `Service` property.
    pub fn service_path(&self) -> &str {
        &self.service_path
    }

    /// Serve a read request: the squared stored value, little-endian.
    pub fn read(&self) -> Result<Vec<u8>, Error> {
        if !self.flags.contains(&Flag::Read) {
            return Err(Error::OperationNotPermitted(Flag::Read));
        }
        Ok(self.store.read().to_vec())
    }

    /// Serve a write request: replace the stored value.
    pub fn write(&self, payload: &[u8]) -> Result<(), Error> {
        if !self.flags.contains(&Flag::Write) {
            return Err(Error::OperationNotPermitted(Flag::Write));
        }
        self.store.write(payload)
    }
}

impl GattObject for Characteristic {
    fn object_path(&self) -> &str {
        &self.path
    }

    fn interface(&self) -> &'static str {
        CHARACTERISTIC_IFACE
    }

    fn properties(&self) -> Vec<(&'static str, PropertyValue)> {
        vec![
            ("UUID", PropertyValue::Str(self.uuid.to_string())),
            (
                "Service",
                PropertyValue::ObjectPath(self.service_path.clone()),
            ),
            (
                "Flags",
                PropertyValue::StrList(self.flags.iter().map(|f| f.as_str().to_string()).collect()),
            ),
        ]
    }
}

/// An ordered collection of characteristics under one UUID.
#[derive(Debug)]
pub struct Service {
    path: String,
    uuid: Uuid,
    primary: bool,
    characteristics: Vec<Characteristic>,
}

impl Service {
    pub fn new(uuid: Uuid, primary: bool) -> Self {
        Self {
            path: String::new(),
            uuid,
            primary,
            characteristics: Vec::new(),
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn primary(&self) -> bool {
        self.primary
    }

    pub fn characteristics(&self) -> &[Characteristic] {
        &self.characteristics
    }

    /// Append a characteristic, assigning its deterministic path.
    ///
    /// A second characteristic with the same UUID in one service is a
    /// configuration error, not silently allowed.
    pub fn add_characteristic(&mut self, mut characteristic: Characteristic) -> Result<(), Error> {
        if self
            .characteristics
            .iter()
            .any(|c| c.uuid == characteristic.uuid)
        {
            return Err(Error::DuplicateUuid(characteristic.uuid));
        }
        if !self.path.is_empty() {
            characteristic.attach(&self.path, self.characteristics.len());
        }
        self.characteristics.push(characteristic);
        Ok(())
    }

    fn attach(&mut self, path: String) {
        self.path = path;
        for (index, characteristic) in self.characteristics.iter_mut().enumerate() {
            characteristic.attach(&self.path, index);
        }
    }
}

impl GattObject for Service {
    fn object_path(&self) -> &str {
        &self.path
    }

    fn interface(&self) -> &'static str {
        SERVICE_IFACE
    }

    fn properties(&self) -> Vec<(&'static str, PropertyValue)> {
        vec![
            ("UUID", PropertyValue::Str(self.uuid.to_string())),
            ("Primary", PropertyValue::Bool(self.primary)),
            (
                "Characteristics",
                PropertyValue::ObjectPathList(
                    self.characteristics
                        .iter()
                        .map(|c| c.path.clone())
                        .collect(),
                ),
            ),
        ]
    }
}

/// The root aggregate the registrar hands to the host: all services and,
/// transitively, all characteristics.
#[derive(Debug, Default)]
pub struct Application {
    services: Vec<Service>,
}

impl Application {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(&self) -> &str {
        APPLICATION_PATH
    }

    pub fn services(&self) -> &[Service] {
        &self.services
    }

    /// Append a service, assigning `/serviceN` and re-deriving the paths of
    /// any characteristics it already holds.
    pub fn add_service(&mut self, mut service: Service) {
        service.attach(format!("/service{}", self.services.len()));
        self.services.push(service);
    }

    /// Snapshot of the whole tree, one record per service and
    /// characteristic, in insertion order.
    ///
    /// This is what the host's one-shot `GetManagedObjects` discovery call
    /// sees; it reflects the tree exactly as currently configured and is
    /// idempotent.
    pub fn enumerate(&self) -> Vec<ObjectRecord> {
        let mut objects = Vec::new();
        for service in &self.services {
            objects.push(service.record());
            for characteristic in &service.characteristics {
                objects.push(characteristic.record());
            }
        }
        objects
    }

    /// Route an inbound call to the characteristic registered at `path`.
    ///
    /// A miss means the host and our registration have desynced; the caller
    /// is expected to log it and fail the call.
    pub fn characteristic_at(&self, path: &str) -> Result<&Characteristic, Error> {
        self.services
            .iter()
            .flat_map(|s| s.characteristics.iter())
            .find(|c| c.path == path)
            .ok_or_else(|| Error::UnknownObject(path.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::store::ValueStore;

    fn uuid(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn demo_application() -> Application {
        let store = ValueStore::new();
        let mut service = Service::new(uuid(1), true);
        service
            .add_characteristic(Characteristic::new(
                uuid(2),
                vec![Flag::Read, Flag::Write],
                store.clone(),
            ))
            .unwrap();
        service
            .add_characteristic(Characteristic::new(uuid(3), vec![Flag::Read], store))
            .unwrap();

        let mut app = Application::new();
        app.add_service(service);
        app
    }

    #[test]
    fn paths_are_derived_from_parents() {
        let app = demo_application();
        let service = &app.services()[0];
        assert_eq!(service.object_path(), "/service0");
        assert_eq!(service.characteristics()[0].object_path(), "/service0/char0");
        assert_eq!(service.characteristics()[1].object_path(), "/service0/char1");
        assert_eq!(service.characteristics()[1].service_path(), "/service0");
    }

    #[test]
    fn characteristics_added_after_attach_get_paths_too() {
        let store = ValueStore::new();
        let mut app = Application::new();
        app.add_service(Service::new(uuid(1), true));
        app.services[0]
            .add_characteristic(Characteristic::new(uuid(2), vec![Flag::Read], store))
            .unwrap();
        assert_eq!(
            app.services()[0].characteristics()[0].object_path(),
            "/service0/char0"
        );
    }

    #[test]
    fn duplicate_uuid_in_one_service_is_rejected() {
        let store = ValueStore::new();
        let mut service = Service::new(uuid(1), true);
        service
            .add_characteristic(Characteristic::new(uuid(2), vec![Flag::Read], store.clone()))
            .unwrap();

        let err = service
            .add_characteristic(Characteristic::new(uuid(2), vec![Flag::Write], store))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateUuid(u) if u == uuid(2)));
        assert_eq!(service.characteristics().len(), 1);
    }

    #[test]
    fn enumerate_is_idempotent() {
        let app = demo_application();
        assert_eq!(app.enumerate(), app.enumerate());
    }

    #[test]
    fn enumerate_paths_are_unique() {
        let app = demo_application();
        let mut paths: Vec<_> = app.enumerate().into_iter().map(|r| r.path).collect();
        let total = paths.len();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), total);
    }

    #[test]
    fn enumerate_keeps_referential_integrity() {
        let app = demo_application();
        let records = app.enumerate();
        let service_paths: Vec<_> = records
            .iter()
            .filter(|r| r.interface == SERVICE_IFACE)
            .map(|r| r.path.clone())
            .collect();

        for record in records.iter().filter(|r| r.interface == CHARACTERISTIC_IFACE) {
            let service_ref = record
                .properties
                .iter()
                .find(|(name, _)| *name == "Service")
                .map(|(_, value)| value)
                .unwrap();
            match service_ref {
                PropertyValue::ObjectPath(p) => assert!(service_paths.contains(p)),
                other => panic!("Service property has wrong type: {other:?}"),
            }
        }
    }

    #[test]
    fn read_and_write_flow_through_the_shared_store() {
        let app = demo_application();
        let writable = app.characteristic_at("/service0/char0").unwrap();
        let read_only = app.characteristic_at("/service0/char1").unwrap();

        writable.write(&6u32.to_le_bytes()).unwrap();
        assert_eq!(read_only.read().unwrap(), 36u32.to_le_bytes().to_vec());
    }

    #[test]
    fn flags_gate_operations() {
        let app = demo_application();
        let read_only = app.characteristic_at("/service0/char1").unwrap();

        let err = read_only.write(&1u32.to_le_bytes()).unwrap_err();
        assert!(matches!(err, Error::OperationNotPermitted(Flag::Write)));

        let store = ValueStore::new();
        let mut service = Service::new(uuid(9), true);
        service
            .add_characteristic(Characteristic::new(uuid(10), vec![Flag::Write], store))
            .unwrap();
        let mut app = Application::new();
        app.add_service(service);
        let write_only = app.characteristic_at("/service0/char0").unwrap();
        let err = write_only.read().unwrap_err();
        assert!(matches!(err, Error::OperationNotPermitted(Flag::Read)));
    }

    #[test]
    fn unknown_path_is_reported() {
        let app = demo_application();
        let err = app.characteristic_at("/service0/char9").unwrap_err();
        assert!(matches!(err, Error::UnknownObject(p) if p == "/service0/char9"));
    }

    #[test]
    fn malformed_write_propagates_through_the_characteristic() {
        let app = demo_application();
        let writable = app.characteristic_at("/service0/char0").unwrap();
        let err = writable.write(&[1, 2]).unwrap_err();
        assert!(matches!(err, Error::MalformedValue { actual: 2, .. }));
    }
}

//! Shared vocabulary types for the GATT object tree.

use std::fmt;

/// Capability flags a characteristic declares at construction.
///
/// The host stack is the authority on enforcing these; the tree still
/// re-checks them so a disallowed call arriving anyway is rejected instead
/// of silently served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    Read,
    Write,
    WriteWithoutResponse,
    Notify,
    Indicate,
}

impl Flag {
    /// Wire spelling used in the `Flags` property BlueZ reads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::WriteWithoutResponse => "write-without-response",
            Self::Notify => "notify",
            Self::Indicate => "indicate",
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A property value as it appears in the enumeration snapshot.
///
/// Kept free of D-Bus types so the tree itself never depends on the bus;
/// the bluez layer maps these onto variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Str(String),
    Bool(bool),
    ObjectPath(String),
    ObjectPathList(Vec<String>),
    StrList(Vec<String>),
}

/// One exported object as seen by the host's discovery call: its path, the
/// GATT interface it implements, and that interface's properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRecord {
    pub path: String,
    pub interface: &'static str,
    pub properties: Vec<(&'static str, PropertyValue)>,
}

/// Anything that can present itself as one D-Bus object in the tree.
///
/// Services and characteristics both implement this, which lets the
/// application enumerate and export them uniformly.
pub trait GattObject {
    fn object_path(&self) -> &str;
    fn interface(&self) -> &'static str;
    fn properties(&self) -> Vec<(&'static str, PropertyValue)>;

    fn record(&self) -> ObjectRecord {
        ObjectRecord {
            path: self.object_path().to_string(),
            interface: self.interface(),
            properties: self.properties(),
        }
    }
}

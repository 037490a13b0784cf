//! Domain layer: the GATT object tree and its value semantics.
//!
//! Everything here is plain data and logic with no D-Bus attachment, so the
//! whole tree can be built and exercised without a bus.

pub mod gatt;
pub mod models;
pub mod settings;
pub mod store;

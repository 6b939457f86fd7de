//! Device records and inventory collections.
//!
//! A [`Device`] is one validated inventory entry: where the device lives,
//! how to talk to it, and an opaque per-driver options blob. An
//! [`Inventory`] is an ordered, name-unique collection of devices, usually
//! parsed from a JSON payload of the form:
//!
//! ```json
//! {
//!   "inventory_nodes": [
//!     {"name": "core-sw-1", "attributes": {"host": "10.0.0.1", "user": "admin"}}
//!   ]
//! }
//! ```

mod inventory;
mod record;

pub use inventory::Inventory;
pub use record::Device;

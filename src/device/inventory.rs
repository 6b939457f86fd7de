//! Ordered, name-unique device collections.

use std::ops::Index;
use std::slice;

use log::debug;
use serde::Deserialize;
use serde_json::Value;

use crate::device::Device;
use crate::driver::DriverRegistry;
use crate::error::InventoryError;

#[derive(Debug, Deserialize)]
struct InventoryNode {
    name: String,
    #[serde(default)]
    attributes: Value,
}

/// An ordered collection of devices with unique names.
///
/// Construction is the only way in, so every `Inventory` in the program is
/// known to be duplicate-free. Iteration order is the order devices were
/// given, and broker batch results come back in the same order.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    devices: Vec<Device>,
}

impl Inventory {
    /// Builds an inventory from devices, rejecting duplicate names.
    pub fn new(devices: Vec<Device>) -> Result<Self, InventoryError> {
        let mut seen = std::collections::HashSet::new();
        for device in &devices {
            if !seen.insert(device.name.as_str()) {
                return Err(InventoryError::DuplicateName {
                    name: device.name.clone(),
                });
            }
        }
        Ok(Self { devices })
    }

    /// Parses an inventory from a JSON payload of the form
    /// `{"inventory_nodes": [{"name": ..., "attributes": {...}}, ...]}`.
    ///
    /// Each node's attributes are decoded as a [`Device`] with a closed
    /// schema, then stamped with the node's name. Structural problems
    /// (missing `inventory_nodes`, malformed attributes, duplicate names)
    /// fail here; cross-field checks like driver resolution are deferred to
    /// [`Inventory::validate`].
    pub fn from_json(payload: &str) -> Result<Self, InventoryError> {
        let value: Value = serde_json::from_str(payload).map_err(|err| InventoryError::Parse {
            message: err.to_string(),
        })?;
        let Some(root) = value.as_object() else {
            return Err(InventoryError::Parse {
                message: "inventory payload must be a JSON object".to_string(),
            });
        };
        let nodes = root
            .get("inventory_nodes")
            .ok_or(InventoryError::MissingNodes)?;
        let nodes: Vec<InventoryNode> =
            serde_json::from_value(nodes.clone()).map_err(|err| InventoryError::Parse {
                message: format!("invalid inventory_nodes: {err}"),
            })?;

        let mut devices = Vec::with_capacity(nodes.len());
        for node in nodes {
            let attributes = match node.attributes {
                Value::Null => Value::Object(serde_json::Map::new()),
                other => other,
            };
            let mut device: Device =
                serde_json::from_value(attributes).map_err(|err| InventoryError::Parse {
                    message: format!("device '{}': {err}", node.name),
                })?;
            device.name = node.name;
            devices.push(device);
        }
        debug!("parsed inventory with {} device(s)", devices.len());
        Self::new(devices)
    }

    /// Parses and fully validates an inventory against a driver registry.
    ///
    /// All validation errors are collected and reported together, so one
    /// pass over the output fixes the whole payload. On error, no inventory
    /// is produced at all.
    pub fn from_json_validated(
        payload: &str,
        registry: &DriverRegistry,
    ) -> Result<Self, InventoryError> {
        let inventory = Self::from_json(payload)?;
        let errors = inventory.validate(registry);
        if errors.is_empty() {
            Ok(inventory)
        } else {
            Err(InventoryError::Validation { errors })
        }
    }

    /// Checks every device against the registry, returning all problems
    /// found: empty names or hosts, out-of-range ports, unknown drivers,
    /// and driver options the resolved factory refuses.
    pub fn validate(&self, registry: &DriverRegistry) -> Vec<String> {
        let mut errors = Vec::new();
        for device in &self.devices {
            if device.name.trim().is_empty() {
                errors.push(format!(
                    "device at host '{}': name must not be empty",
                    device.host
                ));
            }
            if device.host.trim().is_empty() {
                errors.push(format!("device '{}': host must not be empty", device.name));
            }
            if device.port == Some(0) {
                errors.push(format!(
                    "device '{}': port must be between 1 and 65535",
                    device.name
                ));
            }
            match registry.resolve(&device.driver) {
                Ok(factory) => {
                    if let Err(err) = factory.validate(device) {
                        errors.push(format!(
                            "device '{}': invalid options for driver '{}': {err}",
                            device.name, device.driver
                        ));
                    }
                }
                Err(err) => {
                    errors.push(format!("device '{}': {err}", device.name));
                }
            }
        }
        errors
    }

    /// Number of devices.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// True when the inventory has no devices.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// The device at `index`, if present.
    pub fn get(&self, index: usize) -> Option<&Device> {
        self.devices.get(index)
    }

    /// The device with the given name, if present.
    pub fn get_by_name(&self, name: &str) -> Option<&Device> {
        self.devices.iter().find(|device| device.name == name)
    }

    /// True when a device with the given name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.get_by_name(name).is_some()
    }

    /// True when a device with this record's name exists. Names are the
    /// identity key, so two records with the same name count as the same
    /// device regardless of their other attributes.
    pub fn contains_device(&self, device: &Device) -> bool {
        self.contains(&device.name)
    }

    /// Iterates devices in inventory order.
    pub fn iter(&self) -> slice::Iter<'_, Device> {
        self.devices.iter()
    }

    /// The devices as a slice.
    pub fn as_slice(&self) -> &[Device] {
        &self.devices
    }
}

impl Index<usize> for Inventory {
    type Output = Device;

    fn index(&self, index: usize) -> &Device {
        &self.devices[index]
    }
}

impl<'a> IntoIterator for &'a Inventory {
    type Item = &'a Device;
    type IntoIter = slice::Iter<'a, Device>;

    fn into_iter(self) -> Self::IntoIter {
        self.devices.iter()
    }
}

impl IntoIterator for Inventory {
    type Item = Device;
    type IntoIter = std::vec::IntoIter<Device>;

    fn into_iter(self) -> Self::IntoIter {
        self.devices.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{
        "inventory_nodes": [
            {"name": "r1", "attributes": {"host": "10.0.0.1", "user": "admin"}},
            {"name": "r2", "attributes": {"host": "10.0.0.2", "port": 2222}}
        ]
    }"#;

    #[test]
    fn test_from_json_preserves_order() {
        let inventory = Inventory::from_json(PAYLOAD).unwrap();
        assert_eq!(inventory.len(), 2);
        assert_eq!(inventory[0].name, "r1");
        assert_eq!(inventory[1].name, "r2");
        assert_eq!(inventory[1].port, Some(2222));
    }

    #[test]
    fn test_from_json_missing_nodes() {
        let err = Inventory::from_json(r#"{"devices": []}"#).unwrap_err();
        assert!(matches!(err, InventoryError::MissingNodes));
    }

    #[test]
    fn test_from_json_not_an_object() {
        let err = Inventory::from_json("[1, 2, 3]").unwrap_err();
        assert!(matches!(err, InventoryError::Parse { .. }));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let devices = vec![Device::new("r1", "10.0.0.1"), Device::new("r1", "10.0.0.2")];
        let err = Inventory::new(devices).unwrap_err();
        assert!(matches!(err, InventoryError::DuplicateName { name } if name == "r1"));
    }

    #[test]
    fn test_null_attributes_fail_on_missing_host() {
        let payload = r#"{"inventory_nodes": [{"name": "r1"}]}"#;
        let err = Inventory::from_json(payload).unwrap_err();
        assert!(matches!(err, InventoryError::Parse { .. }));
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let registry = DriverRegistry::with_builtin_drivers();
        let devices = vec![
            Device::new("r1", "10.0.0.1"),
            Device::new("r2", "10.0.0.2").with_driver("telnet"),
            Device::new("r3", "").with_port(0),
        ];
        let inventory = Inventory::new(devices).unwrap();
        let errors = inventory.validate(&registry);
        assert_eq!(errors.len(), 3);
        assert!(errors[0].contains("unknown driver 'telnet'"));
        assert!(errors[1].contains("host must not be empty"));
        assert!(errors[2].contains("port must be between"));
    }

    #[test]
    fn test_validate_reports_every_problem_per_device() {
        let registry = DriverRegistry::with_builtin_drivers();
        let devices = vec![Device::new("r1", "").with_port(0).with_driver("telnet")];
        let inventory = Inventory::new(devices).unwrap();
        let errors = inventory.validate(&registry);
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.contains("host must not be empty")));
        assert!(errors.iter().any(|e| e.contains("port must be between")));
        assert!(errors.iter().any(|e| e.contains("unknown driver 'telnet'")));
    }

    #[test]
    fn test_from_json_validated_is_atomic() {
        let registry = DriverRegistry::with_builtin_drivers();
        let payload = r#"{
            "inventory_nodes": [
                {"name": "r1", "attributes": {"host": "10.0.0.1"}},
                {"name": "r2", "attributes": {"host": "10.0.0.2", "driver": "nope"}}
            ]
        }"#;
        let err = Inventory::from_json_validated(payload, &registry).unwrap_err();
        assert!(matches!(err, InventoryError::Validation { errors } if errors.len() == 1));
    }

    #[test]
    fn test_lookup_by_name() {
        let inventory = Inventory::from_json(PAYLOAD).unwrap();
        assert!(inventory.contains("r2"));
        assert!(!inventory.contains("r9"));
        assert_eq!(inventory.get_by_name("r1").map(|d| d.host.as_str()), Some("10.0.0.1"));
    }

    #[test]
    fn test_membership_by_record() {
        let inventory = Inventory::from_json(PAYLOAD).unwrap();
        // Same name counts as the same device even if attributes differ.
        assert!(inventory.contains_device(&Device::new("r1", "192.0.2.1")));
        assert!(!inventory.contains_device(&Device::new("r9", "10.0.0.1")));
    }
}

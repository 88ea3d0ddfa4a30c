//! State file structures for persisting infrastructure state

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The main state file structure that persists to the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    /// State file format version
    pub version: u32,
    /// Monotonically increasing number for each state modification
    pub serial: u64,
    /// Unique identifier for this state lineage (prevents accidental overwrites)
    pub lineage: String,
    /// Version of Vela that last modified this state
    pub vela_version: String,
    /// All managed resources and their current state
    pub resources: Vec<ResourceState>,
}

impl StateFile {
    /// Current state file format version
    pub const CURRENT_VERSION: u32 = 1;

    /// Create a new empty state file
    pub fn new() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            serial: 0,
            lineage: uuid::Uuid::new_v4().to_string(),
            vela_version: env!("CARGO_PKG_VERSION").to_string(),
            resources: Vec::new(),
        }
    }

    /// Increment serial and update vela version for a new state write
    pub fn increment_serial(&mut self) {
        self.serial += 1;
        self.vela_version = env!("CARGO_PKG_VERSION").to_string();
    }

    /// Find a resource by type and name
    pub fn find_resource(&self, resource_type: &str, name: &str) -> Option<&ResourceState> {
        self.resources
            .iter()
            .find(|r| r.resource_type == resource_type && r.name == name)
    }

    /// Find a resource mutably by type and name
    pub fn find_resource_mut(
        &mut self,
        resource_type: &str,
        name: &str,
    ) -> Option<&mut ResourceState> {
        self.resources
            .iter_mut()
            .find(|r| r.resource_type == resource_type && r.name == name)
    }

    /// Add or update a resource in the state
    pub fn upsert_resource(&mut self, resource: ResourceState) {
        if let Some(existing) = self.find_resource_mut(&resource.resource_type, &resource.name) {
            *existing = resource;
        } else {
            self.resources.push(resource);
        }
    }

    /// Remove a resource from the state
    pub fn remove_resource(&mut self, resource_type: &str, name: &str) -> Option<ResourceState> {
        if let Some(pos) = self
            .resources
            .iter()
            .position(|r| r.resource_type == resource_type && r.name == name)
        {
            Some(self.resources.remove(pos))
        } else {
            None
        }
    }
}

impl Default for StateFile {
    fn default() -> Self {
        Self::new()
    }
}

/// State of a single managed resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceState {
    /// Resource type (e.g., "cynosdb.cluster", "cwp.license_order")
    pub resource_type: String,
    /// Resource name (the binding given in the manifest)
    pub name: String,
    /// Provider name (e.g., "tencentcloud")
    pub provider: String,
    /// Remote identifier the provider uses to address this resource.
    ///
    /// A single remote id for clusters, a composite key such as
    /// "cluster#account#host" for resources the API addresses by several
    /// fields. `None` means the resource was declared but never confirmed
    /// remotely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    /// All attributes of the resource as JSON values
    pub attributes: HashMap<String, serde_json::Value>,
    /// Whether this resource is protected from deletion
    #[serde(default)]
    pub protected: bool,
}

impl ResourceState {
    /// Create a new resource state
    pub fn new(
        resource_type: impl Into<String>,
        name: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
            provider: provider.into(),
            identifier: None,
            attributes: HashMap::new(),
            protected: false,
        }
    }

    /// Set the remote identifier
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// Set an attribute value
    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Mark this resource as protected
    pub fn with_protected(mut self, protected: bool) -> Self {
        self.protected = protected;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_file_new() {
        let state = StateFile::new();
        assert_eq!(state.version, StateFile::CURRENT_VERSION);
        assert_eq!(state.serial, 0);
        assert!(!state.lineage.is_empty());
        assert!(state.resources.is_empty());
    }

    #[test]
    fn test_state_file_increment_serial() {
        let mut state = StateFile::new();
        assert_eq!(state.serial, 0);
        state.increment_serial();
        assert_eq!(state.serial, 1);
        state.increment_serial();
        assert_eq!(state.serial, 2);
    }

    #[test]
    fn test_state_file_upsert_resource() {
        let mut state = StateFile::new();

        let resource1 = ResourceState::new("cynosdb.cluster", "orders", "tencentcloud")
            .with_identifier("cynosdbmysql-bzs467r3")
            .with_attribute("cluster_name", serde_json::json!("orders"));

        state.upsert_resource(resource1);
        assert_eq!(state.resources.len(), 1);

        // Update the same resource
        let resource2 = ResourceState::new("cynosdb.cluster", "orders", "tencentcloud")
            .with_identifier("cynosdbmysql-bzs467r3")
            .with_attribute("cluster_name", serde_json::json!("orders-renamed"));

        state.upsert_resource(resource2);
        assert_eq!(state.resources.len(), 1);
        assert_eq!(
            state.resources[0].attributes.get("cluster_name"),
            Some(&serde_json::json!("orders-renamed"))
        );
    }

    #[test]
    fn test_state_file_remove_resource() {
        let mut state = StateFile::new();

        let resource = ResourceState::new("cwp.license_order", "fleet", "tencentcloud");
        state.upsert_resource(resource);
        assert_eq!(state.resources.len(), 1);

        let removed = state.remove_resource("cwp.license_order", "fleet");
        assert!(removed.is_some());
        assert_eq!(state.resources.len(), 0);

        // Removing non-existent resource returns None
        let removed = state.remove_resource("cwp.license_order", "other");
        assert!(removed.is_none());
    }

    #[test]
    fn test_composite_identifier_survives_round_trip() {
        let mut state = StateFile::new();
        let resource = ResourceState::new("cynosdb.account", "app", "tencentcloud")
            .with_identifier("cynosdbmysql-bzs467r3#app_user#%");
        state.upsert_resource(resource);

        let json = serde_json::to_string_pretty(&state).unwrap();
        let deserialized: StateFile = serde_json::from_str(&json).unwrap();

        assert_eq!(
            deserialized.resources[0].identifier.as_deref(),
            Some("cynosdbmysql-bzs467r3#app_user#%")
        );
    }

    #[test]
    fn test_missing_identifier_deserializes_as_none() {
        // States written before a create confirmed have no identifier field
        let json = serde_json::json!({
            "version": 1,
            "serial": 3,
            "lineage": "b2b7467e-7a38-4fa2-8e83-55e210ac10a8",
            "vela_version": "0.1.0",
            "resources": [{
                "resource_type": "cynosdb.cluster",
                "name": "orders",
                "provider": "tencentcloud",
                "attributes": {}
            }]
        });

        let state: StateFile = serde_json::from_value(json).unwrap();
        assert_eq!(state.resources[0].identifier, None);
        assert!(!state.resources[0].protected);
    }

    #[test]
    fn test_resource_state_protected() {
        let resource =
            ResourceState::new("cynosdb.cluster", "prod", "tencentcloud").with_protected(true);
        assert!(resource.protected);
    }
}

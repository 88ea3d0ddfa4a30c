//! Effect - Actions to reconcile desired and actual state
//!
//! The differ turns (desired, actual) pairs into effects. Effects are
//! inert descriptions; nothing touches the cloud until the CLI executes
//! them through a provider.

use crate::resource::{Resource, ResourceId, State};

/// An action against a provider
#[derive(Debug, Clone)]
pub enum Effect {
    /// Refresh a data source. Never mutates anything remotely; the result
    /// only feeds attributes into the rest of the plan.
    Read(Resource),
    /// Create a resource that does not exist yet
    Create(Resource),
    /// Update an existing resource in place
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
    },
    /// Delete an existing resource
    Delete {
        id: ResourceId,
        /// Remote identifier recorded in state, e.g. "cynosdbmysql-bzs467r3"
        identifier: Option<String>,
    },
}

impl Effect {
    /// Resource the effect applies to
    pub fn resource_id(&self) -> &ResourceId {
        match self {
            Effect::Read(resource) => &resource.id,
            Effect::Create(resource) => &resource.id,
            Effect::Update { id, .. } => id,
            Effect::Delete { id, .. } => id,
        }
    }

    /// Whether executing this effect changes remote infrastructure
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Effect::Read(_))
    }

    /// Short verb for display ("read", "create", ...)
    pub fn action(&self) -> &'static str {
        match self {
            Effect::Read(_) => "read",
            Effect::Create(_) => "create",
            Effect::Update { .. } => "update",
            Effect::Delete { .. } => "delete",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_is_not_mutating() {
        let resource = Resource::new("cwp.machines", "all");
        assert!(!Effect::Read(resource).is_mutating());
    }

    #[test]
    fn delete_carries_remote_identifier() {
        let effect = Effect::Delete {
            id: ResourceId::new("cynosdb.cluster", "main"),
            identifier: Some("cynosdbmysql-bzs467r3".to_string()),
        };
        assert!(effect.is_mutating());
        assert_eq!(effect.action(), "delete");
        assert_eq!(effect.resource_id().to_string(), "cynosdb.cluster.main");
    }
}

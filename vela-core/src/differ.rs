//! Differ - Compare desired state with current state to generate a Plan
//!
//! Compares the desired state declared in the manifest with the current
//! state fetched from the Provider, and generates a list of required
//! Effects (Plan).

use std::collections::HashMap;

use crate::effect::Effect;
use crate::plan::Plan;
use crate::resource::{Resource, ResourceId, State, Value};

/// Result of a diff operation
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    /// Data source -> always refreshed, never mutated
    Read(Resource),
    /// Resource does not exist -> needs creation
    Create(Resource),
    /// Resource exists with differences -> needs update
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Resource exists with no differences -> no action needed
    NoChange(ResourceId),
    /// Resource exists but not in desired state -> needs deletion
    Delete(ResourceId),
}

impl Diff {
    /// Returns whether this Diff involves an action
    pub fn is_change(&self) -> bool {
        !matches!(self, Diff::NoChange(_))
    }
}

/// Compare desired state with current state to compute a Diff
pub fn diff(desired: &Resource, current: &State) -> Diff {
    if desired.is_data_source() {
        return Diff::Read(desired.clone());
    }

    if !current.exists {
        return Diff::Create(desired.clone());
    }

    let changed = find_changed_attributes(&desired.attributes, &current.attributes);

    if changed.is_empty() {
        Diff::NoChange(desired.id.clone())
    } else {
        Diff::Update {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        }
    }
}

/// Find changed attributes between desired and current state
fn find_changed_attributes(
    desired: &HashMap<String, Value>,
    current: &HashMap<String, Value>,
) -> Vec<String> {
    let mut changed = Vec::new();

    for (key, desired_value) in desired {
        // Skip internal attributes (starting with _)
        if key.starts_with('_') {
            continue;
        }

        match current.get(key) {
            Some(current_value) if current_value == desired_value => {}
            _ => changed.push(key.clone()),
        }
    }

    changed
}

/// Compute Diff for multiple resources and generate a Plan
pub fn create_plan(desired: &[Resource], current_states: &HashMap<ResourceId, State>) -> Plan {
    let mut plan = Plan::new();

    for resource in desired {
        let current = current_states
            .get(&resource.id)
            .cloned()
            .unwrap_or_else(|| State::not_found(resource.id.clone()));

        let d = diff(resource, &current);

        match d {
            Diff::Read(r) => plan.add(Effect::Read(r)),
            Diff::Create(r) => plan.add(Effect::Create(r)),
            Diff::Update { id, from, to, .. } => {
                plan.add(Effect::Update { id, from, to });
            }
            Diff::NoChange(_) => {}
            Diff::Delete(id) => plan.add(Effect::Delete {
                id,
                identifier: None,
            }),
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_create_when_not_exists() {
        let desired = Resource::new("cynosdb.cluster", "main");
        let current = State::not_found(ResourceId::new("cynosdb.cluster", "main"));

        let result = diff(&desired, &current);
        assert!(matches!(result, Diff::Create(_)));
    }

    #[test]
    fn diff_no_change_when_same() {
        let desired = Resource::new("cynosdb.cluster", "main")
            .with_attribute("cluster_name", Value::String("demo".to_string()));

        let mut attrs = HashMap::new();
        attrs.insert(
            "cluster_name".to_string(),
            Value::String("demo".to_string()),
        );
        let current = State::existing(ResourceId::new("cynosdb.cluster", "main"), attrs);

        let result = diff(&desired, &current);
        assert!(matches!(result, Diff::NoChange(_)));
    }

    #[test]
    fn diff_update_when_different() {
        let desired = Resource::new("cynosdb.cluster", "main")
            .with_attribute("cluster_name", Value::String("renamed".to_string()));

        let mut attrs = HashMap::new();
        attrs.insert(
            "cluster_name".to_string(),
            Value::String("demo".to_string()),
        );
        let current = State::existing(ResourceId::new("cynosdb.cluster", "main"), attrs);

        let result = diff(&desired, &current);
        match result {
            Diff::Update {
                changed_attributes, ..
            } => {
                assert!(changed_attributes.contains(&"cluster_name".to_string()));
            }
            _ => panic!("Expected Update"),
        }
    }

    #[test]
    fn diff_data_source_always_reads() {
        let desired = Resource::new("cwp.machines", "all")
            .with_attribute("machine_type", Value::String("CVM".to_string()))
            .with_read_only(true);

        // Even when state claims it exists, a data source is re-read
        let current = State::existing(ResourceId::new("cwp.machines", "all"), HashMap::new());

        let result = diff(&desired, &current);
        assert!(matches!(result, Diff::Read(_)));
    }

    #[test]
    fn internal_attributes_are_ignored() {
        let desired = Resource::new("cynosdb.account", "app")
            .with_attribute("account_name", Value::String("app".to_string()))
            .with_attribute("_binding", Value::String("acct".to_string()));

        let mut attrs = HashMap::new();
        attrs.insert(
            "account_name".to_string(),
            Value::String("app".to_string()),
        );
        let current = State::existing(ResourceId::new("cynosdb.account", "app"), attrs);

        let result = diff(&desired, &current);
        assert!(matches!(result, Diff::NoChange(_)));
    }

    #[test]
    fn create_plan_from_resources() {
        let resources = vec![
            Resource::new("cynosdb.cluster", "new-cluster"),
            Resource::new("cynosdb.cluster", "existing-cluster")
                .with_attribute("deletion_protection", Value::Bool(true)),
        ];

        let mut current_states = HashMap::new();
        let mut attrs = HashMap::new();
        attrs.insert("deletion_protection".to_string(), Value::Bool(false));
        current_states.insert(
            ResourceId::new("cynosdb.cluster", "existing-cluster"),
            State::existing(ResourceId::new("cynosdb.cluster", "existing-cluster"), attrs),
        );

        let plan = create_plan(&resources, &current_states);

        assert_eq!(plan.effects().len(), 2);
        assert!(matches!(plan.effects()[0], Effect::Create(_)));
        assert!(matches!(plan.effects()[1], Effect::Update { .. }));
    }
}

//! Plan - Ordered set of effects ready for execution

use std::fmt;

use crate::effect::Effect;

/// Execution plan produced by the differ
#[derive(Debug, Default)]
pub struct Plan {
    effects: Vec<Effect>,
}

impl Plan {
    pub fn new() -> Self {
        Self {
            effects: Vec::new(),
        }
    }

    pub fn add(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for effect in &self.effects {
            match effect {
                Effect::Read(_) => summary.read += 1,
                Effect::Create(_) => summary.create += 1,
                Effect::Update { .. } => summary.update += 1,
                Effect::Delete { .. } => summary.delete += 1,
            }
        }
        summary
    }
}

/// Counts of each effect kind in a plan
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PlanSummary {
    pub read: usize,
    pub create: usize,
    pub update: usize,
    pub delete: usize,
}

impl PlanSummary {
    pub fn total_changes(&self) -> usize {
        self.create + self.update + self.delete
    }
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Plan: {} to create, {} to update, {} to delete",
            self.create, self.update, self.delete
        )?;
        if self.read > 0 {
            write!(f, " ({} data sources to read)", self.read)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Resource, ResourceId, State};

    #[test]
    fn summary_counts_each_effect_kind() {
        let mut plan = Plan::new();
        plan.add(Effect::Read(Resource::new("cwp.machines", "all")));
        plan.add(Effect::Create(Resource::new("cynosdb.cluster", "main")));
        plan.add(Effect::Update {
            id: ResourceId::new("cynosdb.account", "app"),
            from: State::not_found(ResourceId::new("cynosdb.account", "app")),
            to: Resource::new("cynosdb.account", "app"),
        });
        plan.add(Effect::Delete {
            id: ResourceId::new("cwp.license_order", "old"),
            identifier: None,
        });

        let summary = plan.summary();
        assert_eq!(summary.read, 1);
        assert_eq!(summary.create, 1);
        assert_eq!(summary.update, 1);
        assert_eq!(summary.delete, 1);
        assert_eq!(summary.total_changes(), 3);
    }

    #[test]
    fn summary_display_format() {
        let mut plan = Plan::new();
        plan.add(Effect::Create(Resource::new("cynosdb.cluster", "main")));
        assert_eq!(
            plan.summary().to_string(),
            "Plan: 1 to create, 0 to update, 0 to delete"
        );
    }

    #[test]
    fn empty_plan() {
        let plan = Plan::new();
        assert!(plan.is_empty());
        assert_eq!(plan.summary().total_changes(), 0);
    }
}

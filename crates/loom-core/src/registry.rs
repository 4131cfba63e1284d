//! The workflow registry (§4.4): name -> definition, plus a derived
//! event-type -> names index kept in sync on every mutation.

use std::collections::HashMap;

use crate::workflow::WorkflowDefinition;

#[derive(Default)]
pub struct WorkflowRegistry {
    by_name: HashMap<String, WorkflowDefinition>,
    by_event_type: HashMap<String, Vec<String>>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a workflow, atomically updating both indices. Re-registering
    /// an existing name first tears down its old event-type bindings so no
    /// dangling references remain.
    pub fn register(&mut self, definition: WorkflowDefinition) {
        let name = definition.name.clone();
        self.unregister(&name);

        for event_type in &definition.trigger.event_types {
            let names = self.by_event_type.entry(event_type.clone()).or_default();
            if !names.contains(&name) {
                names.push(name.clone());
            }
        }

        self.by_name.insert(name, definition);
    }

    /// Removes a workflow and all of its event-type bindings. A no-op if the
    /// name isn't registered.
    pub fn unregister(&mut self, name: &str) {
        if let Some(existing) = self.by_name.remove(name) {
            for event_type in &existing.trigger.event_types {
                if let Some(names) = self.by_event_type.get_mut(event_type) {
                    names.retain(|existing| existing != name);
                    if names.is_empty() {
                        self.by_event_type.remove(event_type);
                    }
                }
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&WorkflowDefinition> {
        self.by_name.get(name)
    }

    pub fn get_all(&self) -> Vec<&WorkflowDefinition> {
        self.by_name.values().collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.by_name.keys().map(String::as_str).collect()
    }

    pub fn count(&self) -> usize {
        self.by_name.len()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Candidate workflows for an event type, in registration order (§4.4:
    /// "returns a stable slice"). The resolver is responsible for predicate
    /// filtering and priority sort, and relies on this order to break ties
    /// among equal-priority workflows.
    pub fn find_by_event_type(&self, event_type: &str) -> Vec<&WorkflowDefinition> {
        self.by_event_type
            .get(event_type)
            .into_iter()
            .flatten()
            .filter_map(|name| self.by_name.get(name))
            .collect()
    }

    pub fn clear(&mut self) {
        self.by_name.clear();
        self.by_event_type.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::event::Event;
    use crate::workflow::{Executor, Trigger, WorkflowResult};

    struct Noop;

    #[async_trait::async_trait]
    impl Executor for Noop {
        async fn execute(
            &self,
            _event: &Event,
            context: crate::context::WorkflowContext,
        ) -> WorkflowResult {
            WorkflowResult::ok(context, None)
        }
    }

    fn workflow(name: &str, event_type: &str) -> WorkflowDefinition {
        WorkflowDefinition::new(
            name,
            "test",
            Trigger::new(vec![event_type.to_string()], 5),
            Arc::new(Noop),
        )
    }

    #[test]
    fn register_indexes_by_event_type() {
        let mut registry = WorkflowRegistry::new();
        registry.register(workflow("A", "T1"));
        registry.register(workflow("B", "T1"));

        assert_eq!(registry.find_by_event_type("T1").len(), 2);
        assert_eq!(registry.count(), 2);
    }

    #[test]
    fn reregistering_resyncs_event_type_index() {
        let mut registry = WorkflowRegistry::new();
        registry.register(workflow("A", "T1"));
        registry.register(workflow("A", "T2"));

        assert_eq!(registry.find_by_event_type("T1").len(), 0);
        assert_eq!(registry.find_by_event_type("T2").len(), 1);
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn find_by_event_type_preserves_registration_order() {
        let mut registry = WorkflowRegistry::new();
        registry.register(workflow("A", "T1"));
        registry.register(workflow("B", "T1"));
        registry.register(workflow("C", "T1"));

        let names: Vec<&str> = registry
            .find_by_event_type("T1")
            .into_iter()
            .map(|def| def.name.as_str())
            .collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[test]
    fn unregister_removes_dangling_index_entries() {
        let mut registry = WorkflowRegistry::new();
        registry.register(workflow("A", "T1"));
        registry.unregister("A");

        assert!(registry.find_by_event_type("T1").is_empty());
        assert_eq!(registry.count(), 0);
    }
}

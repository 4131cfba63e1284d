//! The workflow resolver (§4.5): given an event and a registry snapshot,
//! produces the ordered list of workflows ready for enqueueing.

use crate::event::Event;
use crate::registry::WorkflowRegistry;
use crate::workflow::WorkflowDefinition;

/// A non-fatal diagnostic surfaced while resolving an event. Predicate
/// panics land here rather than aborting resolution (§4.5 step 2).
#[derive(Debug, Clone)]
pub struct ResolverWarning {
    pub workflow: String,
    pub message: String,
}

/// One workflow chosen to run for an event, paired with the priority it
/// will be enqueued under.
#[derive(Debug, Clone)]
pub struct Resolution<'a> {
    pub workflow: &'a WorkflowDefinition,
    pub priority: i32,
}

/// Resolves an event against a registry snapshot (§4.5):
///
/// 1. look up candidates via the event-type index,
/// 2. drop the ones whose predicate doesn't match (or panics),
/// 3. stable-sort by ascending priority, preserving registration order
///    (i.e. registry iteration order) among ties.
///
/// The resolver is pure with respect to the registry it is given; it reads
/// no other state and no registration mutates a resolution already in
/// flight.
pub fn resolve<'a>(
    event: &Event,
    registry: &'a WorkflowRegistry,
) -> (Vec<Resolution<'a>>, Vec<ResolverWarning>) {
    let candidates = registry.find_by_event_type(&event.event_type);

    let mut warnings = Vec::new();
    let mut matched: Vec<&WorkflowDefinition> = Vec::with_capacity(candidates.len());

    for def in candidates {
        match def.trigger.matches_checked(event) {
            Ok(true) => matched.push(def),
            Ok(false) => {}
            Err(()) => warnings.push(ResolverWarning {
                workflow: def.name.clone(),
                message: "predicate panicked; treated as no match".to_string(),
            }),
        }
    }

    // Stable sort preserves `find_by_event_type`'s registration order among
    // ties (§4.5 step 3, §8 invariant).
    matched.sort_by_key(|def| def.trigger.priority);

    let resolutions = matched
        .into_iter()
        .map(|workflow| Resolution {
            workflow,
            priority: workflow.trigger.priority,
        })
        .collect();

    (resolutions, warnings)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
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

    fn workflow(name: &str, event_type: &str, priority: i32) -> WorkflowDefinition {
        WorkflowDefinition::new(
            name,
            "test",
            Trigger::new(vec![event_type.to_string()], priority),
            Arc::new(Noop),
        )
    }

    #[test]
    fn resolves_in_priority_order() {
        let mut registry = WorkflowRegistry::new();
        registry.register(workflow("A", "T1", 5));
        registry.register(workflow("B", "T1", 5));
        registry.register(workflow("C", "T1", 1));

        let event = Event::new("T1", Default::default());
        let (resolutions, warnings) = resolve(&event, &registry);

        assert!(warnings.is_empty());
        let names: Vec<&str> = resolutions.iter().map(|r| r.workflow.name.as_str()).collect();
        // Scenario 1 (§8): C (priority 1) first, then A, B in registration order.
        assert_eq!(names, vec!["C", "A", "B"]);
        assert_eq!(resolutions[0].priority, 1);
    }

    #[test]
    fn predicate_panic_becomes_warning_not_match() {
        let mut registry = WorkflowRegistry::new();
        registry.register(
            WorkflowDefinition::new(
                "Panicky",
                "test",
                Trigger::new(vec!["T1".to_string()], 1)
                    .with_predicate(Arc::new(|_: &Event| panic!("boom"))),
                Arc::new(Noop),
            ),
        );

        let event = Event::new("T1", Default::default());
        let (resolutions, warnings) = resolve(&event, &registry);

        assert!(resolutions.is_empty());
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].workflow, "Panicky");
    }

    #[test]
    fn non_matching_event_type_yields_no_resolutions() {
        let mut registry = WorkflowRegistry::new();
        registry.register(workflow("A", "T1", 5));

        let event = Event::new("T2", Default::default());
        let (resolutions, _) = resolve(&event, &registry);
        assert!(resolutions.is_empty());
    }
}

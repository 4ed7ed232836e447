use crate::error::GfError;
use crate::process::step::TraversalStep;
use crate::process::steps::SideEffectCapStep;

/// A pure rewrite rule over a compiled step chain, applied exactly once (in registration order)
/// before the first pull. Strategies may insert, remove, replace or reorder steps but must keep
/// the element types at the chain boundaries intact. By convention they are idempotent; the
/// engine does not enforce this.
pub trait TraversalStrategy: Send {
    fn name(&self) -> &'static str;
    fn apply(&self, steps: &mut Vec<TraversalStep>) -> Result<(), GfError>;
}

/// Removes no-op identity steps, except labeled ones (a label can be a jump target or a path
/// entry and must survive).
pub struct IdentityRemovalStrategy;

impl TraversalStrategy for IdentityRemovalStrategy {
    fn name(&self) -> &'static str {
        "identity_removal"
    }

    fn apply(&self, steps: &mut Vec<TraversalStep>) -> Result<(), GfError> {
        steps.retain(|entry| entry.step.name() != "identity" || entry.label.is_some());
        Ok(())
    }
}

/// Collapses adjacent dedup steps into one, and pulls an unlabeled dedup in front of an adjacent
/// order barrier so the sort sees fewer traversers. Both rewrites preserve the emitted set.
pub struct DedupMergeStrategy;

impl TraversalStrategy for DedupMergeStrategy {
    fn name(&self) -> &'static str {
        "dedup_merge"
    }

    fn apply(&self, steps: &mut Vec<TraversalStep>) -> Result<(), GfError> {
        let mut index = 0;
        while index + 1 < steps.len() {
            if steps[index].step.name() == "dedup"
                && steps[index + 1].step.name() == "dedup"
                && steps[index + 1].label.is_none()
            {
                steps.remove(index + 1);
                continue;
            }
            index += 1;
        }
        for index in 0..steps.len().saturating_sub(1) {
            if steps[index].step.name() == "order"
                && steps[index + 1].step.name() == "dedup"
                && steps[index].label.is_none()
                && steps[index + 1].label.is_none()
            {
                steps.swap(index, index + 1);
            }
        }
        Ok(())
    }
}

/// If the chain ends in a step that aggregates into a memory key, appends a cap step so the
/// traversal yields the captured side effect instead of the pass-through stream.
pub struct SideEffectCapStrategy;

impl TraversalStrategy for SideEffectCapStrategy {
    fn name(&self) -> &'static str {
        "side_effect_cap"
    }

    fn apply(&self, steps: &mut Vec<TraversalStep>) -> Result<(), GfError> {
        if let Some(key) = steps.last().and_then(|entry| entry.step.capped_key()) {
            steps.push(TraversalStep::new(Box::new(SideEffectCapStep::new(&key))));
        }
        Ok(())
    }
}

/// The strategies registered on every new traversal, in application order.
pub fn default_strategies() -> Vec<Box<dyn TraversalStrategy>> {
    vec![
        Box::new(DedupMergeStrategy),
        Box::new(IdentityRemovalStrategy),
        Box::new(SideEffectCapStrategy),
    ]
}

use crate::error::GfError;
use crate::graph::property_value::PropertyValue;
use crate::process::step::{Step, StepContext, StepOutput};
use crate::process::Traverser;
use hashbrown::HashSet;

pub type FilterFn = Box<dyn Fn(&PropertyValue) -> Result<bool, GfError> + Send>;

/// Predicate-gated pass-through.
pub struct FilterStep {
    predicate: FilterFn,
}

impl FilterStep {
    pub fn new(predicate: FilterFn) -> Self {
        Self { predicate }
    }
}

impl Step for FilterStep {
    fn name(&self) -> &'static str {
        "filter"
    }

    fn accept(&mut self, traverser: Traverser, _ctx: &mut StepContext)
        -> Result<StepOutput, GfError> {
        Ok(if (self.predicate)(traverser.get())? {
            StepOutput::Emit(vec![traverser])
        } else {
            StepOutput::Emit(Vec::new())
        })
    }
}

/// Keeps vertex traversers whose property `key` equals `value`.
pub struct HasStep {
    key: String,
    value: PropertyValue,
}

impl HasStep {
    pub fn new(key: &str, value: PropertyValue) -> Self {
        Self { key: key.to_owned(), value }
    }
}

impl Step for HasStep {
    fn name(&self) -> &'static str {
        "has"
    }

    fn accept(&mut self, traverser: Traverser, ctx: &mut StepContext)
        -> Result<StepOutput, GfError> {
        let vertex_id = traverser.get().as_vertex()?;
        let keep = ctx.graph.vertex_property(vertex_id, &self.key) == Some(&self.value);
        Ok(StepOutput::Emit(if keep { vec![traverser] } else { Vec::new() }))
    }
}

/// No-op pass-through; removed by `IdentityRemovalStrategy` unless labeled (e.g. as a jump
/// target).
pub struct IdentityStep;

impl Step for IdentityStep {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn accept(&mut self, traverser: Traverser, _ctx: &mut StepContext)
        -> Result<StepOutput, GfError> {
        Ok(StepOutput::Emit(vec![traverser]))
    }
}

/// Drops traversers whose head value was already seen, collapsing bulk to one.
pub struct DedupStep {
    seen: HashSet<PropertyValue>,
}

impl DedupStep {
    pub fn new() -> Self {
        Self { seen: HashSet::new() }
    }
}

impl Default for DedupStep {
    fn default() -> Self {
        Self::new()
    }
}

impl Step for DedupStep {
    fn name(&self) -> &'static str {
        "dedup"
    }

    fn accept(&mut self, traverser: Traverser, _ctx: &mut StepContext)
        -> Result<StepOutput, GfError> {
        Ok(if self.seen.insert(traverser.get().clone()) {
            StepOutput::Emit(vec![traverser.with_bulk(1)])
        } else {
            StepOutput::Emit(Vec::new())
        })
    }
}

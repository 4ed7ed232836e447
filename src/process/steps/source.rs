use crate::error::GfError;
use crate::graph::property_value::PropertyValue;
use crate::graph::VertexId;
use crate::process::step::{Step, StepContext, StepOutput};
use crate::process::Traverser;
use std::collections::VecDeque;

/// Source step emitting every vertex of the graph, or only the vertices matching an equality
/// filter on a property key (index-accelerated when the store has an index for that key).
pub struct GraphVertexStep {
    filter: Option<(String, PropertyValue)>,
    pending: Option<VecDeque<VertexId>>,
}

impl GraphVertexStep {
    pub fn all() -> Self {
        Self { filter: None, pending: None }
    }

    pub fn filtered(key: &str, value: PropertyValue) -> Self {
        Self { filter: Some((key.to_owned(), value)), pending: None }
    }
}

impl Step for GraphVertexStep {
    fn name(&self) -> &'static str {
        "vertices"
    }

    fn extends_path(&self) -> bool {
        true
    }

    fn pull(&mut self, ctx: &mut StepContext) -> Result<Option<Traverser>, GfError> {
        if self.pending.is_none() {
            let ids = match &self.filter {
                Some((key, value)) => ctx.graph.vertex_ids_by(key, value).collect(),
                None => ctx.graph.vertex_ids().collect(),
            };
            self.pending = Some(ids);
        }
        let pending = self.pending.as_mut().expect("Unreachable");
        Ok(pending.pop_front().map(|id| Traverser::new(PropertyValue::Vertex(id))))
    }

    fn accept(&mut self, _traverser: Traverser, _ctx: &mut StepContext)
        -> Result<StepOutput, GfError> {
        unreachable!("Source steps do not accept upstream input")
    }
}

/// Source step emitting a fixed sequence of values, e.g. to wrap an OLAP side effect back into a
/// pipeline.
pub struct InjectStep {
    pending: VecDeque<PropertyValue>,
}

impl InjectStep {
    pub fn new(values: Vec<PropertyValue>) -> Self {
        Self { pending: values.into() }
    }
}

impl Step for InjectStep {
    fn name(&self) -> &'static str {
        "inject"
    }

    fn extends_path(&self) -> bool {
        true
    }

    fn pull(&mut self, _ctx: &mut StepContext) -> Result<Option<Traverser>, GfError> {
        Ok(self.pending.pop_front().map(Traverser::new))
    }

    fn accept(&mut self, _traverser: Traverser, _ctx: &mut StepContext)
        -> Result<StepOutput, GfError> {
        unreachable!("Source steps do not accept upstream input")
    }
}

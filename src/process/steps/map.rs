use crate::error::GfError;
use crate::graph::property_value::PropertyValue;
use crate::process::step::{Step, StepContext, StepOutput};
use crate::process::Traverser;

pub type MapFn = Box<dyn Fn(&PropertyValue) -> Result<PropertyValue, GfError> + Send>;
pub type FlatMapFn = Box<dyn Fn(&PropertyValue) -> Result<Vec<PropertyValue>, GfError> + Send>;

/// 1:1 transform of the traverser head.
pub struct MapStep {
    function: MapFn,
}

impl MapStep {
    pub fn new(function: MapFn) -> Self {
        Self { function }
    }
}

impl Step for MapStep {
    fn name(&self) -> &'static str {
        "map"
    }

    fn extends_path(&self) -> bool {
        true
    }

    fn accept(&mut self, traverser: Traverser, _ctx: &mut StepContext)
        -> Result<StepOutput, GfError> {
        let value = (self.function)(traverser.get())?;
        Ok(StepOutput::Emit(vec![traverser.split(value)]))
    }
}

/// 1:n transform of the traverser head.
pub struct FlatMapStep {
    function: FlatMapFn,
}

impl FlatMapStep {
    pub fn new(function: FlatMapFn) -> Self {
        Self { function }
    }
}

impl Step for FlatMapStep {
    fn name(&self) -> &'static str {
        "flat_map"
    }

    fn extends_path(&self) -> bool {
        true
    }

    fn accept(&mut self, traverser: Traverser, _ctx: &mut StepContext)
        -> Result<StepOutput, GfError> {
        let values = (self.function)(traverser.get())?;
        Ok(StepOutput::Emit(values.into_iter().map(|value| traverser.split(value)).collect()))
    }
}

/// Maps a vertex to one of its property values; vertices without the property are dropped.
pub struct ValuesStep {
    key: String,
}

impl ValuesStep {
    pub fn new(key: &str) -> Self {
        Self { key: key.to_owned() }
    }
}

impl Step for ValuesStep {
    fn name(&self) -> &'static str {
        "values"
    }

    fn extends_path(&self) -> bool {
        true
    }

    fn accept(&mut self, traverser: Traverser, ctx: &mut StepContext)
        -> Result<StepOutput, GfError> {
        let vertex_id = traverser.get().as_vertex()?;
        Ok(match ctx.graph.vertex_property(vertex_id, &self.key) {
            Some(value) => StepOutput::Emit(vec![traverser.split(value.clone())]),
            None => StepOutput::Emit(Vec::new()),
        })
    }
}

/// Moves a vertex traverser to the out-adjacent vertices.
pub struct OutStep;

impl Step for OutStep {
    fn name(&self) -> &'static str {
        "out"
    }

    fn extends_path(&self) -> bool {
        true
    }

    fn accept(&mut self, traverser: Traverser, ctx: &mut StepContext)
        -> Result<StepOutput, GfError> {
        let vertex_id = traverser.get().as_vertex()?;
        let children = ctx
            .graph
            .out_vertex_ids(vertex_id)
            .into_iter()
            .map(|id| traverser.split(PropertyValue::Vertex(id)))
            .collect();
        Ok(StepOutput::Emit(children))
    }
}

/// Moves a vertex traverser to the in-adjacent vertices.
pub struct InStep;

impl Step for InStep {
    fn name(&self) -> &'static str {
        "in"
    }

    fn extends_path(&self) -> bool {
        true
    }

    fn accept(&mut self, traverser: Traverser, ctx: &mut StepContext)
        -> Result<StepOutput, GfError> {
        let vertex_id = traverser.get().as_vertex()?;
        let children = ctx
            .graph
            .in_vertex_ids(vertex_id)
            .into_iter()
            .map(|id| traverser.split(PropertyValue::Vertex(id)))
            .collect();
        Ok(StepOutput::Emit(children))
    }
}

/// Maps a traverser to its path history as a list of values. Forces path tracking on for the
/// whole traversal.
pub struct PathStep;

impl Step for PathStep {
    fn name(&self) -> &'static str {
        "path"
    }

    fn requires_paths(&self) -> bool {
        true
    }

    fn accept(&mut self, traverser: Traverser, _ctx: &mut StepContext)
        -> Result<StepOutput, GfError> {
        let path = PropertyValue::List(traverser.path_values());
        Ok(StepOutput::Emit(vec![traverser.split(path)]))
    }
}

use crate::error::GfError;
use crate::graph::property_value::PropertyValue;
use crate::process::step::{Step, StepContext, StepOutput};
use crate::process::Traverser;
use rand::seq::SliceRandom;
use rand::thread_rng;
use std::cmp::Ordering;
use std::convert::TryFrom;

pub type CompareFn = Box<dyn Fn(&PropertyValue, &PropertyValue) -> Ordering + Send>;

/// Reordering barrier: buffers the entire upstream, emits it sorted by the natural value order or
/// a caller-supplied comparator.
pub struct OrderStep {
    comparator: Option<CompareFn>,
    buffer: Vec<Traverser>,
}

impl OrderStep {
    pub fn natural() -> Self {
        Self { comparator: None, buffer: Vec::new() }
    }

    pub fn by(comparator: CompareFn) -> Self {
        Self { comparator: Some(comparator), buffer: Vec::new() }
    }
}

impl Step for OrderStep {
    fn name(&self) -> &'static str {
        "order"
    }

    fn is_barrier(&self) -> bool {
        true
    }

    fn accept(&mut self, traverser: Traverser, _ctx: &mut StepContext)
        -> Result<StepOutput, GfError> {
        self.buffer.push(traverser);
        Ok(StepOutput::Emit(Vec::new()))
    }

    fn drain(&mut self, _ctx: &mut StepContext) -> Result<Vec<Traverser>, GfError> {
        let mut buffer = std::mem::take(&mut self.buffer);
        match &self.comparator {
            Some(comparator) => buffer.sort_by(|a, b| comparator(a.get(), b.get())),
            None => buffer.sort_by(|a, b| a.get().cmp(b.get())),
        }
        Ok(buffer)
    }
}

/// Reordering barrier emitting the upstream in random order. The one step that is deliberately
/// non-deterministic.
pub struct ShuffleStep {
    buffer: Vec<Traverser>,
}

impl ShuffleStep {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }
}

impl Default for ShuffleStep {
    fn default() -> Self {
        Self::new()
    }
}

impl Step for ShuffleStep {
    fn name(&self) -> &'static str {
        "shuffle"
    }

    fn is_barrier(&self) -> bool {
        true
    }

    fn accept(&mut self, traverser: Traverser, _ctx: &mut StepContext)
        -> Result<StepOutput, GfError> {
        self.buffer.push(traverser);
        Ok(StepOutput::Emit(Vec::new()))
    }

    fn drain(&mut self, _ctx: &mut StepContext) -> Result<Vec<Traverser>, GfError> {
        let mut buffer = std::mem::take(&mut self.buffer);
        buffer.shuffle(&mut thread_rng());
        Ok(buffer)
    }
}

/// Folds the entire upstream into a single list traverser, honoring bulk.
pub struct FoldStep {
    buffer: Vec<PropertyValue>,
}

impl FoldStep {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }
}

impl Default for FoldStep {
    fn default() -> Self {
        Self::new()
    }
}

impl Step for FoldStep {
    fn name(&self) -> &'static str {
        "fold"
    }

    fn is_barrier(&self) -> bool {
        true
    }

    fn accept(&mut self, traverser: Traverser, _ctx: &mut StepContext)
        -> Result<StepOutput, GfError> {
        for _ in 0..traverser.bulk() {
            self.buffer.push(traverser.get().clone());
        }
        Ok(StepOutput::Emit(Vec::new()))
    }

    fn drain(&mut self, _ctx: &mut StepContext) -> Result<Vec<Traverser>, GfError> {
        Ok(vec![Traverser::new(PropertyValue::List(std::mem::take(&mut self.buffer)))])
    }
}

/// Counts the upstream (bulk-weighted) and emits the total as a single traverser.
pub struct CountStep {
    count: u64,
}

impl CountStep {
    pub fn new() -> Self {
        Self { count: 0 }
    }
}

impl Default for CountStep {
    fn default() -> Self {
        Self::new()
    }
}

impl Step for CountStep {
    fn name(&self) -> &'static str {
        "count"
    }

    fn is_barrier(&self) -> bool {
        true
    }

    fn accept(&mut self, traverser: Traverser, _ctx: &mut StepContext)
        -> Result<StepOutput, GfError> {
        self.count += traverser.bulk();
        Ok(StepOutput::Emit(Vec::new()))
    }

    fn drain(&mut self, _ctx: &mut StepContext) -> Result<Vec<Traverser>, GfError> {
        let count = isize::try_from(self.count)
            .map_err(|_| GfError::Generic("Count overflow".to_owned()))?;
        Ok(vec![Traverser::new(PropertyValue::Isize(count))])
    }
}

/// Barrier side effect: collects every upstream value into the memory list under `key`, then
/// passes the upstream through unchanged. `SideEffectCapStrategy` appends a cap step when this
/// ends the chain.
pub struct AggregateStep {
    key: String,
    buffer: Vec<Traverser>,
}

impl AggregateStep {
    pub fn new(key: &str) -> Self {
        Self { key: key.to_owned(), buffer: Vec::new() }
    }
}

impl Step for AggregateStep {
    fn name(&self) -> &'static str {
        "aggregate"
    }

    fn is_barrier(&self) -> bool {
        true
    }

    fn capped_key(&self) -> Option<String> {
        Some(self.key.clone())
    }

    fn accept(&mut self, traverser: Traverser, ctx: &mut StepContext)
        -> Result<StepOutput, GfError> {
        ctx.memory.push_to_list(&self.key, traverser.get().clone())?;
        self.buffer.push(traverser);
        Ok(StepOutput::Emit(Vec::new()))
    }

    fn drain(&mut self, _ctx: &mut StepContext) -> Result<Vec<Traverser>, GfError> {
        Ok(std::mem::take(&mut self.buffer))
    }
}

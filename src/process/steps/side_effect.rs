use crate::error::GfError;
use crate::process::step::{Step, StepContext, StepOutput};
use crate::process::{Traverser, TraversalMemory};

pub type SideEffectFn = Box<dyn Fn(&Traverser, &mut TraversalMemory) -> Result<(), GfError> + Send>;

/// Passes traversers through unchanged while recording into the traversal memory.
pub struct SideEffectStep {
    function: SideEffectFn,
}

impl SideEffectStep {
    pub fn new(function: SideEffectFn) -> Self {
        Self { function }
    }
}

impl Step for SideEffectStep {
    fn name(&self) -> &'static str {
        "side_effect"
    }

    fn accept(&mut self, traverser: Traverser, ctx: &mut StepContext)
        -> Result<StepOutput, GfError> {
        (self.function)(&traverser, ctx.memory)?;
        Ok(StepOutput::Emit(vec![traverser]))
    }
}

/// Swallows the upstream and, once it is exhausted, emits the memory value under `key` as the
/// single result of the traversal. Appended automatically by `SideEffectCapStrategy`.
pub struct SideEffectCapStep {
    key: String,
}

impl SideEffectCapStep {
    pub fn new(key: &str) -> Self {
        Self { key: key.to_owned() }
    }
}

impl Step for SideEffectCapStep {
    fn name(&self) -> &'static str {
        "cap"
    }

    fn is_barrier(&self) -> bool {
        true
    }

    fn accept(&mut self, _traverser: Traverser, _ctx: &mut StepContext)
        -> Result<StepOutput, GfError> {
        Ok(StepOutput::Emit(Vec::new()))
    }

    fn drain(&mut self, ctx: &mut StepContext) -> Result<Vec<Traverser>, GfError> {
        Ok(match ctx.memory.get(&self.key) {
            Some(value) => vec![Traverser::new(value.clone())],
            None => Vec::new(),
        })
    }
}

use crate::error::GfError;
use crate::graph::GraphStore;
use crate::process::{Traverser, TraversalMemory};

/// Execution context handed to a step for one invocation: the storage collaborator and the
/// traversal's side-effect memory.
pub struct StepContext<'a> {
    pub graph: &'a dyn GraphStore,
    pub memory: &'a mut TraversalMemory,
}

/// What a step did with one input traverser.
pub enum StepOutput {
    /// Zero or more downstream traversers.
    Emit(Vec<Traverser>),
    /// Re-inject the traverser at an earlier position in the chain (loop semantics). `target` is
    /// the resolved program-counter index set during compilation.
    Rewind { target: usize, traverser: Traverser },
}

/// One stage of a traversal pipeline.
///
/// Steps are driven by the traversal: [`accept`](Step::accept) is called once per upstream
/// traverser, in arrival order; [`drain`](Step::drain) is called exactly once after the upstream
/// is exhausted, which is where barrier steps release their buffered output. Source steps instead
/// implement [`pull`](Step::pull) and never receive input.
pub trait Step: Send {
    fn name(&self) -> &'static str;

    /// Barrier steps buffer all input before emitting anything from `drain`.
    fn is_barrier(&self) -> bool {
        false
    }

    /// True if this step establishes a new traverser head that belongs in the path history.
    fn extends_path(&self) -> bool {
        false
    }

    /// True if any traverser flowing through this step needs path history attached.
    fn requires_paths(&self) -> bool {
        false
    }

    /// The memory key a final cap step should surface when this step ends the chain.
    fn capped_key(&self) -> Option<String> {
        None
    }

    /// The label a jump step rewinds to; resolved to an index during compilation.
    fn jump_label(&self) -> Option<&str> {
        None
    }

    fn set_jump_target(&mut self, _target: usize) {}

    /// Source steps produce the next traverser, or `None` once exhausted.
    fn pull(&mut self, _ctx: &mut StepContext) -> Result<Option<Traverser>, GfError> {
        Ok(None)
    }

    fn accept(&mut self, traverser: Traverser, ctx: &mut StepContext)
        -> Result<StepOutput, GfError>;

    fn drain(&mut self, _ctx: &mut StepContext) -> Result<Vec<Traverser>, GfError> {
        Ok(Vec::new())
    }
}

/// A step plus its optional `as`-label within the chain. Labels name jump targets and path
/// entries, and protect no-op steps from strategy removal.
pub struct TraversalStep {
    pub step: Box<dyn Step>,
    pub label: Option<String>,
}

impl TraversalStep {
    pub fn new(step: Box<dyn Step>) -> Self {
        Self { step, label: None }
    }
}

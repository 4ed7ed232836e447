use crate::error::GfError;
use crate::process::step::{Step, StepContext, StepOutput};
use crate::process::Traverser;

pub type LoopFn = Box<dyn Fn(&Traverser) -> Result<bool, GfError> + Send>;

/// Loop-exit condition of a [`JumpStep`], evaluated per traverser after its loop counter is
/// incremented.
pub enum LoopPredicate {
    /// Loop until the traverser has passed through the body exactly this many times.
    Times(u32),
    /// Loop while the predicate holds. The predicate sees the incremented loop counter, so it can
    /// gate on the value, the loop count, or both. A predicate that never turns false is a user
    /// error the engine does not detect.
    While(LoopFn),
}

/// Loop directive: rewinds the program counter to the step after the labeled position until the
/// predicate releases the traverser downstream.
///
/// The loop body (the steps between the label and this step) must not contain barrier steps: a
/// barrier drains exactly once and cannot see re-injected traversers.
pub struct JumpStep {
    jump_label: String,
    target: usize,
    predicate: LoopPredicate,
}

impl JumpStep {
    pub fn new(jump_label: &str, predicate: LoopPredicate) -> Self {
        Self { jump_label: jump_label.to_owned(), target: 0, predicate }
    }
}

impl Step for JumpStep {
    fn name(&self) -> &'static str {
        "jump"
    }

    fn jump_label(&self) -> Option<&str> {
        Some(&self.jump_label)
    }

    fn set_jump_target(&mut self, target: usize) {
        self.target = target;
    }

    fn accept(&mut self, traverser: Traverser, _ctx: &mut StepContext)
        -> Result<StepOutput, GfError> {
        let traverser = traverser.increment_loops();
        let back = match &self.predicate {
            LoopPredicate::Times(times) => traverser.loops() < *times,
            LoopPredicate::While(predicate) => predicate(&traverser)?,
        };
        Ok(if back {
            StepOutput::Rewind { target: self.target, traverser }
        } else {
            StepOutput::Emit(vec![traverser])
        })
    }
}

use crate::error::GfError;
use crate::graph::property_value::PropertyValue;
use crate::graph::GraphStore;
use crate::process::step::{Step, StepContext, StepOutput, TraversalStep};
use crate::process::steps::{
    AggregateStep, CountStep, DedupStep, FilterStep, FlatMapStep, FoldStep, GraphVertexStep,
    HasStep, IdentityStep, InStep, InjectStep, JumpStep, LoopPredicate, MapStep, OrderStep,
    OutStep, PathStep, ShuffleStep, SideEffectCapStep, SideEffectStep, ValuesStep,
};
use crate::process::strategy::{default_strategies, TraversalStrategy};
use crate::process::{Traverser, TraversalMemory};
use itertools::Itertools;
use log::debug;
use std::cmp::Ordering;
use std::collections::VecDeque;
use std::sync::Arc;

/// An ordered step chain plus a strategy registry and a side-effect memory.
///
/// The chain is a flat array executed with per-step input queues and a program counter: the driver
/// always services the deepest non-empty queue, which gives lazy pull semantics and a
/// deterministic sibling order. Jump steps rewind the counter to a labeled index instead of
/// forming back-edges in the chain.
///
/// A traversal is built fluently, rewritten once by its strategies on the first pull, and is
/// thereafter read-only except for side-effect writes. Once drained it stays drained: further
/// pulls return `None`.
pub struct Traversal {
    pub(crate) graph: Arc<dyn GraphStore + Send + Sync>,
    pub(crate) steps: Vec<TraversalStep>,
    pub(crate) strategies: Vec<Box<dyn TraversalStrategy>>,
    memory: TraversalMemory,
    queues: Vec<VecDeque<Traverser>>,
    results: VecDeque<Traverser>,
    peeked: Option<Traverser>,
    source_done: bool,
    drained_until: usize,
    prepared: bool,
    finished: bool,
    path_tracking: bool,
}

impl Traversal {
    pub fn over(graph: Arc<dyn GraphStore + Send + Sync>) -> Self {
        Self {
            graph,
            steps: Vec::new(),
            strategies: default_strategies(),
            memory: TraversalMemory::default(),
            queues: Vec::new(),
            results: VecDeque::new(),
            peeked: None,
            source_done: false,
            drained_until: 1,
            prepared: false,
            finished: false,
            path_tracking: false,
        }
    }

    fn add(mut self, step: Box<dyn Step>) -> Self {
        self.steps.push(TraversalStep::new(step));
        self
    }

    // Source steps.

    pub fn vertices(self) -> Self {
        self.add(Box::new(GraphVertexStep::all()))
    }

    pub fn vertices_by(self, key: &str, value: PropertyValue) -> Self {
        self.add(Box::new(GraphVertexStep::filtered(key, value)))
    }

    pub fn inject(self, values: Vec<PropertyValue>) -> Self {
        self.add(Box::new(InjectStep::new(values)))
    }

    // Map steps.

    pub fn map(
        self,
        function: impl Fn(&PropertyValue) -> Result<PropertyValue, GfError> + Send + 'static,
    ) -> Self {
        self.add(Box::new(MapStep::new(Box::new(function))))
    }

    pub fn flat_map(
        self,
        function: impl Fn(&PropertyValue) -> Result<Vec<PropertyValue>, GfError> + Send + 'static,
    ) -> Self {
        self.add(Box::new(FlatMapStep::new(Box::new(function))))
    }

    pub fn values(self, key: &str) -> Self {
        self.add(Box::new(ValuesStep::new(key)))
    }

    pub fn out(self) -> Self {
        self.add(Box::new(OutStep))
    }

    pub fn in_(self) -> Self {
        self.add(Box::new(InStep))
    }

    pub fn path(self) -> Self {
        self.add(Box::new(PathStep))
    }

    // Filter steps.

    pub fn filter(
        self,
        predicate: impl Fn(&PropertyValue) -> Result<bool, GfError> + Send + 'static,
    ) -> Self {
        self.add(Box::new(FilterStep::new(Box::new(predicate))))
    }

    pub fn has(self, key: &str, value: PropertyValue) -> Self {
        self.add(Box::new(HasStep::new(key, value)))
    }

    pub fn identity(self) -> Self {
        self.add(Box::new(IdentityStep))
    }

    pub fn dedup(self) -> Self {
        self.add(Box::new(DedupStep::new()))
    }

    // Barrier steps.

    pub fn order(self) -> Self {
        self.add(Box::new(OrderStep::natural()))
    }

    pub fn order_by(
        self,
        comparator: impl Fn(&PropertyValue, &PropertyValue) -> Ordering + Send + 'static,
    ) -> Self {
        self.add(Box::new(OrderStep::by(Box::new(comparator))))
    }

    pub fn shuffle(self) -> Self {
        self.add(Box::new(ShuffleStep::new()))
    }

    pub fn fold(self) -> Self {
        self.add(Box::new(FoldStep::new()))
    }

    pub fn count(self) -> Self {
        self.add(Box::new(CountStep::new()))
    }

    // Side effects and loops.

    pub fn aggregate(self, key: &str) -> Self {
        self.add(Box::new(AggregateStep::new(key)))
    }

    pub fn side_effect(
        self,
        function: impl Fn(&Traverser, &mut TraversalMemory) -> Result<(), GfError> + Send + 'static,
    ) -> Self {
        self.add(Box::new(SideEffectStep::new(Box::new(function))))
    }

    pub fn cap(self, key: &str) -> Self {
        self.add(Box::new(SideEffectCapStep::new(key)))
    }

    /// Labels the most recently added step, naming it as a jump target and in path histories.
    pub fn as_label(mut self, label: &str) -> Self {
        if let Some(entry) = self.steps.last_mut() {
            entry.label = Some(label.to_owned());
        }
        self
    }

    /// Loop directive: traversers rewind to just after the step labeled `label` until the
    /// predicate releases them. The loop body must not contain barrier steps.
    pub fn jump(self, label: &str, predicate: LoopPredicate) -> Self {
        self.add(Box::new(JumpStep::new(label, predicate)))
    }

    pub fn register_strategy(mut self, strategy: Box<dyn TraversalStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    // Execution.

    /// Applies each registered strategy exactly once and resolves jump labels to step indices.
    /// Called implicitly by the first pull.
    pub fn compile(&mut self) -> Result<(), GfError> {
        if self.prepared {
            return Ok(());
        }
        if self.steps.is_empty() {
            return Err(GfError::Traversal("Cannot execute an empty traversal".to_owned()));
        }
        for strategy in &self.strategies {
            strategy.apply(&mut self.steps)?;
        }
        for index in 0..self.steps.len() {
            let label = match self.steps[index].step.jump_label() {
                Some(label) => label.to_owned(),
                None => continue,
            };
            let position = self
                .steps
                .iter()
                .position(|entry| entry.label.as_deref() == Some(label.as_str()))
                .ok_or_else(|| {
                    GfError::Traversal(format!("No step labeled '{}' to jump to", label))
                })?;
            if position >= index {
                return Err(GfError::Traversal(format!(
                    "Jump label '{}' must precede the jump step",
                    label
                )));
            }
            self.steps[index].step.set_jump_target(position + 1);
        }
        self.path_tracking = self.steps.iter().any(|entry| entry.step.requires_paths());
        self.queues = (0..self.steps.len()).map(|_| VecDeque::new()).collect();
        debug!("Compiled traversal: {}", self.step_names().iter().join(" -> "));
        self.prepared = true;
        Ok(())
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|entry| entry.step.name()).collect()
    }

    pub fn memory(&self) -> &TraversalMemory {
        &self.memory
    }

    pub fn has_next(&mut self) -> Result<bool, GfError> {
        if self.peeked.is_none() {
            self.peeked = self.next()?;
        }
        Ok(self.peeked.is_some())
    }

    /// Pulls the next traverser through the chain, or `None` once the traversal is drained.
    /// Re-pulling a drained traversal keeps returning `None`.
    pub fn next(&mut self) -> Result<Option<Traverser>, GfError> {
        if let Some(traverser) = self.peeked.take() {
            return Ok(Some(traverser));
        }
        if self.finished {
            return Ok(None);
        }
        self.compile()?;
        loop {
            if let Some(traverser) = self.results.pop_front() {
                return Ok(Some(traverser));
            }
            let pending = (1..self.steps.len()).rev().find(|&i| !self.queues[i].is_empty());
            if let Some(index) = pending {
                let traverser = self.queues[index].pop_front().expect("Unreachable");
                let graph = Arc::clone(&self.graph);
                let output = self.steps[index]
                    .step
                    .accept(traverser, &mut StepContext { graph: &*graph, memory: &mut self.memory })?;
                match output {
                    StepOutput::Emit(out) => self.route(index, out),
                    StepOutput::Rewind { target, traverser } => {
                        self.queues[target].push_back(traverser);
                    }
                }
            } else if !self.source_done {
                let graph = Arc::clone(&self.graph);
                let pulled = self.steps[0]
                    .step
                    .pull(&mut StepContext { graph: &*graph, memory: &mut self.memory })?;
                match pulled {
                    Some(traverser) => self.route(0, vec![traverser]),
                    None => self.source_done = true,
                }
            } else if self.drained_until < self.steps.len() {
                let index = self.drained_until;
                self.drained_until += 1;
                let graph = Arc::clone(&self.graph);
                let out = self.steps[index]
                    .step
                    .drain(&mut StepContext { graph: &*graph, memory: &mut self.memory })?;
                self.route(index, out);
            } else {
                self.finished = true;
                return Ok(None);
            }
        }
    }

    pub fn next_value(&mut self) -> Result<Option<PropertyValue>, GfError> {
        Ok(self.next()?.map(Traverser::into_value))
    }

    pub fn to_list(&mut self) -> Result<Vec<PropertyValue>, GfError> {
        let mut values = Vec::new();
        while let Some(traverser) = self.next()? {
            values.push(traverser.into_value());
        }
        Ok(values)
    }

    fn route(&mut self, from: usize, mut traversers: Vec<Traverser>) {
        if self.path_tracking && self.steps[from].step.extends_path() {
            let label = self.steps[from].label.clone();
            for traverser in &mut traversers {
                traverser.record_path(label.clone());
            }
        }
        let dest = from + 1;
        if dest >= self.steps.len() {
            self.results.extend(traversers);
        } else {
            self.queues[dest].extend(traversers);
        }
    }
}

//! The bulk-synchronous graph computer: vertex programs executed superstep by superstep over an
//! isolated compute view, with message passing, global side effects and a post-computation
//! MapReduce stage.

use crate::compute::map_reduce::{execute_map_reduce, MapReduce};
use crate::compute::messenger::Inboxes;
use crate::compute::program::{validate_program_features, ComputerFeatures, MessageCombiner};
use crate::error::GfError;
use crate::graph::property_value::PropertyValue;
use crate::graph::{GraphStore, VertexId};
use crate::process::traversal::Traversal;
use crate::util::timer::{GfDuration, GfTimer};
use crossbeam_channel::{bounded, Receiver};
use hashbrown::HashMap;
use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

pub mod map_reduce;
pub mod messenger;
pub mod pagerank;
pub mod program;
pub mod side_effects;
pub mod traversal_program;
pub mod view;

#[cfg(test)]
mod tests;

pub use map_reduce::{KeyValueEmitter, Stage};
pub use messenger::Messenger;
pub use program::{KeyType, ProgramConfig, ProgramRegistry, VertexProgram};
pub use side_effects::SideEffects;
pub use view::{ComputeVertex, ComputeView, Isolation};

/// Orchestrates one computation: validates the program's feature requirements, fans the active
/// vertex set out over worker threads each superstep, and runs the barrier sequence (commit
/// writes, deliver messages, check termination) between supersteps.
pub struct GraphComputer {
    graph: Arc<dyn GraphStore + Send + Sync>,
    isolation: Isolation,
    threads: usize,
    features: ComputerFeatures,
}

impl GraphComputer {
    pub fn new(graph: Arc<dyn GraphStore + Send + Sync>) -> Self {
        Self { graph, isolation: Isolation::Bsp, threads: 2, features: ComputerFeatures::default() }
    }

    pub fn isolation(mut self, isolation: Isolation) -> Self {
        self.isolation = isolation;
        self
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn features(mut self, features: ComputerFeatures) -> Self {
        self.features = features;
        self
    }

    /// Starts the computation on a background thread and returns immediately. Program/computer
    /// feature mismatches fail here, before any superstep runs.
    pub fn submit(
        self,
        program: Box<dyn VertexProgram>,
        map_reducers: Vec<Box<dyn MapReduce>>,
    ) -> Result<ComputerFuture, GfError> {
        validate_program_features(&self.features, &program.features())?;
        info!("Submitting vertex program '{}'", program.name());
        let cancelled = Arc::new(AtomicBool::new(false));
        let cancel_flag = Arc::clone(&cancelled);
        let (sender, receiver) = bounded(1);
        let handle = std::thread::spawn(move || {
            let result = run_computation(
                self.graph,
                self.isolation,
                self.threads,
                program,
                map_reducers,
                &cancel_flag,
            );
            let _ = sender.send(result);
        });
        Ok(ComputerFuture { receiver, cancelled, handle: Some(handle) })
    }
}

/// Handle to a running computation. Dropping it detaches the computation; it does not cancel.
pub struct ComputerFuture {
    receiver: Receiver<Result<ComputerResult, GfError>>,
    cancelled: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ComputerFuture {
    /// Requests cancellation. The computation observes the flag at the next superstep boundary
    /// and resolves to [`GfError::Cancelled`]; the superstep in flight still completes.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Blocks until the computation resolves.
    pub fn wait(mut self) -> Result<ComputerResult, GfError> {
        let result = self
            .receiver
            .recv()
            .map_err(|_| crate::error::computation_error("The computation thread disconnected"))?;
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        result
    }
}

impl std::fmt::Debug for ComputerFuture {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("ComputerFuture")
            .field("cancelled", &self.cancelled.load(Ordering::SeqCst))
            .finish()
    }
}

impl std::fmt::Debug for ComputerResult {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("ComputerResult")
            .field("supersteps", &self.supersteps)
            .field("runtime", &self.runtime)
            .field("side_effect_keys", &self.side_effects.keys())
            .finish()
    }
}

/// The outcome of a finished computation: the untouched base graph, the final compute view, the
/// final side effects, and run statistics.
pub struct ComputerResult {
    graph: Arc<dyn GraphStore + Send + Sync>,
    view: ComputeView,
    side_effects: SideEffects,
    supersteps: u64,
    runtime: GfDuration,
}

impl ComputerResult {
    pub fn graph(&self) -> &Arc<dyn GraphStore + Send + Sync> {
        &self.graph
    }

    /// A computed property from the final view.
    pub fn compute_property(
        &self,
        vertex: VertexId,
        key: &str,
    ) -> Result<Option<PropertyValue>, GfError> {
        self.view.get(vertex, key)
    }

    pub fn side_effects(&self) -> &SideEffects {
        &self.side_effects
    }

    pub fn supersteps(&self) -> u64 {
        self.supersteps
    }

    pub fn runtime(&self) -> GfDuration {
        self.runtime
    }

    /// Feeds a list-valued side effect into a new traversal, bridging back from the computer to
    /// the iterator pipeline.
    pub fn side_effect_traversal(&self, key: &str) -> Result<Traversal, GfError> {
        let value = self.side_effects.get(key).ok_or_else(|| {
            crate::error::computation_error(format!("No side effect under '{}'", key))
        })?;
        let values = value.as_list()?.to_vec();
        Ok(Traversal::over(Arc::clone(&self.graph)).inject(values))
    }
}

fn run_computation(
    graph: Arc<dyn GraphStore + Send + Sync>,
    isolation: Isolation,
    threads: usize,
    program: Box<dyn VertexProgram>,
    extra_map_reducers: Vec<Box<dyn MapReduce>>,
    cancelled: &AtomicBool,
) -> Result<ComputerResult, GfError> {
    let timer = GfTimer::now();
    let view = ComputeView::new(isolation, program.element_compute_keys());
    let side_effects = SideEffects::default();
    program.setup(&side_effects);
    let combiner = program.message_combiner();
    let all_vertices: Vec<VertexId> = graph.vertex_ids().collect();
    let requires_all_vertices = program.features().requires_all_vertices;

    let mut inboxes = Inboxes::new();
    let mut superstep: u64 = 0;
    loop {
        if cancelled.load(Ordering::SeqCst) {
            return Err(GfError::Cancelled(superstep));
        }
        side_effects.set_iteration(superstep);
        // Message-driven activation: past superstep 0, only message recipients execute, unless
        // the program asked for every vertex every superstep.
        let active: Vec<VertexId> = if superstep == 0 || requires_all_vertices {
            all_vertices.clone()
        } else {
            let mut recipients: Vec<VertexId> = inboxes.keys().copied().collect();
            recipients.sort_unstable();
            recipients
        };
        if active.is_empty() {
            break;
        }
        let superstep_timer = GfTimer::now();
        let outgoing =
            execute_superstep(&*program, &*graph, &view, &side_effects, &inboxes, &active, threads)
                .map_err(|e| GfError::Superstep(superstep, e.to_string()))?;
        // Barrier: writes and messages commit together, then the program votes on termination.
        view.advance_superstep();
        inboxes = commit_messages(outgoing, combiner.as_deref())
            .map_err(|e| GfError::Superstep(superstep, e.to_string()))?;
        debug!(
            "Superstep {} finished in {} ({} active vertices, {} inboxes)",
            superstep,
            superstep_timer.elapsed().to_millis_string(),
            active.len(),
            inboxes.len()
        );
        superstep += 1;
        if program.terminate(&side_effects) {
            break;
        }
    }

    let mut jobs = program.map_reducers();
    jobs.extend(extra_map_reducers);
    for job in &jobs {
        execute_map_reduce(&**job, &*graph, &view, &side_effects, threads)?;
    }

    let runtime = timer.elapsed();
    info!(
        "Vertex program '{}' finished after {} supersteps in {}",
        program.name(),
        superstep,
        runtime.to_millis_string()
    );
    Ok(ComputerResult { graph, view, side_effects, supersteps: superstep, runtime })
}

/// Runs one superstep: the active set is chunked over scoped worker threads, each executing the
/// program on its chunk and returning its outbox. Any per-vertex failure aborts the superstep.
fn execute_superstep(
    program: &dyn VertexProgram,
    graph: &(dyn GraphStore + Send + Sync),
    view: &ComputeView,
    side_effects: &SideEffects,
    inboxes: &Inboxes,
    active: &[VertexId],
    threads: usize,
) -> Result<Vec<(VertexId, PropertyValue)>, GfError> {
    let chunk_size = (active.len() + threads - 1) / threads;
    let worker_outboxes = crossbeam_utils::thread::scope(|scope| {
        let mut handles = Vec::new();
        for chunk in active.chunks(chunk_size.max(1)) {
            handles.push(scope.spawn(move |_| {
                let mut messenger = Messenger::new(inboxes);
                for &vertex_id in chunk {
                    messenger.focus(vertex_id);
                    let vertex = ComputeVertex::new(vertex_id, graph, view);
                    program.execute(&vertex, &mut messenger, side_effects)?;
                }
                Ok(messenger.into_outbox())
            }));
        }
        handles
            .into_iter()
            .map(|handle| {
                handle.join().unwrap_or_else(|_| {
                    Err(crate::error::computation_error("A worker thread panicked"))
                })
            })
            .collect::<Vec<_>>()
    })
    .map_err(|_| crate::error::computation_error("Worker scope failed"))?;

    let mut outgoing = Vec::new();
    for outbox in worker_outboxes {
        outgoing.extend(outbox?);
    }
    Ok(outgoing)
}

/// Builds the next superstep's inboxes. With a combiner each inbox collapses to one message;
/// the combine order is unspecified, which is why combiners must be associative and commutative.
fn commit_messages(
    outgoing: Vec<(VertexId, PropertyValue)>,
    combiner: Option<&dyn MessageCombiner>,
) -> Result<Inboxes, GfError> {
    match combiner {
        Some(combiner) => {
            let mut combined: HashMap<VertexId, PropertyValue> = HashMap::new();
            for (to, message) in outgoing {
                let merged = match combined.remove(&to) {
                    Some(existing) => combiner.combine(existing, message)?,
                    None => message,
                };
                combined.insert(to, merged);
            }
            Ok(combined.into_iter().map(|(to, message)| (to, vec![message])).collect())
        }
        None => {
            let mut inboxes = Inboxes::new();
            for (to, message) in outgoing {
                inboxes.entry(to).or_default().push(message);
            }
            Ok(inboxes)
        }
    }
}

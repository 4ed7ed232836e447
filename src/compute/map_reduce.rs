use crate::compute::side_effects::SideEffects;
use crate::compute::view::{ComputeVertex, ComputeView};
use crate::error::GfError;
use crate::graph::property_value::PropertyValue;
use crate::graph::GraphStore;
use hashbrown::HashMap;
use itertools::Itertools;
use log::debug;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Stage {
    Map,
    Combine,
    Reduce,
}

/// Collects the key/value pairs emitted by one stage invocation.
#[derive(Default)]
pub struct KeyValueEmitter {
    pairs: Vec<(PropertyValue, PropertyValue)>,
}

impl KeyValueEmitter {
    pub fn emit(&mut self, key: PropertyValue, value: PropertyValue) {
        self.pairs.push((key, value));
    }

    fn into_pairs(self) -> Vec<(PropertyValue, PropertyValue)> {
        self.pairs
    }
}

/// A post-computation extraction job over the final compute view. `map` runs per vertex (in
/// parallel), `combine` pre-aggregates each worker's output, `reduce` aggregates globally per
/// key, and the resulting pairs land in the side effects under [`side_effect_key`].
///
/// A job opts in to each stage via [`do_stage`]; a map-only job publishes its raw pairs.
///
/// [`side_effect_key`]: MapReduce::side_effect_key
/// [`do_stage`]: MapReduce::do_stage
pub trait MapReduce: Send + Sync {
    fn name(&self) -> &'static str;

    /// The side-effect key the final result is stored under.
    fn side_effect_key(&self) -> String;

    fn do_stage(&self, stage: Stage) -> bool;

    fn map(&self, vertex: &ComputeVertex, emitter: &mut KeyValueEmitter) -> Result<(), GfError>;

    fn combine(
        &self,
        key: &PropertyValue,
        values: Vec<PropertyValue>,
        emitter: &mut KeyValueEmitter,
    ) -> Result<(), GfError> {
        self.reduce(key, values, emitter)
    }

    fn reduce(
        &self,
        key: &PropertyValue,
        values: Vec<PropertyValue>,
        emitter: &mut KeyValueEmitter,
    ) -> Result<(), GfError> {
        for value in values {
            emitter.emit(key.clone(), value);
        }
        Ok(())
    }

    /// Folds the final pairs into the single side-effect value. Defaults to a list of pairs.
    fn generate_side_effect(&self, pairs: Vec<(PropertyValue, PropertyValue)>) -> PropertyValue {
        PropertyValue::List(
            pairs.into_iter().map(|(key, value)| PropertyValue::pair(key, value)).collect(),
        )
    }
}

/// Groups pairs by key, in key order, and runs one aggregation stage over each group.
fn aggregate_stage<F>(
    pairs: Vec<(PropertyValue, PropertyValue)>,
    mut stage: F,
) -> Result<Vec<(PropertyValue, PropertyValue)>, GfError>
where
    F: FnMut(&PropertyValue, Vec<PropertyValue>, &mut KeyValueEmitter) -> Result<(), GfError>,
{
    let mut groups: HashMap<PropertyValue, Vec<PropertyValue>> = HashMap::new();
    for (key, value) in pairs {
        groups.entry(key).or_default().push(value);
    }
    let mut emitter = KeyValueEmitter::default();
    for (key, values) in groups.into_iter().sorted_by(|(a, _), (b, _)| a.cmp(b)) {
        stage(&key, values, &mut emitter)?;
    }
    Ok(emitter.into_pairs())
}

pub(crate) fn execute_map_reduce(
    job: &dyn MapReduce,
    graph: &(dyn GraphStore + Send + Sync),
    view: &ComputeView,
    side_effects: &SideEffects,
    threads: usize,
) -> Result<(), GfError> {
    let vertex_ids: Vec<_> = graph.vertex_ids().collect();
    let chunk_size = (vertex_ids.len() + threads - 1) / threads;
    let worker_outputs = crossbeam_utils::thread::scope(|scope| {
        let mut handles = Vec::new();
        for chunk in vertex_ids.chunks(chunk_size.max(1)) {
            handles.push(scope.spawn(move |_| {
                let mut emitter = KeyValueEmitter::default();
                for &vertex_id in chunk {
                    let vertex = ComputeVertex::new(vertex_id, graph, view);
                    job.map(&vertex, &mut emitter)?;
                }
                let mapped = emitter.into_pairs();
                if job.do_stage(Stage::Combine) {
                    aggregate_stage(mapped, |key, values, emitter| {
                        job.combine(key, values, emitter)
                    })
                } else {
                    Ok(mapped)
                }
            }));
        }
        handles
            .into_iter()
            .map(|handle| {
                handle.join().unwrap_or_else(|_| {
                    Err(crate::error::computation_error("A MapReduce worker panicked"))
                })
            })
            .collect::<Vec<_>>()
    })
    .map_err(|_| crate::error::computation_error("MapReduce worker scope failed"))?;

    let mut pairs = Vec::new();
    for output in worker_outputs {
        pairs.extend(output?);
    }
    if job.do_stage(Stage::Reduce) {
        pairs = aggregate_stage(pairs, |key, values, emitter| job.reduce(key, values, emitter))?;
    }
    debug!("MapReduce job '{}' produced {} pairs", job.name(), pairs.len());
    side_effects.set(&job.side_effect_key(), job.generate_side_effect(pairs));
    Ok(())
}

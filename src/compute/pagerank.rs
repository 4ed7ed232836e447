use crate::compute::map_reduce::{KeyValueEmitter, MapReduce, Stage};
use crate::compute::program::{
    KeyType, MessageCombiner, ProgramConfig, ProgramFeatures, VertexProgram,
};
use crate::compute::side_effects::SideEffects;
use crate::compute::view::ComputeVertex;
use crate::compute::Messenger;
use crate::error::GfError;
use crate::graph::property_value::PropertyValue;
use hashbrown::{HashMap, HashSet};

/// Computed rank of a vertex, rewritten every superstep.
pub const PAGE_RANK: &str = "pageRank";
/// Out-degree, cached once at superstep 0.
pub const OUT_DEGREE: &str = "outDegree";

const DELTA: &str = "pageRank.delta";
const DANGLING: &str = "pageRank.dangling";
const DANGLING_PREVIOUS: &str = "pageRank.danglingPrevious";

const ALPHA_KEY: &str = "graphflow.pageRank.alpha";
const EPSILON_KEY: &str = "graphflow.pageRank.epsilon";
const MAX_ITERATIONS_KEY: &str = "graphflow.pageRank.maxIterations";

/// PageRank over out-edges with damping factor `alpha`. Each superstep every vertex recomputes
///
/// ```text
/// rank = (1 - alpha) / n + alpha * (incoming + dangling / n)
/// ```
///
/// where `incoming` sums last superstep's rank shares sent along in-edges and `dangling` is the
/// rank mass held by zero-out-degree vertices last superstep, redistributed uniformly so the
/// total rank mass stays 1. Terminates when the summed absolute rank change drops below
/// `epsilon`, or after `max_iterations` supersteps.
#[derive(Clone, Debug)]
pub struct PageRankProgram {
    alpha: f64,
    epsilon: f64,
    max_iterations: u64,
}

impl Default for PageRankProgram {
    fn default() -> Self {
        Self { alpha: 0.85, epsilon: 1e-6, max_iterations: 100 }
    }
}

impl PageRankProgram {
    pub fn new(alpha: f64, epsilon: f64, max_iterations: u64) -> Result<Self, GfError> {
        if !(0.0..1.0).contains(&alpha) {
            return Err(GfError::Config(format!(
                "The damping factor must lie in [0, 1), got {}",
                alpha
            )));
        }
        if epsilon <= 0.0 {
            return Err(GfError::Config(format!("Epsilon must be positive, got {}", epsilon)));
        }
        if max_iterations == 0 {
            return Err(GfError::Config("At least one iteration is required".to_owned()));
        }
        Ok(Self { alpha, epsilon, max_iterations })
    }
}

impl VertexProgram for PageRankProgram {
    fn name(&self) -> &'static str {
        "pageRank"
    }

    fn setup(&self, side_effects: &SideEffects) {
        side_effects.set(DELTA, PropertyValue::Double(0.0));
        side_effects.set(DANGLING, PropertyValue::Double(0.0));
        side_effects.set(DANGLING_PREVIOUS, PropertyValue::Double(0.0));
    }

    fn execute(
        &self,
        vertex: &ComputeVertex,
        messenger: &mut Messenger,
        side_effects: &SideEffects,
    ) -> Result<(), GfError> {
        let vertex_count = vertex.vertex_count() as f64;
        let superstep = side_effects.iteration();
        let (rank, out_degree) = if superstep == 0 {
            let out_degree = vertex.out_degree() as isize;
            vertex.set(OUT_DEGREE, PropertyValue::Isize(out_degree))?;
            (1.0 / vertex_count, out_degree)
        } else {
            let mut incoming = 0.0;
            for message in messenger.receive() {
                incoming += message.as_double()?;
            }
            let dangling = match side_effects.get(DANGLING_PREVIOUS) {
                Some(value) => value.as_double()?,
                None => 0.0,
            };
            let rank = (1.0 - self.alpha) / vertex_count
                + self.alpha * (incoming + dangling / vertex_count);
            let out_degree = vertex
                .property(OUT_DEGREE)?
                .ok_or_else(|| {
                    crate::error::computation_error("The out-degree constant was never cached")
                })?
                .as_isize()?;
            (rank, out_degree)
        };
        let previous = match vertex.property(PAGE_RANK)? {
            Some(value) => value.as_double()?,
            None => 0.0,
        };
        side_effects.add_double(DELTA, (rank - previous).abs())?;
        vertex.set(PAGE_RANK, PropertyValue::Double(rank))?;
        if out_degree == 0 {
            side_effects.add_double(DANGLING, rank)?;
        } else {
            vertex.broadcast_out(messenger, PropertyValue::Double(rank / out_degree as f64));
        }
        Ok(())
    }

    fn terminate(&self, side_effects: &SideEffects) -> bool {
        let delta = match side_effects.get(DELTA) {
            Some(PropertyValue::Double(delta)) => delta,
            _ => 0.0,
        };
        let dangling = match side_effects.get(DANGLING) {
            Some(PropertyValue::Double(dangling)) => dangling,
            _ => 0.0,
        };
        // Reset the accumulators and rotate the dangling mass for the next superstep.
        side_effects.set(DELTA, PropertyValue::Double(0.0));
        side_effects.set(DANGLING, PropertyValue::Double(0.0));
        side_effects.set(DANGLING_PREVIOUS, PropertyValue::Double(dangling));
        delta < self.epsilon || side_effects.iteration() + 1 >= self.max_iterations
    }

    fn element_compute_keys(&self) -> HashMap<String, KeyType> {
        let mut keys = HashMap::new();
        keys.insert(PAGE_RANK.to_owned(), KeyType::Variable);
        keys.insert(OUT_DEGREE.to_owned(), KeyType::Constant);
        keys
    }

    fn side_effect_compute_keys(&self) -> HashSet<String> {
        [DELTA, DANGLING, DANGLING_PREVIOUS].iter().map(|key| (*key).to_owned()).collect()
    }

    fn message_combiner(&self) -> Option<Box<dyn MessageCombiner>> {
        Some(Box::new(RankSumCombiner))
    }

    fn map_reducers(&self) -> Vec<Box<dyn MapReduce>> {
        vec![Box::new(PageRankMapReduce::default())]
    }

    fn features(&self) -> ProgramFeatures {
        ProgramFeatures {
            requires_local_messages: true,
            requires_vertex_property_addition: true,
            // Vertices with no in-edges receive no messages but must still recompute and
            // redistribute their rank, so message-driven activation cannot be used.
            requires_all_vertices: true,
            ..ProgramFeatures::default()
        }
    }

    fn store_state(&self, config: &mut ProgramConfig) {
        config.set(
            crate::compute::program::PROGRAM_KEY,
            PropertyValue::String(self.name().to_owned()),
        );
        config.set(ALPHA_KEY, PropertyValue::Double(self.alpha));
        config.set(EPSILON_KEY, PropertyValue::Double(self.epsilon));
        config.set(MAX_ITERATIONS_KEY, PropertyValue::Isize(self.max_iterations as isize));
    }

    fn load_state(&mut self, config: &ProgramConfig) -> Result<(), GfError> {
        self.alpha = config.get_double_or(ALPHA_KEY, self.alpha)?;
        self.epsilon = config.get_double_or(EPSILON_KEY, self.epsilon)?;
        self.max_iterations =
            config.get_isize_or(MAX_ITERATIONS_KEY, self.max_iterations as isize)? as u64;
        Ok(())
    }
}

/// Incoming rank shares are only ever summed, so each inbox collapses to one running total.
/// Rank messages are always doubles; anything else aborts the superstep.
pub struct RankSumCombiner;

impl MessageCombiner for RankSumCombiner {
    fn combine(
        &self,
        left: PropertyValue,
        right: PropertyValue,
    ) -> Result<PropertyValue, GfError> {
        Ok(PropertyValue::Double(left.as_double()? + right.as_double()?))
    }
}

/// Map-only extraction of the final ranks as `(vertex, rank)` pairs.
#[derive(Clone, Debug)]
pub struct PageRankMapReduce {
    side_effect_key: String,
}

impl Default for PageRankMapReduce {
    fn default() -> Self {
        Self { side_effect_key: PAGE_RANK.to_owned() }
    }
}

impl PageRankMapReduce {
    pub fn with_key(side_effect_key: &str) -> Self {
        Self { side_effect_key: side_effect_key.to_owned() }
    }
}

impl MapReduce for PageRankMapReduce {
    fn name(&self) -> &'static str {
        "pageRankMapReduce"
    }

    fn side_effect_key(&self) -> String {
        self.side_effect_key.clone()
    }

    fn do_stage(&self, stage: Stage) -> bool {
        stage == Stage::Map
    }

    fn map(&self, vertex: &ComputeVertex, emitter: &mut KeyValueEmitter) -> Result<(), GfError> {
        if let Some(rank) = vertex.property(PAGE_RANK)? {
            emitter.emit(PropertyValue::Vertex(vertex.id()), rank);
        }
        Ok(())
    }
}

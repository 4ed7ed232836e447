use crate::compute::map_reduce::MapReduce;
use crate::compute::side_effects::SideEffects;
use crate::compute::view::ComputeVertex;
use crate::compute::Messenger;
use crate::error::GfError;
use crate::graph::property_value::PropertyValue;
use hashbrown::{HashMap, HashSet};

/// Config key every program stores its own name under, so a registry can rebuild it.
pub const PROGRAM_KEY: &str = "graphflow.vertexProgram";

/// Write discipline of a declared element compute key.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum KeyType {
    /// Rewritable every superstep; reads are superstep-isolated under BSP.
    Variable,
    /// Writable at most once per vertex for the whole computation; a second write is a schema
    /// violation. Reads always observe the written value, in every superstep.
    Constant,
}

/// What a program needs from its computer. Checked against [`ComputerFeatures`] before the first
/// superstep, so an unsupported program fails at submit instead of failing mid-run.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ProgramFeatures {
    /// Sends messages to arbitrary vertex ids.
    pub requires_global_messages: bool,
    /// Sends messages along incident edges only.
    pub requires_local_messages: bool,
    /// Writes computed vertex properties.
    pub requires_vertex_property_addition: bool,
    /// Must execute on every vertex every superstep, not only on message recipients.
    pub requires_all_vertices: bool,
}

/// What a computer offers. Each field answers one [`ProgramFeatures`] requirement.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ComputerFeatures {
    pub supports_global_messages: bool,
    pub supports_local_messages: bool,
    pub supports_vertex_property_addition: bool,
    pub supports_all_vertices: bool,
}

impl Default for ComputerFeatures {
    fn default() -> Self {
        Self {
            supports_global_messages: true,
            supports_local_messages: true,
            supports_vertex_property_addition: true,
            supports_all_vertices: true,
        }
    }
}

pub fn validate_program_features(
    computer: &ComputerFeatures,
    program: &ProgramFeatures,
) -> Result<(), GfError> {
    if program.requires_global_messages && !computer.supports_global_messages {
        return Err(GfError::FeatureMismatch("global messages"));
    }
    if program.requires_local_messages && !computer.supports_local_messages {
        return Err(GfError::FeatureMismatch("local messages"));
    }
    if program.requires_vertex_property_addition && !computer.supports_vertex_property_addition {
        return Err(GfError::FeatureMismatch("vertex property addition"));
    }
    if program.requires_all_vertices && !computer.supports_all_vertices {
        return Err(GfError::FeatureMismatch("all-vertex scheduling"));
    }
    Ok(())
}

/// Associative, commutative merge of two messages addressed to the same vertex. Lets the
/// computer collapse each inbox to a single message at the barrier. A message of an unexpected
/// type is an error that aborts the superstep, never a value to drop.
pub trait MessageCombiner: Send + Sync {
    fn combine(&self, left: PropertyValue, right: PropertyValue)
        -> Result<PropertyValue, GfError>;
}

/// A vertex-centric program executed superstep by superstep under the BSP contract: within a
/// superstep a vertex sees last superstep's computed properties and messages, and its own writes
/// and sends become visible only at the barrier.
///
/// Programs are stateless between vertices; all cross-vertex coordination goes through messages
/// or [`SideEffects`]. The configuration round trip (`store_state`/`load_state` plus a
/// [`ProgramRegistry`]) is what moves a program to remote workers.
pub trait VertexProgram: Send + Sync {
    fn name(&self) -> &'static str;

    /// Runs once before superstep 0, on the orchestrator only.
    fn setup(&self, side_effects: &SideEffects);

    fn execute(
        &self,
        vertex: &ComputeVertex,
        messenger: &mut Messenger,
        side_effects: &SideEffects,
    ) -> Result<(), GfError>;

    /// Runs once per superstep after the barrier; `true` ends the computation.
    fn terminate(&self, side_effects: &SideEffects) -> bool;

    /// The computed vertex property keys this program reads and writes. Touching an undeclared
    /// key fails the superstep.
    fn element_compute_keys(&self) -> HashMap<String, KeyType>;

    fn side_effect_compute_keys(&self) -> HashSet<String> {
        HashSet::new()
    }

    fn message_combiner(&self) -> Option<Box<dyn MessageCombiner>> {
        None
    }

    /// MapReduce jobs to run over the final view once the supersteps end.
    fn map_reducers(&self) -> Vec<Box<dyn MapReduce>> {
        Vec::new()
    }

    fn features(&self) -> ProgramFeatures {
        ProgramFeatures::default()
    }

    fn store_state(&self, config: &mut ProgramConfig) {
        config.set(PROGRAM_KEY, PropertyValue::String(self.name().to_owned()));
    }

    fn load_state(&mut self, _config: &ProgramConfig) -> Result<(), GfError> {
        Ok(())
    }
}

impl std::fmt::Debug for dyn VertexProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "VertexProgram({})", self.name())
    }
}

/// A flat, serializable snapshot of a program's parameters. This is the unit of transfer to a
/// worker process: flat keys, no nesting, byte-serializable as a whole.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ProgramConfig {
    values: HashMap<String, PropertyValue>,
}

impl ProgramConfig {
    pub fn set(&mut self, key: &str, value: PropertyValue) {
        self.values.insert(key.to_owned(), value);
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.values.get(key)
    }

    pub fn get_string(&self, key: &str) -> Result<String, GfError> {
        match self.values.get(key) {
            Some(value) => Ok(value.as_str()?.to_owned()),
            None => Err(GfError::Config(format!("Missing config key '{}'", key))),
        }
    }

    pub fn get_double_or(&self, key: &str, default: f64) -> Result<f64, GfError> {
        match self.values.get(key) {
            Some(value) => value.as_double(),
            None => Ok(default),
        }
    }

    pub fn get_isize_or(&self, key: &str, default: isize) -> Result<isize, GfError> {
        match self.values.get(key) {
            Some(value) => value.as_isize(),
            None => Ok(default),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, GfError> {
        bincode::serialize(self)
            .map_err(|e| GfError::Serialize("ProgramConfig".to_owned(), e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, GfError> {
        bincode::deserialize(bytes)
            .map_err(|e| GfError::Deserialize("ProgramConfig".to_owned(), e.to_string()))
    }
}

type ProgramFactory = fn() -> Box<dyn VertexProgram>;

/// Name-to-factory table resolved at process start. Rebuilding a program from a received
/// [`ProgramConfig`] is a lookup here followed by `load_state`; nothing is resolved by runtime
/// type inspection.
pub struct ProgramRegistry {
    factories: HashMap<String, ProgramFactory>,
}

impl ProgramRegistry {
    pub fn empty() -> Self {
        Self { factories: HashMap::new() }
    }

    pub fn register(&mut self, name: &str, factory: ProgramFactory) {
        self.factories.insert(name.to_owned(), factory);
    }

    pub fn create(&self, config: &ProgramConfig) -> Result<Box<dyn VertexProgram>, GfError> {
        let name = config.get_string(PROGRAM_KEY)?;
        let factory = self
            .factories
            .get(&name)
            .ok_or_else(|| GfError::UnknownProgram(name))?;
        let mut program = factory();
        program.load_state(config)?;
        Ok(program)
    }
}

impl Default for ProgramRegistry {
    /// The built-in programs.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("pageRank", || {
            Box::new(crate::compute::pagerank::PageRankProgram::default())
        });
        registry.register("traversal", || {
            Box::new(crate::compute::traversal_program::TraversalProgram::default())
        });
        registry
    }
}

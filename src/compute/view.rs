use crate::compute::program::KeyType;
use crate::compute::Messenger;
use crate::error::GfError;
use crate::graph::property_value::PropertyValue;
use crate::graph::{GraphStore, VertexId};
use hashbrown::HashMap;
use std::sync::Mutex;

/// Visibility rule for computed vertex properties across supersteps.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Isolation {
    /// Bulk-synchronous: reads within superstep `s` observe the values written in superstep
    /// `s - 1`; writes become visible only at the superstep barrier.
    Bsp,
    /// Reads observe writes immediately. Nondeterministic under parallel execution.
    Shared,
}

type VertexState = HashMap<String, PropertyValue>;

#[derive(Default)]
struct ViewState {
    /// The readable generation under BSP (last superstep's writes).
    get_map: HashMap<VertexId, VertexState>,
    /// The writable generation (this superstep's writes).
    set_map: HashMap<VertexId, VertexState>,
    constants: HashMap<VertexId, VertexState>,
}

/// The overlay holding all computed vertex properties for one computation. The base graph is
/// never written; every computed value lives here, keyed by the compute keys the program
/// declared. Reads and writes of undeclared keys are schema violations.
pub struct ComputeView {
    compute_keys: HashMap<String, KeyType>,
    isolation: Isolation,
    state: Mutex<ViewState>,
}

impl ComputeView {
    pub(crate) fn new(isolation: Isolation, compute_keys: HashMap<String, KeyType>) -> Self {
        Self { compute_keys, isolation, state: Mutex::new(ViewState::default()) }
    }

    fn key_type(&self, key: &str) -> Result<KeyType, GfError> {
        self.compute_keys.get(key).copied().ok_or_else(|| {
            crate::error::schema_violation(format!("'{}' is not a declared compute key", key))
        })
    }

    pub fn get(&self, vertex: VertexId, key: &str) -> Result<Option<PropertyValue>, GfError> {
        let state = self.state.lock().expect("ComputeView lock poisoned");
        let map = match (self.key_type(key)?, self.isolation) {
            (KeyType::Constant, _) => &state.constants,
            (KeyType::Variable, Isolation::Bsp) => &state.get_map,
            (KeyType::Variable, Isolation::Shared) => &state.set_map,
        };
        Ok(map.get(&vertex).and_then(|properties| properties.get(key)).cloned())
    }

    pub fn set(&self, vertex: VertexId, key: &str, value: PropertyValue) -> Result<(), GfError> {
        let key_type = self.key_type(key)?;
        let mut state = self.state.lock().expect("ComputeView lock poisoned");
        match key_type {
            KeyType::Constant => {
                let properties = state.constants.entry(vertex).or_default();
                if properties.contains_key(key) {
                    return Err(crate::error::schema_violation(format!(
                        "Constant key '{}' was already set on vertex {}",
                        key, vertex
                    )));
                }
                properties.insert(key.to_owned(), value);
            }
            KeyType::Variable => {
                state.set_map.entry(vertex).or_default().insert(key.to_owned(), value);
            }
        }
        Ok(())
    }

    pub fn remove(&self, vertex: VertexId, key: &str) -> Result<(), GfError> {
        match self.key_type(key)? {
            KeyType::Constant => Err(crate::error::schema_violation(format!(
                "Constant key '{}' cannot be removed",
                key
            ))),
            KeyType::Variable => {
                let mut state = self.state.lock().expect("ComputeView lock poisoned");
                if let Some(properties) = state.set_map.get_mut(&vertex) {
                    properties.remove(key);
                }
                Ok(())
            }
        }
    }

    /// Superstep barrier: this superstep's writes become the next superstep's readable
    /// generation. A vertex that wrote nothing this superstep reads nothing next superstep;
    /// programs that need a value every superstep must write it every superstep.
    pub(crate) fn advance_superstep(&self) {
        if self.isolation == Isolation::Shared {
            return;
        }
        let mut state = self.state.lock().expect("ComputeView lock poisoned");
        state.get_map = std::mem::take(&mut state.set_map);
    }
}

/// Read-through facade handed to [`VertexProgram::execute`](crate::compute::VertexProgram) and
/// [`MapReduce::map`](crate::compute::MapReduce): base graph properties read through unchanged,
/// compute keys resolve against the view.
pub struct ComputeVertex<'a> {
    id: VertexId,
    graph: &'a dyn GraphStore,
    view: &'a ComputeView,
}

impl<'a> ComputeVertex<'a> {
    pub(crate) fn new(id: VertexId, graph: &'a dyn GraphStore, view: &'a ComputeView) -> Self {
        Self { id, graph, view }
    }

    pub fn id(&self) -> VertexId {
        self.id
    }

    pub fn label(&self) -> Option<&str> {
        self.graph.vertex_label(self.id)
    }

    pub fn vertex_count(&self) -> usize {
        self.graph.vertex_count()
    }

    pub fn out_degree(&self) -> usize {
        self.graph.out_degree(self.id)
    }

    pub fn out_vertex_ids(&self) -> Vec<VertexId> {
        self.graph.out_vertex_ids(self.id)
    }

    pub fn in_vertex_ids(&self) -> Vec<VertexId> {
        self.graph.in_vertex_ids(self.id)
    }

    /// A base graph property, bypassing the compute view.
    pub fn base_property(&self, key: &str) -> Option<PropertyValue> {
        self.graph.vertex_property(self.id, key).cloned()
    }

    /// A declared compute key resolves against the view; anything else reads the base graph.
    pub fn property(&self, key: &str) -> Result<Option<PropertyValue>, GfError> {
        if self.view.compute_keys.contains_key(key) {
            self.view.get(self.id, key)
        } else {
            Ok(self.base_property(key))
        }
    }

    pub fn set(&self, key: &str, value: PropertyValue) -> Result<(), GfError> {
        self.view.set(self.id, key, value)
    }

    pub fn remove(&self, key: &str) -> Result<(), GfError> {
        self.view.remove(self.id, key)
    }

    /// Sends `message` to every out-neighbor. The common scatter pattern of adjacency-driven
    /// programs.
    pub fn broadcast_out(&self, messenger: &mut Messenger, message: PropertyValue) {
        for neighbor in self.graph.out_vertex_ids(self.id) {
            messenger.send(neighbor, message.clone());
        }
    }
}

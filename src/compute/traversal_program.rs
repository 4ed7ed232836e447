use crate::compute::program::{KeyType, ProgramConfig, ProgramFeatures, VertexProgram};
use crate::compute::side_effects::SideEffects;
use crate::compute::view::ComputeVertex;
use crate::compute::Messenger;
use crate::error::GfError;
use crate::graph::property_value::PropertyValue;
use hashbrown::{HashMap, HashSet};

/// Side-effect key the halted traverser values are collected under.
pub const TRAVERSERS: &str = "traversers";

const VOTE_TO_HALT: &str = "voteToHalt";
const OPS_KEY: &str = "graphflow.traversal.ops";

/// One vertex-local traversal operation. The subset of the iterator pipeline whose steps only
/// ever look at the current vertex and its incident edges, which is what makes them executable
/// as message hops.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum TraversalOp {
    Out,
    In,
    Values(String),
    Has(String, PropertyValue),
}

/// Executes a chain of [`TraversalOp`]s as a vertex program: a traverser is a
/// `(program counter, value)` message, adjacency ops forward it to neighbors, and local ops
/// advance it in place. A traverser that walks off the end of the chain is halted and its value
/// pushed to the [`TRAVERSERS`] side effect. The computation ends when a superstep forwards
/// nothing, detected by vote-to-halt.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TraversalProgram {
    ops: Vec<TraversalOp>,
}

impl TraversalProgram {
    pub fn new(ops: Vec<TraversalOp>) -> Self {
        Self { ops }
    }

    pub fn ops(&self) -> &[TraversalOp] {
        &self.ops
    }

    fn encode_message(counter: usize, value: PropertyValue) -> PropertyValue {
        PropertyValue::pair(PropertyValue::Isize(counter as isize), value)
    }

    fn decode_message(message: &PropertyValue) -> Result<(usize, PropertyValue), GfError> {
        match message {
            PropertyValue::Pair(counter, value) => {
                Ok((counter.as_isize()? as usize, (**value).clone()))
            }
            other => Err(GfError::TypeMismatch("Pair", other.to_string())),
        }
    }

    /// Runs one traverser forward from `counter` until it halts, dies, or hops to a neighbor.
    fn advance(
        &self,
        mut counter: usize,
        mut value: PropertyValue,
        vertex: &ComputeVertex,
        messenger: &mut Messenger,
        side_effects: &SideEffects,
    ) -> Result<(), GfError> {
        loop {
            let op = match self.ops.get(counter) {
                Some(op) => op,
                None => {
                    side_effects.push_to_list(TRAVERSERS, value)?;
                    return Ok(());
                }
            };
            match op {
                TraversalOp::Out | TraversalOp::In => {
                    let neighbors = match op {
                        TraversalOp::Out => vertex.out_vertex_ids(),
                        _ => vertex.in_vertex_ids(),
                    };
                    for neighbor in &neighbors {
                        messenger.send(
                            *neighbor,
                            Self::encode_message(counter + 1, PropertyValue::Vertex(*neighbor)),
                        );
                    }
                    if !neighbors.is_empty() {
                        side_effects.and_bool(VOTE_TO_HALT, false)?;
                    }
                    return Ok(());
                }
                TraversalOp::Values(key) => match vertex.base_property(key) {
                    Some(property) => {
                        value = property;
                        counter += 1;
                    }
                    // A vertex without the property kills the traverser.
                    None => return Ok(()),
                },
                TraversalOp::Has(key, expected) => {
                    if vertex.base_property(key).as_ref() == Some(expected) {
                        counter += 1;
                    } else {
                        return Ok(());
                    }
                }
            }
        }
    }
}

impl VertexProgram for TraversalProgram {
    fn name(&self) -> &'static str {
        "traversal"
    }

    fn setup(&self, side_effects: &SideEffects) {
        side_effects.set(VOTE_TO_HALT, PropertyValue::Bool(true));
        side_effects.set(TRAVERSERS, PropertyValue::List(Vec::new()));
    }

    fn execute(
        &self,
        vertex: &ComputeVertex,
        messenger: &mut Messenger,
        side_effects: &SideEffects,
    ) -> Result<(), GfError> {
        if side_effects.iteration() == 0 {
            // Every vertex spawns one traverser at the start of the chain.
            self.advance(0, PropertyValue::Vertex(vertex.id()), vertex, messenger, side_effects)
        } else {
            let incoming = messenger
                .receive()
                .map(Self::decode_message)
                .collect::<Result<Vec<_>, _>>()?;
            for (counter, value) in incoming {
                self.advance(counter, value, vertex, messenger, side_effects)?;
            }
            Ok(())
        }
    }

    fn terminate(&self, side_effects: &SideEffects) -> bool {
        let halt = match side_effects.get(VOTE_TO_HALT) {
            Some(PropertyValue::Bool(halt)) => halt,
            _ => true,
        };
        side_effects.set(VOTE_TO_HALT, PropertyValue::Bool(true));
        halt
    }

    fn element_compute_keys(&self) -> HashMap<String, KeyType> {
        HashMap::new()
    }

    fn side_effect_compute_keys(&self) -> HashSet<String> {
        [TRAVERSERS, VOTE_TO_HALT].iter().map(|key| (*key).to_owned()).collect()
    }

    fn features(&self) -> ProgramFeatures {
        ProgramFeatures { requires_local_messages: true, ..ProgramFeatures::default() }
    }

    fn store_state(&self, config: &mut ProgramConfig) {
        config.set(
            crate::compute::program::PROGRAM_KEY,
            PropertyValue::String(self.name().to_owned()),
        );
        let encoded = self
            .ops
            .iter()
            .map(|op| match op {
                TraversalOp::Out => PropertyValue::String("out".to_owned()),
                TraversalOp::In => PropertyValue::String("in".to_owned()),
                TraversalOp::Values(key) => PropertyValue::pair(
                    PropertyValue::String("values".to_owned()),
                    PropertyValue::String(key.clone()),
                ),
                TraversalOp::Has(key, value) => PropertyValue::pair(
                    PropertyValue::String("has".to_owned()),
                    PropertyValue::pair(PropertyValue::String(key.clone()), value.clone()),
                ),
            })
            .collect();
        config.set(OPS_KEY, PropertyValue::List(encoded));
    }

    fn load_state(&mut self, config: &ProgramConfig) -> Result<(), GfError> {
        let encoded = match config.get(OPS_KEY) {
            Some(value) => value.as_list()?,
            None => return Err(GfError::Config(format!("Missing config key '{}'", OPS_KEY))),
        };
        self.ops = encoded.iter().map(decode_op).collect::<Result<Vec<_>, _>>()?;
        Ok(())
    }
}

fn decode_op(encoded: &PropertyValue) -> Result<TraversalOp, GfError> {
    match encoded {
        PropertyValue::String(name) if name == "out" => Ok(TraversalOp::Out),
        PropertyValue::String(name) if name == "in" => Ok(TraversalOp::In),
        PropertyValue::Pair(name, argument) => match (name.as_str()?, &**argument) {
            ("values", PropertyValue::String(key)) => Ok(TraversalOp::Values(key.clone())),
            ("has", PropertyValue::Pair(key, value)) => {
                Ok(TraversalOp::Has(key.as_str()?.to_owned(), (**value).clone()))
            }
            (name, _) => Err(GfError::Config(format!("Unknown traversal op '{}'", name))),
        },
        other => Err(GfError::Config(format!("Malformed traversal op '{}'", other))),
    }
}

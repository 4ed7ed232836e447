/// Crate-wide error type.
///
/// The variants follow the failure taxonomy of the engine: schema violations on compute keys,
/// feature mismatches caught at submit time, step faults surfaced from `next()`, superstep faults
/// that abort a whole computation, and configuration/serialization problems when reconstructing
/// vertex programs from a configuration snapshot.
#[derive(Debug)]
pub enum GfError {
    Generic(String),
    /// Writing an undeclared compute key, rewriting a CONSTANT key, or removing a CONSTANT key.
    SchemaViolation(String),
    /// A vertex program requires a capability the graph computer does not support.
    FeatureMismatch(&'static str),
    /// A step's function faulted while the traversal was being pulled.
    Step(String),
    /// A per-vertex execute call failed, aborting the superstep and the computation.
    Superstep(u64, String),
    /// The computation was cancelled at a superstep boundary.
    Cancelled(u64),
    Traversal(String),
    UnknownProgram(String),
    Config(String),
    Serialize(String, String),
    Deserialize(String, String),
    TypeMismatch(&'static str, String),
    Computation(String),
}

impl std::fmt::Display for GfError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            GfError::Generic(msg) => write!(f, "[GfError] {}", msg)?,
            GfError::SchemaViolation(msg) => write!(f, "[SchemaViolation] {}", msg)?,
            GfError::FeatureMismatch(feature) => write!(
                f,
                "[FeatureMismatch] The vertex program cannot be executed on this graph computer: \
                 it requires '{}'",
                feature
            )?,
            GfError::Step(msg) => write!(f, "[StepFault] {}", msg)?,
            GfError::Superstep(superstep, msg) => {
                write!(f, "[SuperstepFault] Superstep {} aborted: {}", superstep, msg)?;
            }
            GfError::Cancelled(superstep) => {
                write!(f, "[Cancelled] Computation cancelled before superstep {}", superstep)?;
            }
            GfError::Traversal(msg) => write!(f, "[TraversalError] {}", msg)?,
            GfError::UnknownProgram(name) => {
                write!(f, "[ConfigError] No vertex program registered under '{}'", name)?;
            }
            GfError::Config(msg) => write!(f, "[ConfigError] {}", msg)?,
            GfError::Serialize(name, e) => {
                write!(f, "[SerdeError] Could not serialize '{}': {}", name, e)?;
            }
            GfError::Deserialize(name, e) => {
                write!(f, "[SerdeError] Could not deserialize '{}': {}", name, e)?;
            }
            GfError::TypeMismatch(expected, found) => {
                write!(f, "[ComputationError] Expected type '{}', got '{}'", expected, found)?;
            }
            GfError::Computation(msg) => write!(f, "[ComputationError] {}", msg)?,
        }
        Ok(())
    }
}

impl std::error::Error for GfError {}

pub fn schema_violation(msg: impl Into<String>) -> GfError {
    GfError::SchemaViolation(msg.into())
}

pub fn step_fault(msg: impl Into<String>) -> GfError {
    GfError::Step(msg.into())
}

pub fn computation_error(msg: impl Into<String>) -> GfError {
    GfError::Computation(msg.into())
}
